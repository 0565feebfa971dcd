//! Packet Dump Receiver Interceptor - Dumps incoming RTP/RTCP packets.

use super::{
    DecodeErrorPolicy, Direction, DumpLogger, PacketDumpConfig, PacketDumper,
    RECEIVER_LOG_TARGET, unmarshal_rtcp, unmarshal_rtp,
};
use crate::error::Result;
use crate::stream_info::{Attributes, StreamInfo};
use crate::{Interceptor, RtcpReader, RtpReader};
use std::io::Write;
use std::sync::Arc;

/// Builder for the PacketDumpReceiverInterceptor.
///
/// Options are applied in call order; a later call overrides an earlier one.
///
/// # Example
///
/// ```ignore
/// use rtc_packetdump::{PacketDumpReceiverBuilder, Registry};
///
/// let chain = Registry::new()
///     .with(PacketDumpReceiverBuilder::new()
///         .with_writer(std::fs::File::create("incoming.log")?)
///         .with_rtp_filter(|pkt| pkt.header.payload_type == 96)
///         .with_rtcp_filter(|_| false)
///         .build()?)
///     .build();
/// ```
pub struct PacketDumpReceiverBuilder {
    config: PacketDumpConfig,
    /// First error reported by a [`with_option`](Self::with_option) mutator.
    err: Option<crate::Error>,
}

impl Default for PacketDumpReceiverBuilder {
    fn default() -> Self {
        Self {
            config: PacketDumpConfig::new(RECEIVER_LOG_TARGET),
            err: None,
        }
    }
}

impl PacketDumpReceiverBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sink packets are dumped to. Defaults to standard output.
    pub fn with_writer<W>(mut self, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.config.writer = Box::new(writer);
        self
    }

    /// Set the logger used to report dump failures.
    pub fn with_logger(mut self, logger: DumpLogger) -> Self {
        self.config.logger = logger;
        self
    }

    /// Only dump RTP packets for which `filter` returns `true`.
    pub fn with_rtp_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&rtp::packet::Packet) -> bool + Send + Sync + 'static,
    {
        self.config.rtp_filter = Arc::new(filter);
        self
    }

    /// Only dump RTCP packets for which `filter` returns `true`.
    pub fn with_rtcp_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&(dyn rtcp::packet::Packet + Send + Sync)) -> bool + Send + Sync + 'static,
    {
        self.config.rtcp_filter = Arc::new(filter);
        self
    }

    /// Replace the default rendering of RTP packets, the codec's `Display`
    /// output folded onto one line.
    pub fn with_rtp_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&rtp::packet::Packet) -> String + Send + Sync + 'static,
    {
        self.config.rtp_formatter = Arc::new(formatter);
        self
    }

    /// Replace the default rendering of RTCP packets, the codec's `Display`
    /// output folded onto one line.
    pub fn with_rtcp_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&(dyn rtcp::packet::Packet + Send + Sync)) -> String + Send + Sync + 'static,
    {
        self.config.rtcp_formatter = Arc::new(formatter);
        self
    }

    /// Choose what happens when bytes read by upstream fail to decode.
    pub fn with_decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.config.decode_error_policy = policy;
        self
    }

    /// Apply an arbitrary, possibly failing, change to the configuration.
    ///
    /// Once a mutator fails the remaining ones are skipped and
    /// [`build`](Self::build) returns that error.
    pub fn with_option<F>(mut self, option: F) -> Self
    where
        F: FnOnce(&mut PacketDumpConfig) -> Result<()>,
    {
        if self.err.is_none() {
            if let Err(err) = option(&mut self.config) {
                self.err = Some(err);
            }
        }
        self
    }

    /// Build the interceptor.
    pub fn build(self) -> Result<PacketDumpReceiverInterceptor> {
        if let Some(err) = self.err {
            return Err(err);
        }
        Ok(PacketDumpReceiverInterceptor {
            dumper: Arc::new(PacketDumper::new(self.config)),
        })
    }
}

/// Interceptor that dumps incoming RTP and RTCP packets.
///
/// Every bound reader decodes what its upstream returned, dumps the accepted
/// packets with the `in:  ` prefix and hands upstream's byte count and
/// attributes back to the caller. The buffer contents are never modified.
pub struct PacketDumpReceiverInterceptor {
    dumper: Arc<PacketDumper>,
}

impl Interceptor for PacketDumpReceiverInterceptor {
    fn bind_rtcp_reader(&self, reader: Arc<dyn RtcpReader>) -> Arc<dyn RtcpReader> {
        Arc::new(RtcpDumpReader {
            dumper: Arc::clone(&self.dumper),
            reader,
        })
    }

    fn bind_remote_stream(
        &self,
        info: &StreamInfo,
        reader: Arc<dyn RtpReader>,
    ) -> Arc<dyn RtpReader> {
        self.dumper
            .logger()
            .trace(format_args!("bind remote stream ssrc={}", info.ssrc));
        Arc::new(RtpDumpReader {
            dumper: Arc::clone(&self.dumper),
            reader,
        })
    }

    fn unbind_remote_stream(&self, info: &StreamInfo) {
        self.dumper
            .logger()
            .trace(format_args!("unbind remote stream ssrc={}", info.ssrc));
    }
}

struct RtpDumpReader {
    dumper: Arc<PacketDumper>,
    reader: Arc<dyn RtpReader>,
}

impl RtpReader for RtpDumpReader {
    fn read(&self, buf: &mut [u8], attributes: &Attributes) -> Result<(usize, Attributes)> {
        let (n, attr) = self.reader.read(buf, attributes)?;

        let pkt = match unmarshal_rtp(buf, n) {
            Ok(pkt) => pkt,
            Err(err) => return self.dumper.decode_failed("RTP", err, (n, attr)),
        };
        self.dumper.dump_rtp(Direction::Inbound, &pkt);

        Ok((n, attr))
    }
}

struct RtcpDumpReader {
    dumper: Arc<PacketDumper>,
    reader: Arc<dyn RtcpReader>,
}

impl RtcpReader for RtcpDumpReader {
    fn read(&self, buf: &mut [u8], attributes: &Attributes) -> Result<(usize, Attributes)> {
        let (n, attr) = self.reader.read(buf, attributes)?;

        let pkts = match unmarshal_rtcp(buf, n) {
            Ok(pkts) => pkts,
            Err(err) => return self.dumper.decode_failed("RTCP", err, (n, attr)),
        };
        self.dumper.dump_rtcp(Direction::Inbound, &pkts);

        Ok((n, attr))
    }
}

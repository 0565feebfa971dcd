//! Packet Dump Sender Interceptor - Dumps outgoing RTP/RTCP packets.

use super::{Direction, DumpLogger, PacketDumpConfig, PacketDumper, SENDER_LOG_TARGET};
use crate::error::Result;
use crate::stream_info::{Attributes, StreamInfo};
use crate::{Interceptor, RtcpPackets, RtcpWriter, RtpWriter};
use bytes::Bytes;
use std::io::Write;
use std::sync::Arc;

/// Builder for the PacketDumpSenderInterceptor.
///
/// # Example
///
/// ```ignore
/// use rtc_packetdump::{PacketDumpSenderBuilder, Registry};
///
/// let chain = Registry::new()
///     .with(PacketDumpSenderBuilder::new()
///         .with_rtp_filter(|pkt| pkt.header.marker)
///         .build()?)
///     .build();
/// ```
pub struct PacketDumpSenderBuilder {
    config: PacketDumpConfig,
    err: Option<crate::Error>,
}

impl Default for PacketDumpSenderBuilder {
    fn default() -> Self {
        Self {
            config: PacketDumpConfig::new(SENDER_LOG_TARGET),
            err: None,
        }
    }
}

impl PacketDumpSenderBuilder {
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

    /// Apply an arbitrary, possibly failing, change to the configuration.
    ///
    /// `decode_error_policy` is ignored here: outgoing packets are never
    /// decoded.
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
    pub fn build(self) -> Result<PacketDumpSenderInterceptor> {
        if let Some(err) = self.err {
            return Err(err);
        }
        Ok(PacketDumpSenderInterceptor {
            dumper: Arc::new(PacketDumper::new(self.config)),
        })
    }
}

/// Interceptor that dumps outgoing RTP and RTCP packets.
///
/// Packets are dumped with the `out: ` prefix before being handed, unmodified,
/// to the upstream writer exactly once. Upstream's result is returned verbatim.
pub struct PacketDumpSenderInterceptor {
    dumper: Arc<PacketDumper>,
}

impl Interceptor for PacketDumpSenderInterceptor {
    fn bind_rtcp_writer(&self, writer: Arc<dyn RtcpWriter>) -> Arc<dyn RtcpWriter> {
        Arc::new(RtcpDumpWriter {
            dumper: Arc::clone(&self.dumper),
            writer,
        })
    }

    fn bind_local_stream(
        &self,
        info: &StreamInfo,
        writer: Arc<dyn RtpWriter>,
    ) -> Arc<dyn RtpWriter> {
        self.dumper
            .logger()
            .trace(format_args!("bind local stream ssrc={}", info.ssrc));
        Arc::new(RtpDumpWriter {
            dumper: Arc::clone(&self.dumper),
            writer,
        })
    }

    fn unbind_local_stream(&self, info: &StreamInfo) {
        self.dumper
            .logger()
            .trace(format_args!("unbind local stream ssrc={}", info.ssrc));
    }
}

struct RtpDumpWriter {
    dumper: Arc<PacketDumper>,
    writer: Arc<dyn RtpWriter>,
}

impl RtpWriter for RtpDumpWriter {
    fn write(
        &self,
        header: &rtp::header::Header,
        payload: &[u8],
        attributes: &Attributes,
    ) -> Result<usize> {
        let pkt = rtp::packet::Packet {
            header: header.clone(),
            payload: Bytes::copy_from_slice(payload),
        };
        self.dumper.dump_rtp(Direction::Outbound, &pkt);

        self.writer.write(header, payload, attributes)
    }
}

struct RtcpDumpWriter {
    dumper: Arc<PacketDumper>,
    writer: Arc<dyn RtcpWriter>,
}

impl RtcpWriter for RtcpDumpWriter {
    fn write(&self, pkts: &RtcpPackets, attributes: &Attributes) -> Result<usize> {
        self.dumper.dump_rtcp(Direction::Outbound, pkts);

        self.writer.write(pkts, attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::super::single_line;
    use super::super::test_util::*;
    use super::*;
    use crate::Error;
    use log::Level;
    use rtcp::goodbye::Goodbye;
    use rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
    use std::sync::Mutex;

    type RtpCall = (rtp::header::Header, Vec<u8>, Attributes);
    type RtcpCall = (Vec<Box<dyn rtcp::packet::Packet + Send + Sync>>, Attributes);

    /// Upstream RTP writer recording its arguments and returning `result`.
    fn rtp_upstream(
        result: Result<usize>,
    ) -> (Arc<dyn RtpWriter>, Arc<Mutex<Vec<RtpCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        let writer: Arc<dyn RtpWriter> = Arc::new(
            move |header: &rtp::header::Header,
                  payload: &[u8],
                  attr: &Attributes|
                  -> Result<usize> {
                recorded
                    .lock()
                    .unwrap()
                    .push((header.clone(), payload.to_vec(), attr.clone()));
                match &result {
                    Ok(n) => Ok(*n),
                    Err(err) => Err(Error::Other(err.to_string())),
                }
            },
        );
        (writer, calls)
    }

    fn rtcp_upstream(n: usize) -> (Arc<dyn RtcpWriter>, Arc<Mutex<Vec<RtcpCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        let writer: Arc<dyn RtcpWriter> = Arc::new(
            move |pkts: &RtcpPackets, attr: &Attributes| -> Result<usize> {
                recorded.lock().unwrap().push((pkts.to_vec(), attr.clone()));
                Ok(n)
            },
        );
        (writer, calls)
    }

    fn stream_info() -> StreamInfo {
        StreamInfo {
            ssrc: 0x4d2,
            clock_rate: 48000,
            ..Default::default()
        }
    }

    #[test]
    fn test_rtp_write_dumps_then_delegates_once() {
        let out = SharedBuffer::default();
        let interceptor = PacketDumpSenderBuilder::new()
            .with_writer(out.clone())
            .build()
            .unwrap();

        let (upstream, calls) = rtp_upstream(Ok(17));
        let writer = interceptor.bind_local_stream(&stream_info(), upstream);

        let pkt = rtp_packet(0x4d2, 10);
        let mut attr = Attributes::new();
        attr.insert(3, 4);
        let n = writer.write(&pkt.header, &pkt.payload, &attr).unwrap();

        assert_eq!(n, 17);
        assert_eq!(
            out.contents(),
            format!("out: {}\n", single_line(&pkt.to_string()))
        );
        assert_eq!(out.contents().lines().count(), 1);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, pkt.header);
        assert_eq!(calls[0].1, pkt.payload.to_vec());
        assert_eq!(calls[0].2, attr);
    }

    #[test]
    fn test_rtp_write_filtered_out_still_delegates() {
        let out = SharedBuffer::default();
        let interceptor = PacketDumpSenderBuilder::new()
            .with_writer(out.clone())
            .with_rtp_filter(|pkt| pkt.header.marker)
            .build()
            .unwrap();

        let (upstream, calls) = rtp_upstream(Ok(5));
        let writer = interceptor.bind_local_stream(&stream_info(), upstream);

        let pkt = rtp_packet(1, 1);
        assert_eq!(
            writer
                .write(&pkt.header, &pkt.payload, &Attributes::new())
                .unwrap(),
            5
        );
        assert!(out.is_empty());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_rtp_upstream_error_returned_verbatim() {
        let out = SharedBuffer::default();
        let interceptor = PacketDumpSenderBuilder::new()
            .with_writer(out.clone())
            .build()
            .unwrap();

        let (upstream, _) = rtp_upstream(Err(Error::Other("no route".to_string())));
        let writer = interceptor.bind_local_stream(&stream_info(), upstream);

        let pkt = rtp_packet(1, 1);
        let err = writer
            .write(&pkt.header, &pkt.payload, &Attributes::new())
            .unwrap_err();

        assert_eq!(err, Error::Other("no route".to_string()));
        // dumping happens before delegating
        assert_eq!(out.dumped("out: ").len(), 1);
    }

    #[test]
    fn test_rtp_sink_error_does_not_alter_result() {
        let log = Arc::new(CaptureLog::default());
        let interceptor = PacketDumpSenderBuilder::new()
            .with_writer(FlakyWriter::new(SharedBuffer::default(), vec![0]))
            .with_logger(DumpLogger::new("tx").with_log(log.clone()))
            .build()
            .unwrap();

        let (upstream, calls) = rtp_upstream(Ok(42));
        let writer = interceptor.bind_local_stream(&stream_info(), upstream);

        let pkt = rtp_packet(1, 1);
        let n = writer
            .write(&pkt.header, &pkt.payload, &Attributes::new())
            .unwrap();

        assert_eq!(n, 42);
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(
            log.records()
                .iter()
                .any(|(level, _, msg)| *level == Level::Error
                    && msg.contains("could not dump outgoing RTP packet"))
        );
    }

    #[test]
    fn test_rtcp_write_dumps_each_packet_then_delegates() {
        let out = SharedBuffer::default();
        let interceptor = PacketDumpSenderBuilder::new()
            .with_writer(out.clone())
            .build()
            .unwrap();

        let (upstream, calls) = rtcp_upstream(64);
        let writer = interceptor.bind_rtcp_writer(upstream);

        let pkts: Vec<Box<dyn rtcp::packet::Packet + Send + Sync>> = vec![
            Box::new(PictureLossIndication {
                sender_ssrc: 1,
                media_ssrc: 2,
            }),
            Box::new(Goodbye {
                sources: vec![0x4d2],
                reason: Bytes::from_static(b"bye"),
            }),
        ];
        let mut attr = Attributes::new();
        attr.insert(9, 9);
        let n = writer.write(&pkts, &attr).unwrap();

        assert_eq!(n, 64);
        let expected: String = pkts
            .iter()
            .map(|pkt| format!("out: {}\n", single_line(&pkt.to_string())))
            .collect();
        assert_eq!(out.contents(), expected);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, pkts);
        assert_eq!(calls[0].1, attr);
    }

    #[test]
    fn test_rtcp_sink_error_per_packet() {
        let out = SharedBuffer::default();
        let log = Arc::new(CaptureLog::default());
        let interceptor = PacketDumpSenderBuilder::new()
            .with_writer(FlakyWriter::new(out.clone(), vec![0, 2]))
            .with_logger(DumpLogger::new("tx").with_log(log.clone()))
            .build()
            .unwrap();

        let (upstream, calls) = rtcp_upstream(8);
        let writer = interceptor.bind_rtcp_writer(upstream);

        let pkts: Vec<Box<dyn rtcp::packet::Packet + Send + Sync>> = (0..4)
            .map(|i| {
                Box::new(PictureLossIndication {
                    sender_ssrc: 1,
                    media_ssrc: i,
                }) as Box<dyn rtcp::packet::Packet + Send + Sync>
            })
            .collect();
        assert_eq!(writer.write(&pkts, &Attributes::new()).unwrap(), 8);

        assert_eq!(
            out.contents(),
            format!(
                "out: {}\nout: {}\n",
                single_line(&pkts[1].to_string()),
                single_line(&pkts[3].to_string())
            )
        );
        let errors = log
            .records()
            .into_iter()
            .filter(|(level, _, _)| *level == Level::Error)
            .count();
        assert_eq!(errors, 2);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_read_paths_are_untouched() {
        let interceptor = PacketDumpSenderBuilder::new().build().unwrap();
        let reader: Arc<dyn crate::RtpReader> =
            Arc::new(|_: &mut [u8], _: &Attributes| -> Result<(usize, Attributes)> {
                Ok((0, Attributes::new()))
            });

        let bound = interceptor.bind_remote_stream(&stream_info(), Arc::clone(&reader));
        assert!(Arc::ptr_eq(&bound, &reader));
    }

    #[test]
    fn test_default_config() {
        let builder = PacketDumpSenderBuilder::default();
        assert_eq!(builder.config.logger.target(), "packetdump_sender");
        assert!(builder.err.is_none());

        let logger = DumpLogger::new("custom");
        let builder = PacketDumpSenderBuilder::new().with_logger(logger);
        assert_eq!(builder.config.logger.target(), "custom");
    }

    #[test]
    fn test_failing_option_fails_build() {
        let result = PacketDumpSenderBuilder::new()
            .with_option(|_| Err(Error::ErrInvalidOption("sink".to_string())))
            .build();

        assert_eq!(
            result.err(),
            Some(Error::ErrInvalidOption("sink".to_string()))
        );
    }
}

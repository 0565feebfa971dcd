//! Packet Dump Interceptors.
//!
//! Observational taps that write one human-readable line per RTP/RTCP packet
//! to a shared sink, while passing every packet through untouched.
//!
//! # Interceptors
//!
//! - [`PacketDumpReceiverInterceptor`](receiver::PacketDumpReceiverInterceptor):
//!   wraps the RTP reader of each remote stream and the RTCP reader, decodes
//!   the bytes read by upstream and dumps them with the `in:  ` prefix.
//! - [`PacketDumpSenderInterceptor`](sender::PacketDumpSenderInterceptor):
//!   wraps the RTP writer of each local stream and the RTCP writer and dumps
//!   the packets handed to upstream with the `out: ` prefix.
//!
//! # Trace Format
//!
//! ```text
//! in:  <formatted packet>\n
//! out: <formatted packet>\n
//! ```
//!
//! The formatted packet is the codec's `Display` output folded onto a single
//! line, unless a formatter is configured.
//!
//! # Failure Handling
//!
//! - Upstream read/write errors are returned as-is; nothing is dumped.
//! - Decode errors on the receive side are returned to the caller by default
//!   ([`DecodeErrorPolicy::Propagate`]), or logged and swallowed with
//!   [`DecodeErrorPolicy::PassThrough`].
//! - Sink write errors are logged at error level and never returned.
//!
//! # Example
//!
//! ```ignore
//! use rtc_packetdump::{PacketDumpReceiverBuilder, Registry};
//!
//! let chain = Registry::new()
//!     .with(PacketDumpReceiverBuilder::new()
//!         .with_writer(std::io::stderr())
//!         .with_rtp_filter(|pkt| pkt.header.marker)
//!         .build()?)
//!     .build();
//! ```

pub(crate) mod receiver;
pub(crate) mod sender;

use crate::RtcpPackets;
use crate::error::{Error, Result};
use log::{Level, Log, Record};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use util::marshal::Unmarshal;

pub(crate) const RECEIVER_LOG_TARGET: &str = "packetdump_receiver";
pub(crate) const SENDER_LOG_TARGET: &str = "packetdump_sender";

/// Decides whether an RTP packet is dumped.
pub type RtpFilterCallback = Arc<dyn Fn(&rtp::packet::Packet) -> bool + Send + Sync>;

/// Decides whether a single RTCP packet of a batch is dumped.
pub type RtcpFilterCallback =
    Arc<dyn Fn(&(dyn rtcp::packet::Packet + Send + Sync)) -> bool + Send + Sync>;

/// Renders an RTP packet into the text following the direction prefix.
pub type RtpFormatCallback = Arc<dyn Fn(&rtp::packet::Packet) -> String + Send + Sync>;

/// Renders an RTCP packet into the text following the direction prefix.
pub type RtcpFormatCallback =
    Arc<dyn Fn(&(dyn rtcp::packet::Packet + Send + Sync)) -> String + Send + Sync>;

/// What the receive side does when bytes read by upstream cannot be decoded.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorPolicy {
    /// Fail the read with the decode error, even though upstream succeeded.
    #[default]
    Propagate,
    /// Log the decode error and return upstream's result without dumping.
    PassThrough,
}

/// Logging handle used to report dump failures.
///
/// Records go to the global `log` facade under `target`, unless a dedicated
/// [`Log`] implementation is injected with [`DumpLogger::with_log`].
#[derive(Clone)]
pub struct DumpLogger {
    target: String,
    log: Option<Arc<dyn Log>>,
}

impl DumpLogger {
    /// Create a logger writing to the global `log` facade under `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            log: None,
        }
    }

    /// Send records to `log` instead of the global logger.
    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub(crate) fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub(crate) fn trace(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Trace, args);
    }

    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        match &self.log {
            Some(log) => {
                let record = Record::builder()
                    .level(level)
                    .target(&self.target)
                    .args(args)
                    .build();
                if log.enabled(record.metadata()) {
                    log.log(&record);
                }
            }
            None => log::log!(target: self.target.as_str(), level, "{}", args),
        }
    }
}

impl fmt::Debug for DumpLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpLogger")
            .field("target", &self.target)
            .field("injected", &self.log.is_some())
            .finish()
    }
}

/// Fold multi-line `Display` output into one line, joining the non-empty
/// lines with a single space.
pub(crate) fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Configuration shared by both packet dump interceptors.
///
/// Fields left untouched keep the defaults of [`PacketDumpConfig::new`]:
/// standard output, accept-all filters and the codec's `Display` output
/// folded onto one line.
pub struct PacketDumpConfig {
    /// Sink receiving the trace lines. Never flushed or closed by the interceptor.
    pub writer: Box<dyn Write + Send>,
    /// Logger for dump failures.
    pub logger: DumpLogger,
    pub rtp_filter: RtpFilterCallback,
    pub rtcp_filter: RtcpFilterCallback,
    pub rtp_formatter: RtpFormatCallback,
    pub rtcp_formatter: RtcpFormatCallback,
    /// Only consulted on the receive side. The send side never decodes, so a
    /// value set through `PacketDumpSenderBuilder::with_option` has no effect.
    pub decode_error_policy: DecodeErrorPolicy,
}

impl PacketDumpConfig {
    /// Create a configuration with all defaults, logging under `log_target`.
    pub fn new(log_target: &str) -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
            logger: DumpLogger::new(log_target),
            rtp_filter: Arc::new(|_: &rtp::packet::Packet| true),
            rtcp_filter: Arc::new(|_: &(dyn rtcp::packet::Packet + Send + Sync)| true),
            rtp_formatter: Arc::new(|pkt: &rtp::packet::Packet| {
                single_line(&pkt.to_string())
            }),
            rtcp_formatter: Arc::new(|pkt: &(dyn rtcp::packet::Packet + Send + Sync)| {
                single_line(&pkt.to_string())
            }),
            decode_error_policy: DecodeErrorPolicy::default(),
        }
    }
}

impl fmt::Debug for PacketDumpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketDumpConfig")
            .field("logger", &self.logger)
            .field("decode_error_policy", &self.decode_error_policy)
            .finish_non_exhaustive()
    }
}

/// Direction a dumped packet travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub(crate) fn prefix(self) -> &'static str {
        match self {
            Direction::Inbound => "in:  ",
            Direction::Outbound => "out: ",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "incoming"),
            Direction::Outbound => write!(f, "outgoing"),
        }
    }
}

/// Sink shared by every path of one interceptor.
///
/// A line is formatted up front and written with a single `write_all` while
/// holding the lock, so concurrent paths never interleave within a line.
#[derive(Clone)]
pub(crate) struct DumpWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl DumpWriter {
    pub(crate) fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub(crate) fn write_line(&self, prefix: &str, text: &str) -> Result<()> {
        let line = format!("{prefix}{text}\n");
        let mut writer = self.inner.lock()?;
        writer.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Filter, format and write logic shared by the receive and send sides.
pub(crate) struct PacketDumper {
    writer: DumpWriter,
    logger: DumpLogger,
    rtp_filter: RtpFilterCallback,
    rtcp_filter: RtcpFilterCallback,
    rtp_formatter: RtpFormatCallback,
    rtcp_formatter: RtcpFormatCallback,
    decode_error_policy: DecodeErrorPolicy,
}

impl PacketDumper {
    pub(crate) fn new(config: PacketDumpConfig) -> Self {
        Self {
            writer: DumpWriter::new(config.writer),
            logger: config.logger,
            rtp_filter: config.rtp_filter,
            rtcp_filter: config.rtcp_filter,
            rtp_formatter: config.rtp_formatter,
            rtcp_formatter: config.rtcp_formatter,
            decode_error_policy: config.decode_error_policy,
        }
    }

    pub(crate) fn logger(&self) -> &DumpLogger {
        &self.logger
    }

    /// Dump a single RTP packet if the filter accepts it.
    pub(crate) fn dump_rtp(&self, direction: Direction, pkt: &rtp::packet::Packet) {
        if !(self.rtp_filter)(pkt) {
            return;
        }

        let text = (self.rtp_formatter)(pkt);
        if let Err(err) = self.writer.write_line(direction.prefix(), &text) {
            self.logger.error(format_args!(
                "could not dump {} RTP packet (ssrc={}, seq={}): {}",
                direction, pkt.header.ssrc, pkt.header.sequence_number, err
            ));
        }
    }

    /// Dump every accepted packet of a batch, in batch order.
    ///
    /// A failed write is logged and does not stop the remaining packets.
    pub(crate) fn dump_rtcp(&self, direction: Direction, pkts: &RtcpPackets) {
        for pkt in pkts {
            let pkt = &**pkt;
            if !(self.rtcp_filter)(pkt) {
                continue;
            }

            let text = (self.rtcp_formatter)(pkt);
            if let Err(err) = self.writer.write_line(direction.prefix(), &text) {
                self.logger.error(format_args!(
                    "could not dump {} RTCP packet ({:?}, ssrc={:?}): {}",
                    direction,
                    pkt.header().packet_type,
                    pkt.destination_ssrc(),
                    err
                ));
            }
        }
    }

    /// Apply the decode error policy to a read whose bytes could not be decoded.
    pub(crate) fn decode_failed<T>(&self, kind: &str, err: Error, passthrough: T) -> Result<T> {
        match self.decode_error_policy {
            DecodeErrorPolicy::Propagate => Err(err),
            DecodeErrorPolicy::PassThrough => {
                self.logger.warn(format_args!(
                    "could not decode incoming {kind} packet, passing it through undumped: {err}"
                ));
                Ok(passthrough)
            }
        }
    }
}

/// The region of `buf` an upstream read reported as filled.
fn filled(buf: &[u8], n: usize) -> Result<&[u8]> {
    buf.get(..n)
        .ok_or(Error::ErrReadLengthOutOfBounds(n, buf.len()))
}

pub(crate) fn unmarshal_rtp(buf: &[u8], n: usize) -> Result<rtp::packet::Packet> {
    let mut raw = filled(buf, n)?;
    Ok(rtp::packet::Packet::unmarshal(&mut raw)?)
}

pub(crate) fn unmarshal_rtcp(
    buf: &[u8],
    n: usize,
) -> Result<Vec<Box<dyn rtcp::packet::Packet + Send + Sync>>> {
    let mut raw = filled(buf, n)?;
    Ok(rtcp::packet::unmarshal(&mut raw)?)
}

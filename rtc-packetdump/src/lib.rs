//! RTC Packet Dump - diagnostic RTP/RTCP taps for interceptor chains.
//!
//! This crate provides a pair of observational interceptors that write a
//! human-readable line for every RTP/RTCP packet passing through a chain,
//! optionally filtered by caller-supplied predicates. Packets are never
//! modified, dropped or delayed.
//!
//! # Available Interceptors
//!
//! | Interceptor | Description |
//! |-------------|-------------|
//! | [`PacketDumpReceiverInterceptor`] | Dumps incoming RTP (per remote stream) and RTCP packets, prefixed `in:  ` |
//! | [`PacketDumpSenderInterceptor`] | Dumps outgoing RTP (per local stream) and RTCP packets, prefixed `out: ` |
//! | [`NoopInterceptor`] | Pass-through for every bind |
//!
//! # Design
//!
//! An interceptor never drives I/O. The chain owner hands it an upstream
//! reader or writer when a stream (or the RTCP session) is bound, and the
//! interceptor returns a replacement with exactly the same shape:
//!
//! ```text
//! bind_remote_stream(info, reader)  -> reader'   called once per stream
//! reader'.read(buf, attributes)     -> (n, attr) called once per RTP packet
//!
//! bind_rtcp_reader(reader)          -> reader'   called once per session
//! reader'.read(buf, attributes)     -> (n, attr) called once per RTCP batch
//! ```
//!
//! Interceptors are composed with a [`Registry`]; the resulting [`Chain`]
//! binds each interceptor in registration order, each one wrapping the
//! reader/writer produced by the previous one.
//!
//! # Quick Start
//!
//! ```ignore
//! use rtc_packetdump::{
//!     Interceptor, PacketDumpReceiverBuilder, PacketDumpSenderBuilder, Registry,
//! };
//!
//! let chain = Registry::new()
//!     .with(PacketDumpReceiverBuilder::new()
//!         .with_rtcp_filter(|pkt| pkt.header().packet_type != rtcp::header::PacketType::ReceiverReport)
//!         .build()?)
//!     .with(PacketDumpSenderBuilder::new()
//!         .with_writer(std::fs::File::create("out.log")?)
//!         .build()?)
//!     .build();
//!
//! let reader = chain.bind_remote_stream(&stream_info, upstream_reader);
//! ```

#![warn(rust_2018_idioms)]

use std::sync::Arc;

mod chain;
mod error;
mod noop;
mod registry;

pub(crate) mod packet_dump;
pub(crate) mod stream_info;

pub use chain::Chain;
pub use error::{Error, IoError, Result};
pub use noop::NoopInterceptor;
pub use packet_dump::{
    DecodeErrorPolicy, DumpLogger, PacketDumpConfig, RtcpFilterCallback, RtcpFormatCallback,
    RtpFilterCallback, RtpFormatCallback,
    receiver::{PacketDumpReceiverBuilder, PacketDumpReceiverInterceptor},
    sender::{PacketDumpSenderBuilder, PacketDumpSenderInterceptor},
};
pub use registry::Registry;
pub use stream_info::{Attributes, RTCPFeedback, RTPHeaderExtension, StreamInfo};

/// A batch of decoded RTCP packets, in wire order.
pub type RtcpPackets = [Box<dyn rtcp::packet::Packet + Send + Sync>];

/// Reads one marshalled RTP packet into `buf`.
///
/// Returns the number of bytes written into `buf` and the attributes that
/// travel with the packet.
pub trait RtpReader: Send + Sync {
    fn read(&self, buf: &mut [u8], attributes: &Attributes) -> Result<(usize, Attributes)>;
}

/// Reads one marshalled RTCP compound packet (a batch) into `buf`.
pub trait RtcpReader: Send + Sync {
    fn read(&self, buf: &mut [u8], attributes: &Attributes) -> Result<(usize, Attributes)>;
}

/// Writes one RTP packet given as header and payload.
pub trait RtpWriter: Send + Sync {
    fn write(
        &self,
        header: &rtp::header::Header,
        payload: &[u8],
        attributes: &Attributes,
    ) -> Result<usize>;
}

/// Writes one batch of RTCP packets.
pub trait RtcpWriter: Send + Sync {
    fn write(&self, pkts: &RtcpPackets, attributes: &Attributes) -> Result<usize>;
}

impl<F> RtpReader for F
where
    F: Fn(&mut [u8], &Attributes) -> Result<(usize, Attributes)> + Send + Sync,
{
    fn read(&self, buf: &mut [u8], attributes: &Attributes) -> Result<(usize, Attributes)> {
        self(buf, attributes)
    }
}

impl<F> RtcpReader for F
where
    F: Fn(&mut [u8], &Attributes) -> Result<(usize, Attributes)> + Send + Sync,
{
    fn read(&self, buf: &mut [u8], attributes: &Attributes) -> Result<(usize, Attributes)> {
        self(buf, attributes)
    }
}

impl<F> RtpWriter for F
where
    F: Fn(&rtp::header::Header, &[u8], &Attributes) -> Result<usize> + Send + Sync,
{
    fn write(
        &self,
        header: &rtp::header::Header,
        payload: &[u8],
        attributes: &Attributes,
    ) -> Result<usize> {
        self(header, payload, attributes)
    }
}

impl<F> RtcpWriter for F
where
    F: Fn(&RtcpPackets, &Attributes) -> Result<usize> + Send + Sync,
{
    fn write(&self, pkts: &RtcpPackets, attributes: &Attributes) -> Result<usize> {
        self(pkts, attributes)
    }
}

/// Extension point owned by a chain manager.
///
/// Every bind method receives the upstream reader/writer and returns the one
/// the manager should use instead. The default implementations return the
/// upstream unchanged, so an interceptor only overrides the paths it cares
/// about.
///
/// # Example
///
/// ```ignore
/// struct CountingInterceptor {
///     count: Arc<AtomicUsize>,
/// }
///
/// impl Interceptor for CountingInterceptor {
///     fn bind_remote_stream(
///         &self,
///         _info: &StreamInfo,
///         reader: Arc<dyn RtpReader>,
///     ) -> Arc<dyn RtpReader> {
///         let count = Arc::clone(&self.count);
///         Arc::new(move |buf: &mut [u8], attr: &Attributes| {
///             count.fetch_add(1, Ordering::Relaxed);
///             reader.read(buf, attr)
///         })
///     }
/// }
/// ```
pub trait Interceptor: Send + Sync {
    /// bind_rtcp_reader lets you observe any incoming RTCP packets. It is called once per sender/receiver.
    /// The returned reader will be called once per packet batch.
    fn bind_rtcp_reader(&self, reader: Arc<dyn RtcpReader>) -> Arc<dyn RtcpReader> {
        reader
    }

    /// bind_rtcp_writer lets you observe any outgoing RTCP packets. It is called once per session.
    /// The returned writer will be called once per packet batch.
    fn bind_rtcp_writer(&self, writer: Arc<dyn RtcpWriter>) -> Arc<dyn RtcpWriter> {
        writer
    }

    /// bind_local_stream lets you observe any outgoing RTP packets. It is called once per local stream.
    /// The returned writer will be called once per rtp packet.
    fn bind_local_stream(
        &self,
        _info: &StreamInfo,
        writer: Arc<dyn RtpWriter>,
    ) -> Arc<dyn RtpWriter> {
        writer
    }

    /// unbind_local_stream is called when the stream is removed.
    fn unbind_local_stream(&self, _info: &StreamInfo) {}

    /// bind_remote_stream lets you observe any incoming RTP packets. It is called once per remote stream.
    /// The returned reader will be called once per rtp packet.
    fn bind_remote_stream(
        &self,
        _info: &StreamInfo,
        reader: Arc<dyn RtpReader>,
    ) -> Arc<dyn RtpReader> {
        reader
    }

    /// unbind_remote_stream is called when the stream is removed.
    fn unbind_remote_stream(&self, _info: &StreamInfo) {}

    /// close releases whatever the interceptor holds. The chain stops calling
    /// bound readers/writers before closing.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

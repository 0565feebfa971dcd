use std::collections::HashMap;

/// Side-channel metadata travelling next to each packet through a chain.
///
/// Packet dump interceptors never look inside; whatever the upstream reader
/// returns is handed back to the caller untouched.
pub type Attributes = HashMap<usize, usize>;

/// RTP header extension negotiated for a stream (RFC 8285).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTPHeaderExtension {
    pub uri: String,
    pub id: u16,
}

/// RTCP feedback mechanism negotiated for a stream, e.g. `nack` / `pli`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCPFeedback {
    pub typ: String,
    pub parameter: String,
}

/// Stream context handed to [`Interceptor::bind_local_stream`](crate::Interceptor::bind_local_stream)
/// and [`Interceptor::bind_remote_stream`](crate::Interceptor::bind_remote_stream)
/// (and their unbind counterparts).
#[derive(Default, Debug, Clone)]
pub struct StreamInfo {
    /// Unique identifier for the stream
    pub id: String,
    /// Arbitrary metadata attached by the chain owner
    pub attributes: Attributes,
    /// Synchronization Source identifier (SSRC) of the stream
    pub ssrc: u32,
    /// RTP payload type (e.g. 96 for VP8, 111 for Opus)
    pub payload_type: u8,
    /// MIME type of the codec (e.g. "video/VP8")
    pub mime_type: String,
    /// Clock rate in Hz (e.g. 90000 for video)
    pub clock_rate: u32,
    /// Number of audio channels (0 for video)
    pub channels: u16,
    pub rtp_header_extensions: Vec<RTPHeaderExtension>,
    pub rtcp_feedback: Vec<RTCPFeedback>,
}

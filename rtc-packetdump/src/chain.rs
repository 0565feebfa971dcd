//! Interceptor Chain - Composes several interceptors into one.

use crate::error::Result;
use crate::stream_info::StreamInfo;
use crate::{Interceptor, RtcpReader, RtcpWriter, RtpReader, RtpWriter};
use std::sync::Arc;

/// An ordered list of interceptors acting as a single [`Interceptor`].
///
/// Each bind walks the interceptors in order; every interceptor wraps the
/// reader/writer returned by the one before it, so the last interceptor added
/// is the outermost wrapper and sees a packet first on write and last on read.
#[derive(Clone, Default)]
pub struct Chain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    /// Create a chain from interceptors, innermost first.
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self { interceptors }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl Interceptor for Chain {
    fn bind_rtcp_reader(&self, reader: Arc<dyn RtcpReader>) -> Arc<dyn RtcpReader> {
        self.interceptors
            .iter()
            .fold(reader, |reader, interceptor| interceptor.bind_rtcp_reader(reader))
    }

    fn bind_rtcp_writer(&self, writer: Arc<dyn RtcpWriter>) -> Arc<dyn RtcpWriter> {
        self.interceptors
            .iter()
            .fold(writer, |writer, interceptor| interceptor.bind_rtcp_writer(writer))
    }

    fn bind_local_stream(
        &self,
        info: &StreamInfo,
        writer: Arc<dyn RtpWriter>,
    ) -> Arc<dyn RtpWriter> {
        self.interceptors.iter().fold(writer, |writer, interceptor| {
            interceptor.bind_local_stream(info, writer)
        })
    }

    fn unbind_local_stream(&self, info: &StreamInfo) {
        for interceptor in &self.interceptors {
            interceptor.unbind_local_stream(info);
        }
    }

    fn bind_remote_stream(
        &self,
        info: &StreamInfo,
        reader: Arc<dyn RtpReader>,
    ) -> Arc<dyn RtpReader> {
        self.interceptors.iter().fold(reader, |reader, interceptor| {
            interceptor.bind_remote_stream(info, reader)
        })
    }

    fn unbind_remote_stream(&self, info: &StreamInfo) {
        for interceptor in &self.interceptors {
            interceptor.unbind_remote_stream(info);
        }
    }

    /// Close every interceptor, even if some fail; the first error is returned.
    fn close(&self) -> Result<()> {
        let mut result = Ok(());
        for interceptor in &self.interceptors {
            if let Err(err) = interceptor.close() {
                log::warn!("interceptor close failed: {err}");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }
}

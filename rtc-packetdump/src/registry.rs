//! Interceptor Registry - Builder for constructing interceptor chains.

use crate::Interceptor;
use crate::chain::Chain;
use crate::noop::NoopInterceptor;
use std::sync::Arc;

/// Registry for constructing interceptor chains.
///
/// Interceptors are added innermost first with [`with`](Registry::with); the
/// chain is extracted with [`build`](Registry::build).
///
/// # Example
///
/// ```ignore
/// use rtc_packetdump::{PacketDumpReceiverBuilder, PacketDumpSenderBuilder, Registry};
///
/// let chain = Registry::new()
///     .with(PacketDumpReceiverBuilder::new().build()?)
///     .with(PacketDumpSenderBuilder::new().build()?)
///     .build();
/// ```
///
/// # Helper Function Pattern
///
/// ```ignore
/// fn register_packet_dump(registry: Registry) -> Result<Registry> {
///     Ok(registry
///         .with(PacketDumpReceiverBuilder::new().build()?)
///         .with(PacketDumpSenderBuilder::new().build()?))
/// }
///
/// let chain = register_packet_dump(Registry::new())?.build();
/// ```
pub struct Registry {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Registry {
    /// Create a new registry.
    ///
    /// This places a `NoopInterceptor` as the innermost layer.
    pub fn new() -> Self {
        Registry {
            interceptors: vec![Arc::new(NoopInterceptor::new())],
        }
    }

    /// Add an interceptor wrapping everything added so far.
    pub fn with<I>(self, interceptor: I) -> Self
    where
        I: Interceptor + 'static,
    {
        self.with_shared(Arc::new(interceptor))
    }

    /// Add an interceptor that is also kept elsewhere, e.g. to be shared by
    /// several chains.
    pub fn with_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Build and return the interceptor chain.
    pub fn build(self) -> Chain {
        Chain::new(self.interceptors)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

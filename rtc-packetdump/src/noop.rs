//! NoOp Interceptor - A pass-through terminal for interceptor chains.

use crate::Interceptor;

/// An interceptor that hands every reader and writer back unchanged.
///
/// `NoopInterceptor` is the innermost layer of a [`Registry`](crate::Registry)
/// and a convenient stand-in wherever an [`Interceptor`] is required but
/// nothing should be observed.
///
/// # Example
///
/// ```ignore
/// use rtc_packetdump::{Interceptor, NoopInterceptor};
///
/// let noop = NoopInterceptor::new();
/// let reader = noop.bind_rtcp_reader(upstream);
/// assert!(Arc::ptr_eq(&reader, &upstream));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInterceptor;

impl NoopInterceptor {
    /// Create a new NoopInterceptor.
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for NoopInterceptor {}

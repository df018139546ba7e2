//! Interceptor composition.
//!
//! An [`InterceptorChain`] is an ordered list of layers. Wrapping a terminal
//! operation produces a single service with the terminal's signature: the
//! first layer added is outermost, the terminal innermost.
//!
//! ```text
//! chain: [trace, log, metrics]
//!
//! call → trace → log → metrics → terminal
//!                                   │
//! resp ← trace ← log ← metrics ←────┘
//! ```
//!
//! Unlike `tower::ServiceBuilder`, whose type grows with every layer, a chain
//! erases each step to a `BoxCloneService`, so chains can be assembled at
//! runtime from configuration and stored in a struct.

use std::fmt;
use std::sync::Arc;
use tower::util::BoxCloneService;
use tower::{Layer, Service};

type Wrap<R, Rsp, E> =
    Arc<dyn Fn(BoxCloneService<R, Rsp, E>) -> BoxCloneService<R, Rsp, E> + Send + Sync>;

/// Ordered, type-erased stack of interceptors.
pub struct InterceptorChain<R, Rsp, E> {
    layers: Vec<Wrap<R, Rsp, E>>,
}

impl<R, Rsp, E> InterceptorChain<R, Rsp, E>
where
    R: 'static,
    Rsp: 'static,
    E: 'static,
{
    /// An empty chain; wrapping returns the terminal operation as is.
    #[must_use]
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Append `layer` inside every layer added before it.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxCloneService<R, Rsp, E>> + Send + Sync + 'static,
        L::Service: Service<R, Response = Rsp, Error = E> + Clone + Send + 'static,
        <L::Service as Service<R>>::Future: Send + 'static,
    {
        self.layers
            .push(Arc::new(move |inner: BoxCloneService<R, Rsp, E>| {
                BoxCloneService::new(layer.layer(inner))
            }));
        self
    }

    /// Number of interceptors in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the chain has no interceptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wrap `terminal` with every interceptor, first-added outermost.
    pub fn service<S>(&self, terminal: S) -> BoxCloneService<R, Rsp, E>
    where
        S: Service<R, Response = Rsp, Error = E> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        self.layers
            .iter()
            .rev()
            .fold(BoxCloneService::new(terminal), |inner, wrap| wrap(inner))
    }
}

impl<R, Rsp, E> Default for InterceptorChain<R, Rsp, E>
where
    R: 'static,
    Rsp: 'static,
    E: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, Rsp, E> Clone for InterceptorChain<R, Rsp, E> {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.clone(),
        }
    }
}

impl<R, Rsp, E> fmt::Debug for InterceptorChain<R, Rsp, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// A chain is itself a layer, so it nests inside `ServiceBuilder` or
/// another chain.
impl<S, R, Rsp, E> Layer<S> for InterceptorChain<R, Rsp, E>
where
    S: Service<R, Response = Rsp, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    R: 'static,
    Rsp: 'static,
    E: 'static,
{
    type Service = BoxCloneService<R, Rsp, E>;

    fn layer(&self, inner: S) -> Self::Service {
        self.service(inner)
    }
}

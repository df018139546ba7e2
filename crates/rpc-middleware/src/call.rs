//! Request-like values flowing through interceptors.
//!
//! Interceptors never look at payloads. They only need the ambient context,
//! the endpoint name (method or topic) and, for client calls, the target
//! service. The [`Call`] trait exposes exactly that.

use crate::context::CallContext;

/// Default content type for new requests and publications.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// What interceptors may observe about an in-flight call.
pub trait Call {
    /// Ambient context of the call chain.
    fn context(&self) -> &CallContext;

    /// Replace the ambient context (used by trace propagation only).
    fn set_context(&mut self, context: CallContext);

    /// Instrumentation endpoint: method name for RPCs, topic for messages.
    fn endpoint(&self) -> &str;

    /// Target service for client calls.
    fn service(&self) -> Option<&str> {
        None
    }

    /// Payload content type, when known.
    fn content_type(&self) -> Option<&str> {
        None
    }
}

/// An RPC request, as seen by a client call or a server handler.
#[derive(Debug, Clone)]
pub struct Request<B> {
    context: CallContext,
    service: String,
    method: String,
    content_type: String,
    body: B,
}

impl<B> Request<B> {
    /// Create a request for `service`/`method` with an empty context.
    pub fn new(service: impl Into<String>, method: impl Into<String>, body: B) -> Self {
        Self {
            context: CallContext::new(),
            service: service.into(),
            method: method.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            body,
        }
    }

    /// Attach an ambient context.
    #[must_use]
    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    /// Override the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Target service name.
    pub fn service_name(&self) -> &str {
        &self.service
    }

    /// Method name, e.g. `Greeter.Hello`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request payload.
    pub fn body(&self) -> &B {
        &self.body
    }

    /// Consume the request, returning its payload.
    pub fn into_body(self) -> B {
        self.body
    }
}

impl<B> Call for Request<B> {
    fn context(&self) -> &CallContext {
        &self.context
    }

    fn set_context(&mut self, context: CallContext) {
        self.context = context;
    }

    fn endpoint(&self) -> &str {
        &self.method
    }

    fn service(&self) -> Option<&str> {
        Some(&self.service)
    }

    fn content_type(&self) -> Option<&str> {
        Some(&self.content_type)
    }
}

/// A message delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct Publication<M> {
    context: CallContext,
    topic: String,
    content_type: String,
    message: M,
}

impl<M> Publication<M> {
    /// Create a publication on `topic` with an empty context.
    pub fn new(topic: impl Into<String>, message: M) -> Self {
        Self {
            context: CallContext::new(),
            topic: topic.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            message,
        }
    }

    /// Attach an ambient context.
    #[must_use]
    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    /// Override the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Topic the message was published on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Message payload.
    pub fn message(&self) -> &M {
        &self.message
    }

    /// Consume the publication, returning its payload.
    pub fn into_message(self) -> M {
        self.message
    }
}

impl<M> Call for Publication<M> {
    fn context(&self) -> &CallContext {
        &self.context
    }

    fn set_context(&mut self, context: CallContext) {
        self.context = context;
    }

    fn endpoint(&self) -> &str {
        &self.topic
    }

    fn content_type(&self) -> Option<&str> {
        Some(&self.content_type)
    }
}

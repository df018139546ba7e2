//! Message broker capability and its instrumentation wrappers.
//!
//! A [`Broker`] publishes [`Message`]s to topics and delivers them to
//! subscribed handlers. [`MetricsBroker`] and [`LogBroker`] wrap any broker,
//! instrumenting `publish` and every subscribed handler while forwarding
//! the rest of the capability untouched:
//!
//! ```text
//! publish ─► LogBroker ─► MetricsBroker ─► broker ─► topic
//!                                                      │
//! handler ◄─ log wrap ◄── metrics wrap ◄── delivery ◄──┘
//! ```

pub mod logging;
pub mod metrics;

pub use logging::LogBroker;
pub use metrics::MetricsBroker;

use crate::call::{Call, Publication};
use crate::context::{CallContext, Metadata};
use crate::middleware::BoxFuture;
use async_trait::async_trait;
use common::error::BoxError;
use std::future::Future;
use std::sync::Arc;

/// Header key for the payload content type.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// A broker message: string headers plus an opaque body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Message headers, carried as the delivery's call context.
    pub header: Metadata,
    /// Opaque payload.
    pub body: Vec<u8>,
}

impl Message {
    /// A message with no headers.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            header: Metadata::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key, value);
        self
    }

    /// Copy the context's metadata into the headers, keeping existing ones.
    #[must_use]
    pub fn with_context(mut self, context: &CallContext) -> Self {
        if let Some(md) = context.metadata() {
            for (key, value) in md.iter() {
                if !self.header.contains_key(key) {
                    self.header.insert(key, value);
                }
            }
        }
        self
    }
}

/// Result of handling one delivered message.
pub type HandlerResult = Result<(), BoxError>;

/// Subscriber callback invoked once per delivered message.
pub type BrokerHandler = Arc<dyn Fn(Publication<Message>) -> BoxFuture<HandlerResult> + Send + Sync>;

/// Wrap an async function as a [`BrokerHandler`].
pub fn handler_fn<F, Fut>(f: F) -> BrokerHandler
where
    F: Fn(Publication<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |publication: Publication<Message>| -> BoxFuture<HandlerResult> {
        Box::pin(f(publication))
    })
}

/// Build the publication handed to subscribers for `message` on `topic`.
///
/// The headers become the delivery's call context and the
/// `Content-Type` header, when present, its content type.
#[must_use]
pub fn delivery(topic: &str, message: Message) -> Publication<Message> {
    let context = if message.header.is_empty() {
        CallContext::new()
    } else {
        CallContext::with_metadata(message.header.clone())
    };
    let content_type = message.header.get(CONTENT_TYPE_HEADER).map(str::to_string);

    let publication = Publication::new(topic, message).with_context(context);
    match content_type {
        Some(content_type) => publication.with_content_type(content_type),
        None => publication,
    }
}

/// Handle to an active subscription.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Subscribed topic.
    fn topic(&self) -> &str;

    /// Stop delivery to this subscription's handler.
    async fn unsubscribe(&self) -> Result<(), BoxError>;
}

/// Publish/subscribe capability.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Address of the underlying transport.
    fn address(&self) -> String;

    /// Connect to the transport.
    async fn connect(&self) -> Result<(), BoxError>;

    /// Disconnect from the transport.
    async fn disconnect(&self) -> Result<(), BoxError>;

    /// Publish `message` on `topic`.
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BoxError>;

    /// Deliver every message on `topic` to `handler`.
    async fn subscribe(
        &self,
        topic: &str,
        handler: BrokerHandler,
    ) -> Result<Box<dyn Subscription>, BoxError>;
}

#[async_trait]
impl<B: Broker + ?Sized> Broker for Arc<B> {
    fn address(&self) -> String {
        (**self).address()
    }

    async fn connect(&self) -> Result<(), BoxError> {
        (**self).connect().await
    }

    async fn disconnect(&self) -> Result<(), BoxError> {
        (**self).disconnect().await
    }

    async fn publish(&self, topic: &str, message: Message) -> Result<(), BoxError> {
        (**self).publish(topic, message).await
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: BrokerHandler,
    ) -> Result<Box<dyn Subscription>, BoxError> {
        (**self).subscribe(topic, handler).await
    }
}

/// Endpoint name a publication is instrumented under.
pub(crate) fn topic_of(publication: &Publication<Message>) -> String {
    publication.endpoint().to_string()
}

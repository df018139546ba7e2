//! In-memory broker.
//!
//! Publishes are delivered synchronously to every handler subscribed to the
//! topic before `publish` returns. Handler errors are counted, not returned,
//! matching a fire-and-forget broker.
//!
//! # Example
//!
//! ```rust,ignore
//! use rpc_test_utils::InMemoryBroker;
//!
//! let broker = InMemoryBroker::new();
//! broker.subscribe("orders.created", handler).await?;
//! broker.publish("orders.created", Message::new(b"{}".to_vec())).await?;
//!
//! assert_eq!(broker.published().len(), 1);
//! ```

use async_trait::async_trait;
use common::error::BoxError;
use common::rpc_error::RpcError;
use rpc_middleware::broker::{delivery, Broker, BrokerHandler, Message, Subscription};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Address reported by [`InMemoryBroker`].
pub const IN_MEMORY_ADDRESS: &str = "memory://local";

/// In-memory broker for tests.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Mutex<InMemoryBrokerInner>>,
}

#[derive(Default)]
struct InMemoryBrokerInner {
    connected: bool,
    next_id: u64,
    /// (subscription id, topic, handler)
    subscribers: Vec<(u64, String, BrokerHandler)>,
    /// Every accepted publish, in order
    published: Vec<(String, Message)>,
    /// Error returned by `publish` instead of delivering
    publish_error: Option<RpcError>,
    /// Handler failures observed during delivery
    handler_errors: usize,
}

impl InMemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `publish` fail with `error` without delivering.
    #[must_use]
    pub fn with_publish_error(self, error: RpcError) -> Self {
        self.inner.lock().unwrap().publish_error = Some(error);
        self
    }

    /// Every accepted publish, in order.
    pub fn published(&self) -> Vec<(String, Message)> {
        self.inner.lock().unwrap().published.clone()
    }

    /// Handlers currently subscribed to `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .iter()
            .filter(|(_, t, _)| t == topic)
            .count()
    }

    /// Handler failures observed during delivery.
    pub fn handler_errors(&self) -> usize {
        self.inner.lock().unwrap().handler_errors
    }

    /// Whether `connect` was called more recently than `disconnect`.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }
}

impl fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("InMemoryBroker")
            .field("connected", &inner.connected)
            .field("subscribers", &inner.subscribers.len())
            .field("published", &inner.published.len())
            .finish()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    fn address(&self) -> String {
        IN_MEMORY_ADDRESS.to_string()
    }

    async fn connect(&self) -> Result<(), BoxError> {
        self.inner.lock().unwrap().connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BoxError> {
        self.inner.lock().unwrap().connected = false;
        Ok(())
    }

    async fn publish(&self, topic: &str, message: Message) -> Result<(), BoxError> {
        let handlers: Vec<BrokerHandler> = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(error) = inner.publish_error.clone() {
                return Err(Box::new(error));
            }
            inner.published.push((topic.to_string(), message.clone()));
            inner
                .subscribers
                .iter()
                .filter(|(_, t, _)| t == topic)
                .map(|(_, _, h)| Arc::clone(h))
                .collect()
        };

        for handler in handlers {
            if handler(delivery(topic, message.clone())).await.is_err() {
                self.inner.lock().unwrap().handler_errors += 1;
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: BrokerHandler,
    ) -> Result<Box<dyn Subscription>, BoxError> {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.subscribers.push((id, topic.to_string(), handler));
            id
        };

        Ok(Box::new(InMemorySubscription {
            id,
            topic: topic.to_string(),
            inner: Arc::clone(&self.inner),
        }))
    }
}

/// Subscription handle returned by [`InMemoryBroker`].
pub struct InMemorySubscription {
    id: u64,
    topic: String,
    inner: Arc<Mutex<InMemoryBrokerInner>>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn unsubscribe(&self) -> Result<(), BoxError> {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .retain(|(id, _, _)| *id != self.id);
        Ok(())
    }
}

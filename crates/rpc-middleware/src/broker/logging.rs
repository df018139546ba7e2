//! Broker logging.

use super::{topic_of, Broker, BrokerHandler, HandlerResult, Message, Subscription};
use crate::call::Publication;
use crate::middleware::logging::{describe_error, log_finish, log_start, round_millis, Side};
use crate::middleware::BoxFuture;
use async_trait::async_trait;
use common::error::BoxError;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;

const TARGET: &str = "rpc.middleware.log";

/// Broker wrapper logging publishes and deliveries.
#[derive(Debug)]
pub struct LogBroker<B> {
    inner: B,
}

impl<B: Broker> LogBroker<B> {
    /// Wrap `inner`.
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// The wrapped broker.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: Broker> Broker for LogBroker<B> {
    fn address(&self) -> String {
        self.inner.address()
    }

    async fn connect(&self) -> Result<(), BoxError> {
        self.inner.connect().await
    }

    async fn disconnect(&self) -> Result<(), BoxError> {
        self.inner.disconnect().await
    }

    async fn publish(&self, topic: &str, message: Message) -> Result<(), BoxError> {
        info!(
            target: TARGET,
            ctx = ?message.header,
            topic = topic,
            "Publishing message"
        );

        let begin = Instant::now();
        let result = self.inner.publish(topic, message).await;
        let duration_ms = round_millis(begin.elapsed());

        match &result {
            Ok(()) => info!(target: TARGET, topic = topic, duration_ms, "Published message"),
            Err(e) => info!(
                target: TARGET,
                topic = topic,
                duration_ms,
                error = %describe_error(e),
                "Published message"
            ),
        }
        result
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: BrokerHandler,
    ) -> Result<Box<dyn Subscription>, BoxError> {
        let wrapped: BrokerHandler = Arc::new(
            move |publication: Publication<Message>| -> BoxFuture<HandlerResult> {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    log_start(Side::Subscriber, &publication);
                    let topic = topic_of(&publication);
                    let begin = Instant::now();
                    let result = handler(publication).await;
                    log_finish(Side::Subscriber, &topic, begin.elapsed(), result.as_ref().err());
                    result
                })
            },
        );
        self.inner.subscribe(topic, wrapped).await
    }
}

//! Broker metrics.
//!
//! Publishes are recorded under `service.publish.<topic>.<bucket>` and
//! deliveries under `service.subscribe.<topic>.<bucket>`, classified the
//! same way as RPC results.

use super::{topic_of, Broker, BrokerHandler, HandlerResult, Message, Subscription};
use crate::call::Publication;
use crate::config::{MiddlewareConfig, DEFAULT_PUBLISH_METRIC, DEFAULT_SUBSCRIBE_METRIC};
use crate::middleware::metrics::record_call;
use crate::middleware::BoxFuture;
use crate::stats::{MetricsSink, StatsTable};
use async_trait::async_trait;
use common::error::BoxError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Broker wrapper recording publish and delivery latency per topic.
#[derive(Debug)]
pub struct MetricsBroker<B> {
    inner: B,
    publish_stats: Arc<StatsTable>,
    subscribe_stats: Arc<StatsTable>,
}

impl<B: Broker> MetricsBroker<B> {
    /// Wrap `inner` using the default metric names.
    pub fn new(inner: B, sink: Arc<dyn MetricsSink>, unit: Duration) -> Self {
        Self {
            inner,
            publish_stats: Arc::new(StatsTable::new(
                Arc::clone(&sink),
                DEFAULT_PUBLISH_METRIC,
                unit,
            )),
            subscribe_stats: Arc::new(StatsTable::new(sink, DEFAULT_SUBSCRIBE_METRIC, unit)),
        }
    }

    /// Wrap `inner` using configured metric names and unit.
    pub fn from_config(inner: B, sink: Arc<dyn MetricsSink>, config: &MiddlewareConfig) -> Self {
        Self {
            inner,
            publish_stats: Arc::new(StatsTable::new(
                Arc::clone(&sink),
                config.publish_metric.clone(),
                config.unit,
            )),
            subscribe_stats: Arc::new(StatsTable::new(
                sink,
                config.subscribe_metric.clone(),
                config.unit,
            )),
        }
    }

    /// Stats for published messages.
    pub fn publish_stats(&self) -> &Arc<StatsTable> {
        &self.publish_stats
    }

    /// Stats for delivered messages.
    pub fn subscribe_stats(&self) -> &Arc<StatsTable> {
        &self.subscribe_stats
    }

    /// The wrapped broker.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: Broker> Broker for MetricsBroker<B> {
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
        let begin = Instant::now();
        let result = self.inner.publish(topic, message).await;
        record_call(
            &self.publish_stats,
            &[],
            topic,
            result.as_ref().err(),
            begin.elapsed(),
        );
        result
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: BrokerHandler,
    ) -> Result<Box<dyn Subscription>, BoxError> {
        let stats = Arc::clone(&self.subscribe_stats);
        let wrapped: BrokerHandler = Arc::new(
            move |publication: Publication<Message>| -> BoxFuture<HandlerResult> {
                let handler = Arc::clone(&handler);
                let stats = Arc::clone(&stats);
                Box::pin(async move {
                    let begin = Instant::now();
                    let topic = topic_of(&publication);
                    let result = handler(publication).await;
                    record_call(&stats, &[], &topic, result.as_ref().err(), begin.elapsed());
                    result
                })
            },
        );
        self.inner.subscribe(topic, wrapped).await
    }
}

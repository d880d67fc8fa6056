use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
};

use crate::domain::order::OrderAggregate;
use super::notifier::{NotifyError, OrderCreatedNotice, OrderNotifier};

/// Publishes order-created notices to a Redpanda/Kafka topic, keyed by order id
pub struct RedpandaNotifier {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl RedpandaNotifier {
    pub fn new(brokers: &str, topic: &str, send_timeout: Duration) -> Result<Self, NotifyError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", send_timeout.as_millis().to_string())
            .create()
            .map_err(|e| NotifyError::Unavailable(format!("failed to create producer: {}", e)))?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
            send_timeout,
        })
    }
}

#[async_trait]
impl OrderNotifier for RedpandaNotifier {
    async fn notify_order_created(&self, order: &OrderAggregate) -> Result<(), NotifyError> {
        let key = order.id.to_string();
        let payload = serde_json::to_string(&OrderCreatedNotice::from(order))?;

        let record = FutureRecord::to(&self.topic)
            .key(&key)
            .payload(&payload);

        self.producer
            .send(record, rdkafka::util::Timeout::After(self.send_timeout))
            .await
            .map_err(|(e, _)| NotifyError::Unavailable(format!("kafka send error: {}", e)))?;

        tracing::info!(
            topic = %self.topic,
            key = %key,
            order_number = %order.order_number,
            "Published order created to Redpanda"
        );
        Ok(())
    }
}

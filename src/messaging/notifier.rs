use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::order::OrderAggregate;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification timed out after {0:?}")]
    Timeout(Duration),

    #[error("notification transport unavailable: {0}")]
    Unavailable(String),

    #[error("notification circuit is open")]
    CircuitOpen,

    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify_order_created(&self, order: &OrderAggregate) -> Result<(), NotifyError>;
}

/// Payload published when an order is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedNotice {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub vendor_ids: Vec<Uuid>,
    pub item_count: usize,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&OrderAggregate> for OrderCreatedNotice {
    fn from(order: &OrderAggregate) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.to_string(),
            customer_id: order.customer_id,
            vendor_ids: order.vendor_orders.iter().map(|group| group.vendor_id).collect(),
            item_count: order.items.len(),
            total_price: order.prices.total_price,
            created_at: order.created_at,
        }
    }
}

// ============================================================================
// Log Notifier
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn notify_order_created(&self, order: &OrderAggregate) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            vendors = order.vendor_orders.len(),
            total = %order.prices.total_price,
            "New order created"
        );
        Ok(())
    }
}

// ============================================================================
// Broadcast Notifier - in-process subscribers (dashboards, tests)
// ============================================================================

#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<OrderCreatedNotice>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderCreatedNotice> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl OrderNotifier for BroadcastNotifier {
    async fn notify_order_created(&self, order: &OrderAggregate) -> Result<(), NotifyError> {
        // No subscribers is not an error for a fire-and-forget event
        match self.sender.send(OrderCreatedNotice::from(order)) {
            Ok(receivers) => {
                tracing::debug!(order_id = %order.id, receivers = receivers, "Broadcast order created");
            }
            Err(_) => {
                tracing::debug!(order_id = %order.id, "No subscribers for order created");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Guarded Notifier - timeout + circuit breaker around any transport
// ============================================================================

pub struct GuardedNotifier {
    inner: Arc<dyn OrderNotifier>,
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl GuardedNotifier {
    pub fn new(inner: Arc<dyn OrderNotifier>, timeout: Duration, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new("order-notifier", config),
            timeout,
        }
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.state().await
    }
}

#[async_trait]
impl OrderNotifier for GuardedNotifier {
    async fn notify_order_created(&self, order: &OrderAggregate) -> Result<(), NotifyError> {
        let timeout = self.timeout;
        let result = self
            .breaker
            .call(async {
                tokio::time::timeout(timeout, self.inner.notify_order_created(order))
                    .await
                    .map_err(|_| NotifyError::Timeout(timeout))?
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::CircuitOpen) => Err(NotifyError::CircuitOpen),
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
        }
    }
}

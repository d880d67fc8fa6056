use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::event_sourcing::core::DomainEvent;
use super::numbering::OrderNumber;
use super::pricing::PriceBreakdown;
use super::value_objects::{
    CancelledBy, OrderLineItem, OrderStatus, PaymentInfo, ShippingAddress, VendorOrderStatus,
    VendorSubOrder,
};

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    StatusChanged(OrderStatusChanged),
    Cancelled(OrderCancelled),
    VendorOrderUpdated(VendorOrderUpdated),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "OrderPlaced",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
            OrderEvent::Cancelled(_) => "OrderCancelled",
            OrderEvent::VendorOrderUpdated(_) => "VendorOrderUpdated",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Placed - stock reserved, payment recorded, order opened
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderPlaced {
    pub order_number: OrderNumber,
    pub customer_id: Uuid,
    pub items: Vec<OrderLineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_info: PaymentInfo,
    pub prices: PriceBreakdown,
    pub vendor_orders: Vec<VendorSubOrder>,
    #[serde(default)]
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
}

/// Order Status Changed - any transition other than cancellation
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderStatusChanged {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Order Cancelled - stock for every line item is to be released
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCancelled {
    pub from: OrderStatus,
    pub reason: Option<String>,
    pub cancelled_by: CancelledBy,
    pub cancelled_at: DateTime<Utc>,
}

/// Vendor Order Updated - one vendor moved its sub-order
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VendorOrderUpdated {
    pub vendor_id: Uuid,
    pub from: VendorOrderStatus,
    pub to: VendorOrderStatus,
    pub tracking_number: Option<String>,
    pub updated_at: DateTime<Utc>,
}

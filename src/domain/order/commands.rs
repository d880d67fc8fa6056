use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::catalog::StockLine;
use super::numbering::OrderNumber;
use super::pricing::PriceBreakdown;
use super::value_objects::{
    CancelledBy, OrderLineItem, OrderStatus, PaymentInfo, PaymentMethod, ShippingAddress,
    VendorOrderStatus, VendorSubOrder,
};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Validated checkout request, produced by `PlaceOrderRequest::validate`
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrder {
    pub customer_id: Uuid,
    pub items: Vec<StockLine>,
    pub shipping_address: ShippingAddress,
    pub payment: PaymentRequest,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub id: String,
    pub method: PaymentMethod,
}

/// Everything needed to open a new order stream.
///
/// Built by the command handler once stock is reserved, prices computed, the
/// items split by vendor and a number assigned.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_number: OrderNumber,
    pub customer_id: Uuid,
    pub items: Vec<OrderLineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_info: PaymentInfo,
    pub prices: PriceBreakdown,
    pub vendor_orders: Vec<VendorSubOrder>,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
}

/// Commands against an existing order
#[derive(Debug, Clone)]
pub enum OrderCommand {
    /// Administrative status change
    ChangeStatus {
        to: OrderStatus,
        tracking_number: Option<String>,
        /// Only recorded when moving to shipped
        estimated_delivery: Option<DateTime<Utc>>,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
    Cancel {
        reason: Option<String>,
        cancelled_by: CancelledBy,
        at: DateTime<Utc>,
    },
    /// Status change of one vendor's sub-order, by that vendor
    UpdateVendorOrder {
        vendor_id: Uuid,
        status: VendorOrderStatus,
        tracking_number: Option<String>,
        at: DateTime<Utc>,
    },
}

impl OrderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::ChangeStatus { .. } => "ChangeStatus",
            OrderCommand::Cancel { .. } => "Cancel",
            OrderCommand::UpdateVendorOrder { .. } => "UpdateVendorOrder",
        }
    }
}

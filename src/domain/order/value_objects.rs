use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::ProductSnapshot;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Overall order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    /// Allowed transitions:
    /// pending → {processing, cancelled}, processing → {shipped, cancelled},
    /// shipped → {delivered, returned}, delivered → {returned}
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Returned)
                | (Delivered, Returned)
        )
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Fulfillment status of one vendor's share of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorOrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl VendorOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorOrderStatus::Pending => "pending",
            VendorOrderStatus::Processing => "processing",
            VendorOrderStatus::Shipped => "shipped",
            VendorOrderStatus::Delivered => "delivered",
            VendorOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: VendorOrderStatus) -> bool {
        use VendorOrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }
}

impl fmt::Display for VendorOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    Cod,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Cod => "cod",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(PaymentMethod::Stripe),
            "paypal" => Ok(PaymentMethod::Paypal),
            "cod" => Ok(PaymentMethod::Cod),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value: {0}")]
pub struct UnknownVariant(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// External payment descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub id: String,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
}

/// One product + quantity, with price and vendor captured at order time.
///
/// Nothing here refers back to the live catalog record: later price or
/// ownership changes on the product never reach an existing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub product_id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
    pub discount: Decimal,
    pub total_price: Decimal,
    pub image: String,
}

impl OrderLineItem {
    /// Copy the order-relevant fields out of a product snapshot
    pub fn capture(product: &ProductSnapshot, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            vendor_id: product.vendor_id,
            name: product.name.clone(),
            quantity,
            price: product.price,
            discount: product.discount,
            total_price: product.price * Decimal::from(quantity),
            image: product.images.first().cloned().unwrap_or_default(),
        }
    }
}

/// One vendor's share of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorSubOrder {
    pub vendor_id: Uuid,
    pub items: Vec<OrderLineItem>,
    pub status: VendorOrderStatus,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl VendorSubOrder {
    pub fn pending(vendor_id: Uuid) -> Self {
        Self {
            vendor_id,
            items: Vec::new(),
            status: VendorOrderStatus::Pending,
            tracking_number: None,
            shipped_at: None,
            delivered_at: None,
        }
    }
}

/// Who cancelled an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum CancelledBy {
    Customer(Uuid),
    Admin,
}

/// Compact view used in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_number: String,
    pub total_items: usize,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_status_wire_values() {
        let json: Vec<String> = OrderStatus::ALL
            .iter()
            .map(|s| serde_json::to_string(s).unwrap())
            .collect();
        assert_eq!(
            json,
            vec![
                "\"pending\"",
                "\"processing\"",
                "\"shipped\"",
                "\"delivered\"",
                "\"cancelled\"",
                "\"returned\""
            ]
        );
    }

    #[test]
    fn test_order_status_transition_table() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Returned));
        assert!(Delivered.can_transition_to(Returned));

        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Pending));

        for next in OrderStatus::ALL {
            assert!(!Cancelled.can_transition_to(next));
            assert!(!Returned.can_transition_to(next));
        }
    }

    #[test]
    fn test_vendor_status_transition_table() {
        use VendorOrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_payment_method_wire_values() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"bank_transfer\""
        );
        assert_eq!("paypal".parse::<PaymentMethod>(), Ok(PaymentMethod::Paypal));
        assert!("cash".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_line_item_captures_snapshot() {
        let product = ProductSnapshot {
            id: Uuid::new_v4(),
            name: "Desk Lamp".to_string(),
            price: dec!(24.50),
            stock: 8,
            is_active: true,
            vendor_id: Uuid::new_v4(),
            images: vec!["lamp-front.jpg".to_string(), "lamp-side.jpg".to_string()],
            discount: dec!(15),
        };

        let item = OrderLineItem::capture(&product, 3);

        assert_eq!(item.vendor_id, product.vendor_id);
        assert_eq!(item.total_price, dec!(73.50));
        assert_eq!(item.discount, dec!(15));
        assert_eq!(item.image, "lamp-front.jpg");
    }

    #[test]
    fn test_cancelled_by_serialization() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(CancelledBy::Customer(id)).unwrap();
        assert_eq!(json["role"], "customer");
        assert_eq!(json["id"], id.to_string());
    }
}

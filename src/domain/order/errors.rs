use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::storage::StoreError;
use super::value_objects::{OrderStatus, VendorOrderStatus};

// ============================================================================
// Order Errors
// ============================================================================
//
// Every failure maps onto one stable kind:
// - Validation: malformed request, detected before any mutation
// - NotFound:   referenced product or order is absent
// - Conflict:   stock, availability or state-machine violations
// - Downstream: storage or sequence allocation failed
//
// Downstream messages never include storage details; the cause is kept as
// the error source for logs.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Downstream,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Downstream => "downstream",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field-level problems found in one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}", describe(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid request: {0}")]
    Validation(ValidationErrors),

    #[error("At least one item is required")]
    EmptyItems,

    #[error("Quantity must be at least 1 (product {product_id})")]
    InvalidQuantity { product_id: Uuid, quantity: u32 },

    #[error("Order draft rejected: {0}")]
    InvalidDraft(&'static str),

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Product {name} is not available")]
    ProductInactive { product_id: Uuid, name: String },

    #[error("Insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order cannot be cancelled at this stage ({0})")]
    OrderNotCancellable(OrderStatus),

    #[error("Cannot change vendor order status from {from} to {to}")]
    InvalidVendorTransition {
        from: VendorOrderStatus,
        to: VendorOrderStatus,
    },

    #[error("Not authorized to update this order")]
    VendorNotAuthorized { vendor_id: Uuid },

    #[error("Order is {0} and can no longer be fulfilled")]
    OrderClosed(OrderStatus),

    #[error("Order {0} was modified concurrently, retry the request")]
    ConcurrentModification(Uuid),

    #[error("Order numbers for {0} are exhausted")]
    SequenceExhausted(NaiveDate),

    #[error("Stock could not be released for {count} line item(s)")]
    StockReleaseFailed { count: usize },

    #[error("Order storage is unavailable")]
    Storage(#[source] StoreError),

    #[error("Order history is inconsistent")]
    NotInitialized,
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Validation(_)
            | OrderError::EmptyItems
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidDraft(_) => ErrorKind::Validation,

            OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => ErrorKind::NotFound,

            OrderError::ProductInactive { .. }
            | OrderError::InsufficientStock { .. }
            | OrderError::InvalidTransition { .. }
            | OrderError::OrderNotCancellable(_)
            | OrderError::InvalidVendorTransition { .. }
            | OrderError::VendorNotAuthorized { .. }
            | OrderError::OrderClosed(_)
            | OrderError::ConcurrentModification(_) => ErrorKind::Conflict,

            OrderError::SequenceExhausted(_)
            | OrderError::StockReleaseFailed { .. }
            | OrderError::Storage(_)
            | OrderError::NotInitialized => ErrorKind::Downstream,
        }
    }

    /// Stable, user-facing shape of this error
    pub fn to_response(&self) -> ErrorResponse {
        let fields = match self {
            OrderError::Validation(errors) => errors.errors.clone(),
            _ => Vec::new(),
        };

        ErrorResponse {
            kind: self.kind(),
            message: self.to_string(),
            fields,
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { aggregate_id, .. } => {
                OrderError::ConcurrentModification(aggregate_id)
            }
            other => OrderError::Storage(other),
        }
    }
}

impl From<ValidationErrors> for OrderError {
    fn from(errors: ValidationErrors) -> Self {
        OrderError::Validation(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(OrderError::EmptyItems.kind(), ErrorKind::Validation);
        assert_eq!(OrderError::ProductNotFound(Uuid::new_v4()).kind(), ErrorKind::NotFound);
        assert_eq!(
            OrderError::OrderNotCancellable(OrderStatus::Shipped).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            OrderError::InsufficientStock {
                product_id: Uuid::new_v4(),
                name: "Mug".to_string(),
                requested: 3,
                available: 2,
            }
            .kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_storage_error_message_hides_details() {
        let err: OrderError =
            StoreError::Unavailable("connection refused at 10.0.0.5:5432".to_string()).into();

        assert_eq!(err.kind(), ErrorKind::Downstream);
        assert_eq!(err.to_string(), "Order storage is unavailable");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_version_conflict_maps_to_concurrent_modification() {
        let id = Uuid::new_v4();
        let err: OrderError = StoreError::VersionConflict {
            aggregate_id: id,
            expected: 1,
            actual: 2,
        }
        .into();

        assert!(matches!(err, OrderError::ConcurrentModification(found) if found == id));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_validation_response_lists_fields() {
        let mut errors = ValidationErrors::default();
        errors.push("items[0].quantity", "Quantity must be at least 1");
        errors.push("shippingAddress.city", "Shipping city is required");

        let response = OrderError::from(errors).to_response();
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["kind"], "validation");
        assert_eq!(json["fields"].as_array().unwrap().len(), 2);
        assert_eq!(json["fields"][1]["field"], "shippingAddress.city");
    }

    #[test]
    fn test_validation_errors_display_every_field() {
        let mut errors = ValidationErrors::default();
        errors.push("items", "At least one item is required");
        errors.push("paymentInfo.id", "Payment ID is required");

        assert_eq!(
            errors.to_string(),
            "items: At least one item is required; paymentInfo.id: Payment ID is required"
        );
        assert_eq!(
            OrderError::from(errors).to_string(),
            "Invalid request: items: At least one item is required; paymentInfo.id: Payment ID is required"
        );
    }
}

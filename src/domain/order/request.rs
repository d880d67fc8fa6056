use serde::Deserialize;
use uuid::Uuid;

use crate::domain::catalog::StockLine;
use super::commands::{PaymentRequest, PlaceOrder};
use super::errors::ValidationErrors;
use super::value_objects::{PaymentMethod, ShippingAddress};

// ============================================================================
// Checkout request boundary
// ============================================================================
//
// The loosely-typed body is checked once, every problem is reported with its
// field path, and the result is a strongly-typed `PlaceOrder` command. Nothing
// downstream re-validates shape.
//
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddressRequest,
    pub payment_info: PaymentInfoRequest,
    /// Free-text delivery note from the customer
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderItemRequest {
    pub product: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddressRequest {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentInfoRequest {
    pub id: String,
    pub method: String,
}

impl PlaceOrderRequest {
    pub fn validate(&self, customer_id: Uuid) -> Result<PlaceOrder, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.items.is_empty() {
            errors.push("items", "At least one item is required");
        }

        let mut items = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            let product_id = Uuid::parse_str(item.product.trim()).ok();
            if product_id.is_none() {
                errors.push(format!("items[{}].product", index), "Invalid product ID");
            }

            let quantity = u32::try_from(item.quantity).ok().filter(|q| *q >= 1);
            if quantity.is_none() {
                errors.push(format!("items[{}].quantity", index), "Quantity must be at least 1");
            }

            if let (Some(product_id), Some(quantity)) = (product_id, quantity) {
                items.push(StockLine { product_id, quantity });
            }
        }

        let address = &self.shipping_address;
        let shipping_address = ShippingAddress {
            name: required(&mut errors, "shippingAddress.name", &address.name, "Shipping name is required"),
            phone: required(&mut errors, "shippingAddress.phone", &address.phone, "Shipping phone is required"),
            street: required(&mut errors, "shippingAddress.street", &address.street, "Shipping street is required"),
            city: required(&mut errors, "shippingAddress.city", &address.city, "Shipping city is required"),
            state: required(&mut errors, "shippingAddress.state", &address.state, "Shipping state is required"),
            zip_code: required(&mut errors, "shippingAddress.zipCode", &address.zip_code, "Shipping zip code is required"),
            country: required(&mut errors, "shippingAddress.country", &address.country, "Shipping country is required"),
        };

        let payment_id = required(&mut errors, "paymentInfo.id", &self.payment_info.id, "Payment ID is required");
        let method = self.payment_info.method.parse::<PaymentMethod>().ok();
        if method.is_none() {
            errors.push("paymentInfo.method", "Invalid payment method");
        }

        match method {
            Some(method) if errors.is_empty() => Ok(PlaceOrder {
                customer_id,
                items,
                shipping_address,
                payment: PaymentRequest { id: payment_id, method },
                notes: self
                    .notes
                    .as_deref()
                    .map(str::trim)
                    .filter(|note| !note.is_empty())
                    .map(str::to_string),
            }),
            _ => Err(errors),
        }
    }
}

fn required(errors: &mut ValidationErrors, field: &str, value: &str, message: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(field, message);
    }
    trimmed.to_string()
}

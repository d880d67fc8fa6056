use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only view of a catalog product, as returned by the catalog accessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: u32,
    pub is_active: bool,
    pub vendor_id: Uuid,
    pub images: Vec<String>,
    /// Per-unit discount percentage (0-100)
    pub discount: Decimal,
}

/// Quantity of one product moved in or out of stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Outcome of a single stock adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockAdjustment {
    /// Applied; carries the stock level after the change
    Applied { stock: u32 },
    /// A decrement would have taken stock below zero; nothing changed
    Insufficient { available: u32 },
    /// The same release was recorded before; nothing changed
    AlreadyReleased { stock: u32 },
    NotFound,
}

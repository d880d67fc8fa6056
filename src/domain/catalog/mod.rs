// ============================================================================
// Catalog Domain - product lookups and stock reservation
// ============================================================================
//
// The catalog itself is an external collaborator; this module defines the
// contract the order engine needs from it and the reservation logic built on
// top of that contract.
//
// ============================================================================

use async_trait::async_trait;
use uuid::Uuid;

use crate::storage::StoreError;

pub mod inventory;
pub mod product;

pub use inventory::{CheckedLine, Inventory, Reservation};
pub use product::{ProductSnapshot, StockAdjustment, StockLine};

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>, StoreError>;

    /// Add `delta` to the product's stock.
    ///
    /// Negative deltas are a single compare-and-decrement: they apply only if
    /// the stock covers them, otherwise nothing changes and
    /// `StockAdjustment::Insufficient` is returned.
    async fn adjust_stock(&self, product_id: Uuid, delta: i64) -> Result<StockAdjustment, StoreError>;

    /// Put `quantity` units reserved under `reference` (the order id) back.
    ///
    /// Applied at most once per `(reference, product_id)`: a repeated call,
    /// such as a retry after a lost reply, returns
    /// `StockAdjustment::AlreadyReleased` and leaves stock alone.
    async fn restock(
        &self,
        reference: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<StockAdjustment, StoreError>;
}

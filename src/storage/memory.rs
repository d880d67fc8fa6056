use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::catalog::{Catalog, ProductSnapshot, StockAdjustment};
use crate::domain::order::OrderSequence;
use super::StoreError;

// ============================================================================
// In-Memory Catalog
// ============================================================================
//
// A single mutex around the product map makes each stock adjustment a true
// compare-and-decrement, matching what the PostgreSQL adapter gets from a
// conditional UPDATE. Releases are recorded under the same lock, keyed by
// (reference, product), so a repeated release is a no-op.
//
// ============================================================================

#[derive(Default)]
struct CatalogState {
    products: HashMap<Uuid, ProductSnapshot>,
    released: HashSet<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<ProductSnapshot>) -> Self {
        Self {
            state: Mutex::new(CatalogState {
                products: products.into_iter().map(|p| (p.id, p)).collect(),
                released: HashSet::new(),
            }),
        }
    }

    pub async fn insert(&self, product: ProductSnapshot) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn remove(&self, product_id: Uuid) -> Option<ProductSnapshot> {
        self.state.lock().await.products.remove(&product_id)
    }

    pub async fn stock_of(&self, product_id: Uuid) -> Option<u32> {
        self.state.lock().await.products.get(&product_id).map(|p| p.stock)
    }

    pub async fn set_stock(&self, product_id: Uuid, stock: u32) {
        if let Some(product) = self.state.lock().await.products.get_mut(&product_id) {
            product.stock = stock;
        }
    }

    pub async fn set_active(&self, product_id: Uuid, is_active: bool) {
        if let Some(product) = self.state.lock().await.products.get_mut(&product_id) {
            product.is_active = is_active;
        }
    }
}

fn apply_delta(product: &mut ProductSnapshot, delta: i64) -> Result<StockAdjustment, StoreError> {
    let next = i64::from(product.stock) + delta;
    if next < 0 {
        return Ok(StockAdjustment::Insufficient { available: product.stock });
    }

    product.stock = u32::try_from(next)
        .map_err(|_| StoreError::Corrupt(format!("stock overflow for product {}", product.id)))?;

    Ok(StockAdjustment::Applied { stock: product.stock })
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>, StoreError> {
        Ok(self.state.lock().await.products.get(&product_id).cloned())
    }

    async fn adjust_stock(&self, product_id: Uuid, delta: i64) -> Result<StockAdjustment, StoreError> {
        let mut state = self.state.lock().await;

        match state.products.get_mut(&product_id) {
            Some(product) => apply_delta(product, delta),
            None => Ok(StockAdjustment::NotFound),
        }
    }

    async fn restock(
        &self,
        reference: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<StockAdjustment, StoreError> {
        let mut state = self.state.lock().await;
        let CatalogState { products, released } = &mut *state;

        let Some(product) = products.get_mut(&product_id) else {
            return Ok(StockAdjustment::NotFound);
        };

        if released.contains(&(reference, product_id)) {
            return Ok(StockAdjustment::AlreadyReleased { stock: product.stock });
        }

        let outcome = apply_delta(product, i64::from(quantity))?;
        released.insert((reference, product_id));
        Ok(outcome)
    }
}

// ============================================================================
// In-Memory Order Sequence
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderSequence {
    counters: Mutex<HashMap<NaiveDate, u32>>,
}

impl InMemoryOrderSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `issued` numbers were already handed out on `day`
    pub async fn seed(&self, day: NaiveDate, issued: u32) {
        self.counters.lock().await.insert(day, issued);
    }
}

#[async_trait]
impl OrderSequence for InMemoryOrderSequence {
    async fn next(&self, day: NaiveDate) -> Result<u32, StoreError> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(day).or_insert(0);
        *counter = counter.saturating_add(1);
        Ok(*counter)
    }
}

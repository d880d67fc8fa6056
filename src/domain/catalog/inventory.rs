use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::try_join_all;
use uuid::Uuid;

use crate::domain::order::OrderError;
use crate::metrics::Metrics;
use crate::storage::StoreError;
use crate::utils::{retry_on_transient, RetryConfig};
use super::product::{ProductSnapshot, StockAdjustment, StockLine};
use super::Catalog;

// ============================================================================
// Inventory Reservation
// ============================================================================
//
// reserve = check + commit
//
// check:  resolve every product and validate it (exists, active, enough
//         stock for the summed quantity of all lines naming it). No stock is
//         touched; the first failure aborts the whole request.
// commit: compare-and-decrement each line in order. A late failure (another
//         order took the stock between check and commit) rolls back every
//         decrement already applied before the error is returned.
//
// release adds quantities back under the order id. The catalog applies each
// (order, product) release at most once, so retrying after an ambiguous
// failure cannot put the same units back twice.
//
// ============================================================================

/// A request line that passed validation, with the product it resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedLine {
    pub product: ProductSnapshot,
    pub quantity: u32,
}

impl CheckedLine {
    pub fn stock_line(&self) -> StockLine {
        StockLine {
            product_id: self.product.id,
            quantity: self.quantity,
        }
    }
}

/// Stock that has been decremented for one order
#[derive(Debug)]
pub struct Reservation {
    lines: Vec<CheckedLine>,
}

impl Reservation {
    pub fn lines(&self) -> &[CheckedLine] {
        &self.lines
    }

    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.lines.iter().map(CheckedLine::stock_line).collect()
    }
}

pub struct Inventory {
    catalog: Arc<dyn Catalog>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl Inventory {
    pub fn new(catalog: Arc<dyn Catalog>, metrics: Arc<Metrics>) -> Self {
        Self {
            catalog,
            retry: RetryConfig::compensating(),
            metrics,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Validate all lines without mutating stock
    pub async fn check(&self, requests: &[StockLine]) -> Result<Vec<CheckedLine>, OrderError> {
        if requests.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        if let Some(line) = requests.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }

        let products = try_join_all(
            requests
                .iter()
                .map(|line| self.catalog.get_product(line.product_id)),
        )
        .await?;

        let mut requested: HashMap<Uuid, u32> = HashMap::new();
        let mut checked = Vec::with_capacity(requests.len());

        for (line, product) in requests.iter().zip(products) {
            let product = product.ok_or(OrderError::ProductNotFound(line.product_id))?;

            if !product.is_active {
                return Err(OrderError::ProductInactive {
                    product_id: product.id,
                    name: product.name,
                });
            }

            let total = requested.entry(product.id).or_insert(0);
            *total = total.saturating_add(line.quantity);

            if *total > product.stock {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    name: product.name,
                    requested: *total,
                    available: product.stock,
                });
            }

            checked.push(CheckedLine {
                product,
                quantity: line.quantity,
            });
        }

        Ok(checked)
    }

    /// Decrement stock for already-checked lines, all or nothing
    pub async fn commit(
        &self,
        order_id: Uuid,
        lines: Vec<CheckedLine>,
    ) -> Result<Reservation, OrderError> {
        let mut applied: Vec<StockLine> = Vec::with_capacity(lines.len());

        for line in &lines {
            let product_id = line.product.id;
            let outcome = self
                .catalog
                .adjust_stock(product_id, -i64::from(line.quantity))
                .await;

            let failure = match outcome {
                Ok(StockAdjustment::Applied { stock }) => {
                    tracing::debug!(
                        product_id = %product_id,
                        quantity = line.quantity,
                        remaining = stock,
                        "Reserved stock"
                    );
                    applied.push(line.stock_line());
                    continue;
                }
                Ok(StockAdjustment::Insufficient { available }) => OrderError::InsufficientStock {
                    product_id,
                    name: line.product.name.clone(),
                    requested: line.quantity,
                    available,
                },
                Ok(StockAdjustment::NotFound) => OrderError::ProductNotFound(product_id),
                Ok(StockAdjustment::AlreadyReleased { .. }) => OrderError::from(StoreError::Corrupt(
                    format!("decrement of {} reported as a release", product_id),
                )),
                Err(e) => OrderError::from(e),
            };

            tracing::warn!(
                product_id = %product_id,
                already_reserved = applied.len(),
                error = %failure,
                "Stock reservation failed mid-order, rolling back"
            );
            self.rollback(order_id, &applied).await;
            return Err(failure);
        }

        Ok(Reservation { lines })
    }

    pub async fn reserve(
        &self,
        order_id: Uuid,
        requests: &[StockLine],
    ) -> Result<Reservation, OrderError> {
        let checked = self.check(requests).await?;
        self.commit(order_id, checked).await
    }

    /// Give the order's stock back; every product is attempted even if an
    /// earlier one fails
    pub async fn release(&self, order_id: Uuid, lines: &[StockLine]) -> Result<(), OrderError> {
        let mut failed = 0;

        for line in merge_by_product(lines) {
            let result = retry_on_transient(&self.retry, "stock_release", |_attempt| {
                self.catalog.restock(order_id, line.product_id, line.quantity)
            })
            .await;

            match result {
                Ok(StockAdjustment::Applied { stock }) => {
                    tracing::debug!(
                        order_id = %order_id,
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        stock = stock,
                        "Released stock"
                    );
                }
                Ok(StockAdjustment::AlreadyReleased { stock }) => {
                    tracing::debug!(
                        order_id = %order_id,
                        product_id = %line.product_id,
                        stock = stock,
                        "Stock already released"
                    );
                }
                Ok(StockAdjustment::NotFound) => {
                    tracing::warn!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        "Product no longer exists, stock not released"
                    );
                }
                Ok(StockAdjustment::Insufficient { .. }) => {
                    tracing::error!(
                        order_id = %order_id,
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        "Failed to release stock"
                    );
                    self.metrics.stock_release_failures.inc();
                    failed += 1;
                }
                Err(e) => {
                    tracing::error!(
                        order_id = %order_id,
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        error = %e,
                        "Failed to release stock"
                    );
                    self.metrics.stock_release_failures.inc();
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(OrderError::StockReleaseFailed { count: failed });
        }
        Ok(())
    }

    async fn rollback(&self, order_id: Uuid, applied: &[StockLine]) {
        if applied.is_empty() {
            return;
        }

        self.metrics.stock_rollbacks.inc();

        if let Err(e) = self.release(order_id, applied).await {
            tracing::error!(error = %e, "Rollback of partial reservation incomplete");
        }
    }
}

/// One line per product, quantities summed, first-seen order kept
fn merge_by_product(lines: &[StockLine]) -> Vec<StockLine> {
    let mut merged: Vec<StockLine> = Vec::with_capacity(lines.len());

    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(*line),
        }
    }

    merged
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::test_support::{LostReplyCatalog, RestockOfflineCatalog};
    use super::*;
    use crate::storage::InMemoryCatalog;
    use rust_decimal_macros::dec;

    fn product(stock: u32) -> ProductSnapshot {
        ProductSnapshot {
            id: Uuid::new_v4(),
            name: format!("Widget {}", stock),
            price: dec!(12.00),
            stock,
            is_active: true,
            vendor_id: Uuid::new_v4(),
            images: vec![],
            discount: dec!(0),
        }
    }

    fn line(product: &ProductSnapshot, quantity: u32) -> StockLine {
        StockLine {
            product_id: product.id,
            quantity,
        }
    }

    fn inventory(catalog: Arc<InMemoryCatalog>) -> Inventory {
        Inventory::new(catalog, Arc::new(Metrics::default())).with_retry(RetryConfig::immediate(2))
    }

    #[tokio::test]
    async fn test_reserve_decrements_every_line() {
        let a = product(5);
        let b = product(2);
        let catalog = Arc::new(InMemoryCatalog::with_products(vec![a.clone(), b.clone()]));
        let inventory = inventory(catalog.clone());

        let reservation = inventory.reserve(Uuid::new_v4(), &[line(&a, 3), line(&b, 2)]).await.unwrap();

        assert_eq!(reservation.lines().len(), 2);
        assert_eq!(catalog.stock_of(a.id).await, Some(2));
        assert_eq!(catalog.stock_of(b.id).await, Some(0));
    }

    #[tokio::test]
    async fn test_failed_validation_leaves_all_stock_untouched() {
        let a = product(5);
        let b = product(1);
        let catalog = Arc::new(InMemoryCatalog::with_products(vec![a.clone(), b.clone()]));
        let inventory = inventory(catalog.clone());

        let result = inventory.reserve(Uuid::new_v4(), &[line(&a, 2), line(&b, 4)]).await;

        assert!(matches!(
            result,
            Err(OrderError::InsufficientStock { requested: 4, available: 1, .. })
        ));
        assert_eq!(catalog.stock_of(a.id).await, Some(5));
        assert_eq!(catalog.stock_of(b.id).await, Some(1));
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_checked_in_aggregate() {
        let a = product(5);
        let catalog = Arc::new(InMemoryCatalog::with_products(vec![a.clone()]));
        let inventory = inventory(catalog.clone());

        let result = inventory.check(&[line(&a, 3), line(&a, 3)]).await;

        assert!(matches!(
            result,
            Err(OrderError::InsufficientStock { requested: 6, available: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_products_are_rejected() {
        let mut inactive = product(10);
        inactive.is_active = false;
        let catalog = Arc::new(InMemoryCatalog::with_products(vec![inactive.clone()]));
        let inventory = inventory(catalog);

        let missing = Uuid::new_v4();
        let result = inventory
            .check(&[StockLine { product_id: missing, quantity: 1 }])
            .await;
        assert!(matches!(result, Err(OrderError::ProductNotFound(id)) if id == missing));

        let result = inventory.check(&[line(&inactive, 1)]).await;
        assert!(matches!(result, Err(OrderError::ProductInactive { .. })));
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected_before_lookup() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let inventory = inventory(catalog);

        let result = inventory
            .check(&[StockLine { product_id: Uuid::new_v4(), quantity: 0 }])
            .await;

        assert!(matches!(result, Err(OrderError::InvalidQuantity { quantity: 0, .. })));
    }

    #[tokio::test]
    async fn test_late_commit_failure_rolls_back_earlier_lines() {
        let a = product(5);
        let b = product(3);
        let catalog = Arc::new(InMemoryCatalog::with_products(vec![a.clone(), b.clone()]));
        let inventory = inventory(catalog.clone());

        let checked = inventory.check(&[line(&a, 2), line(&b, 3)]).await.unwrap();

        // Another order takes product b between check and commit
        catalog.set_stock(b.id, 1).await;

        let result = inventory.commit(Uuid::new_v4(), checked).await;

        assert!(matches!(
            result,
            Err(OrderError::InsufficientStock { requested: 3, available: 1, .. })
        ));
        assert_eq!(catalog.stock_of(a.id).await, Some(5));
        assert_eq!(catalog.stock_of(b.id).await, Some(1));
        assert_eq!(inventory.metrics.stock_rollbacks.get(), 1);
    }

    #[tokio::test]
    async fn test_release_restores_stock() {
        let a = product(4);
        let catalog = Arc::new(InMemoryCatalog::with_products(vec![a.clone()]));
        let inventory = inventory(catalog.clone());
        let order = Uuid::new_v4();

        let reservation = inventory.reserve(order, &[line(&a, 4)]).await.unwrap();
        assert_eq!(catalog.stock_of(a.id).await, Some(0));

        inventory.release(order, &reservation.stock_lines()).await.unwrap();
        assert_eq!(catalog.stock_of(a.id).await, Some(4));

        // Releasing the same order again changes nothing
        inventory.release(order, &reservation.stock_lines()).await.unwrap();
        assert_eq!(catalog.stock_of(a.id).await, Some(4));
    }

    #[tokio::test]
    async fn test_release_merges_duplicate_product_lines() {
        let a = product(5);
        let catalog = Arc::new(InMemoryCatalog::with_products(vec![a.clone()]));
        let inventory = inventory(catalog.clone());
        let order = Uuid::new_v4();

        let reservation = inventory.reserve(order, &[line(&a, 2), line(&a, 1)]).await.unwrap();
        assert_eq!(catalog.stock_of(a.id).await, Some(2));

        inventory.release(order, &reservation.stock_lines()).await.unwrap();
        assert_eq!(catalog.stock_of(a.id).await, Some(5));
    }

    #[tokio::test]
    async fn test_retried_release_after_lost_reply_counts_once() {
        let a = product(5);
        let store = Arc::new(InMemoryCatalog::with_products(vec![a.clone()]));
        let catalog = Arc::new(LostReplyCatalog::new(store.clone()));
        let inventory = Inventory::new(catalog, Arc::new(Metrics::default()))
            .with_retry(RetryConfig::immediate(3));
        let order = Uuid::new_v4();

        let reservation = inventory.reserve(order, &[line(&a, 3)]).await.unwrap();
        assert_eq!(store.stock_of(a.id).await, Some(2));

        inventory.release(order, &reservation.stock_lines()).await.unwrap();

        assert_eq!(store.stock_of(a.id).await, Some(5));
        assert_eq!(inventory.metrics.stock_release_failures.get(), 0);
    }

    #[tokio::test]
    async fn test_release_that_keeps_failing_is_reported() {
        let a = product(6);
        let b = product(6);
        let store = Arc::new(InMemoryCatalog::with_products(vec![a.clone(), b.clone()]));
        let inventory = Inventory::new(
            Arc::new(RestockOfflineCatalog::new(store.clone())),
            Arc::new(Metrics::default()),
        )
        .with_retry(RetryConfig::immediate(2));
        let order = Uuid::new_v4();

        let reservation = inventory
            .reserve(order, &[line(&a, 1), line(&b, 2)])
            .await
            .unwrap();
        let result = inventory.release(order, &reservation.stock_lines()).await;

        assert!(matches!(result, Err(OrderError::StockReleaseFailed { count: 2 })));
        assert_eq!(inventory.metrics.stock_release_failures.get(), 2);
        assert_eq!(store.stock_of(a.id).await, Some(5));
        assert_eq!(store.stock_of(b.id).await, Some(4));
    }

    #[tokio::test]
    async fn test_release_skips_products_removed_from_catalog() {
        let a = product(3);
        let b = product(3);
        let catalog = Arc::new(InMemoryCatalog::with_products(vec![a.clone(), b.clone()]));
        let inventory = inventory(catalog.clone());
        let order = Uuid::new_v4();

        let reservation = inventory
            .reserve(order, &[line(&a, 1), line(&b, 1)])
            .await
            .unwrap();
        catalog.remove(a.id).await;

        inventory.release(order, &reservation.stock_lines()).await.unwrap();

        assert_eq!(catalog.stock_of(a.id).await, None);
        assert_eq!(catalog.stock_of(b.id).await, Some(3));
        assert_eq!(inventory.metrics.stock_release_failures.get(), 0);
    }

    #[tokio::test]
    async fn test_deactivated_product_fails_the_next_check() {
        let a = product(3);
        let catalog = Arc::new(InMemoryCatalog::with_products(vec![a.clone()]));
        let inventory = inventory(catalog.clone());

        assert!(inventory.check(&[line(&a, 1)]).await.is_ok());

        catalog.set_active(a.id, false).await;
        let result = inventory.check(&[line(&a, 1)]).await;

        assert!(matches!(result, Err(OrderError::ProductInactive { product_id, .. }) if product_id == a.id));
        assert_eq!(catalog.stock_of(a.id).await, Some(3));
    }
}

// ============================================================================
// Test Doubles - catalogs whose release path misbehaves
// ============================================================================

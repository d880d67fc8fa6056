use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::catalog::{Catalog, ProductSnapshot, StockAdjustment};
use crate::domain::order::OrderSequence;
use super::StoreError;

// ============================================================================
// PostgreSQL catalog + order sequence
// ============================================================================
//
// Stock: `UPDATE ... WHERE stock + delta >= 0` is the compare-and-decrement;
// the row lock taken by the UPDATE serialises concurrent buyers of the same
// product, and zero affected rows means nothing changed.
//
// Release: the (reference, product) row in `stock_releases` is inserted in
// the same transaction as the increment; a conflict means the release already
// happened and the transaction is rolled back untouched.
//
// Sequence: an upsert that increments and returns the per-day counter in one
// statement.
//
// ============================================================================

pub const CATALOG_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        price NUMERIC(12, 2) NOT NULL CHECK (price >= 0),
        stock INTEGER NOT NULL CHECK (stock >= 0),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        vendor_id UUID NOT NULL,
        images TEXT[] NOT NULL DEFAULT '{}',
        discount NUMERIC(5, 2) NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS stock_releases (
        reference UUID NOT NULL,
        product_id UUID NOT NULL,
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        released_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (reference, product_id)
    )",
    "CREATE TABLE IF NOT EXISTS order_sequences (
        day DATE PRIMARY KEY,
        value INTEGER NOT NULL
    )",
];

const ADJUST_STOCK: &str = "UPDATE products SET stock = stock + $2
     WHERE id = $1 AND stock + $2 >= 0
     RETURNING stock";

const RECORD_RELEASE: &str = "INSERT INTO stock_releases (reference, product_id, quantity)
     VALUES ($1, $2, $3)
     ON CONFLICT (reference, product_id) DO NOTHING";

const NEXT_SEQUENCE: &str = "INSERT INTO order_sequences (day, value) VALUES ($1, 1)
     ON CONFLICT (day) DO UPDATE SET value = order_sequences.value + 1
     RETURNING value";

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections = max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    for statement in CATALOG_SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn to_stock(value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative stock {}", value)))
}

pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        ensure_schema(&self.pool).await
    }

    pub async fn upsert_product(&self, product: &ProductSnapshot) -> Result<(), StoreError> {
        let stock = i32::try_from(product.stock)
            .map_err(|_| StoreError::Corrupt(format!("stock too large for {}", product.id)))?;

        sqlx::query(
            "INSERT INTO products (id, name, price, stock, is_active, vendor_id, images, discount)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, price = EXCLUDED.price, stock = EXCLUDED.stock,
                is_active = EXCLUDED.is_active, vendor_id = EXCLUDED.vendor_id,
                images = EXCLUDED.images, discount = EXCLUDED.discount",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(stock)
        .bind(product.is_active)
        .bind(product.vendor_id)
        .bind(&product.images)
        .bind(product.discount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<ProductSnapshot>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, price, stock, is_active, vendor_id, images, discount
             FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ProductSnapshot {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            stock: to_stock(row.try_get("stock")?)?,
            is_active: row.try_get("is_active")?,
            vendor_id: row.try_get("vendor_id")?,
            images: row.try_get("images")?,
            discount: row.try_get("discount")?,
        }))
    }

    async fn adjust_stock(&self, product_id: Uuid, delta: i64) -> Result<StockAdjustment, StoreError> {
        let updated = sqlx::query(ADJUST_STOCK)
            .bind(product_id)
            .bind(delta)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = updated {
            return Ok(StockAdjustment::Applied {
                stock: to_stock(row.try_get("stock")?)?,
            });
        }

        let current = sqlx::query("SELECT stock FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        match current {
            Some(row) => Ok(StockAdjustment::Insufficient {
                available: to_stock(row.try_get("stock")?)?,
            }),
            None => Ok(StockAdjustment::NotFound),
        }
    }

    async fn restock(
        &self,
        reference: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<StockAdjustment, StoreError> {
        let quantity = i32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("release of {} units for {}", quantity, product_id)))?;

        let mut tx = self.pool.begin().await?;

        let recorded = sqlx::query(RECORD_RELEASE)
            .bind(reference)
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        if recorded.rows_affected() == 0 {
            tx.rollback().await?;

            let current = sqlx::query("SELECT stock FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

            return match current {
                Some(row) => Ok(StockAdjustment::AlreadyReleased {
                    stock: to_stock(row.try_get("stock")?)?,
                }),
                None => Ok(StockAdjustment::NotFound),
            };
        }

        let updated = sqlx::query(ADJUST_STOCK)
            .bind(product_id)
            .bind(i64::from(quantity))
            .fetch_optional(&mut *tx)
            .await?;

        match updated {
            Some(row) => {
                let stock = to_stock(row.try_get("stock")?)?;
                tx.commit().await?;
                Ok(StockAdjustment::Applied { stock })
            }
            None => {
                tx.rollback().await?;
                Ok(StockAdjustment::NotFound)
            }
        }
    }
}

pub struct PostgresOrderSequence {
    pool: PgPool,
}

impl PostgresOrderSequence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        ensure_schema(&self.pool).await
    }
}

#[async_trait]
impl OrderSequence for PostgresOrderSequence {
    async fn next(&self, day: NaiveDate) -> Result<u32, StoreError> {
        let row = sqlx::query(NEXT_SEQUENCE)
            .bind(day)
            .fetch_one(&self.pool)
            .await?;

        let value: i32 = row.try_get("value")?;
        u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("order sequence {} for {}", value, day)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_update_is_conditional() {
        assert!(ADJUST_STOCK.contains("stock + $2 >= 0"));
        assert!(ADJUST_STOCK.contains("RETURNING stock"));
        assert!(CATALOG_SCHEMA[0].contains("CHECK (stock >= 0)"));
    }

    #[test]
    fn test_release_is_keyed_by_reference_and_product() {
        assert!(CATALOG_SCHEMA[1].contains("PRIMARY KEY (reference, product_id)"));
        assert!(RECORD_RELEASE.contains("ON CONFLICT (reference, product_id) DO NOTHING"));
    }

    #[test]
    fn test_sequence_is_single_statement_upsert() {
        assert!(NEXT_SEQUENCE.contains("ON CONFLICT (day) DO UPDATE"));
        assert!(NEXT_SEQUENCE.contains("RETURNING value"));
    }

    #[test]
    fn test_negative_stock_is_corrupt() {
        assert!(matches!(to_stock(-1), Err(StoreError::Corrupt(_))));
        assert_eq!(to_stock(7).unwrap(), 7);
    }
}

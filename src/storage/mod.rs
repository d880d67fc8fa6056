// ============================================================================
// Storage adapters
// ============================================================================
//
// Implementations of the catalog/stock contract and the per-day order
// sequence for each supported backend. The order event stream itself lives
// in `event_sourcing::store`.
//
// ============================================================================

mod errors;
mod memory;
mod postgres;
mod redis_sequence;

pub use errors::StoreError;
pub use memory::{InMemoryCatalog, InMemoryOrderSequence};
pub use postgres::{connect, PostgresCatalog, PostgresOrderSequence, CATALOG_SCHEMA};
pub use redis_sequence::RedisOrderSequence;

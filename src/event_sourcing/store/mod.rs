// ============================================================================
// Event Sourcing Store - persistence for event streams
// ============================================================================

pub mod event_store;
pub mod postgres;

pub use event_store::{load_aggregate, EventStore, InMemoryEventStore};
pub use postgres::PostgresEventStore;

// ============================================================================
// Vendora Orders - Order Placement & Fulfillment Split Engine
// ============================================================================
//
// Layers:
// - domain/          - Order aggregate, pricing, vendor split, numbering,
//                      catalog accessor and inventory reservation
// - event_sourcing/  - Generic aggregate + event store infrastructure
// - storage/         - Catalog, stock and sequence adapters (memory, Postgres, Redis)
// - messaging/       - Order-created notification transports
// - utils/           - Retry and circuit breaker
// - metrics/         - Prometheus metrics + scrape endpoint
//
// ============================================================================

pub mod clock;
pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod messaging;
pub mod metrics;
pub mod storage;
pub mod utils;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use domain::order::{ErrorKind, OrderAggregate, OrderCommandHandler, OrderError};

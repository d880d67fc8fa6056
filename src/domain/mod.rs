// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - catalog: the product/stock contract and inventory reservation
// - order:   the order aggregate and everything needed to place it
//
// This layer only talks to storage and transports through traits.
//
// ============================================================================

pub mod catalog;
pub mod order;

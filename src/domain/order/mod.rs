// ============================================================================
// Order Domain - placement and fulfillment of multi-vendor orders
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (line items, vendor sub-orders, statuses)
// - Events / commands / errors
// - Aggregate (OrderAggregate with the lifecycle state machine)
// - Engines used at placement: pricing, splitter, numbering
// - Request boundary (PlaceOrderRequest → PlaceOrder)
// - Command Handler (OrderCommandHandler)
// - Read model for order listings (OrderProjection)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;
pub mod numbering;
pub mod pricing;
pub mod projection;
pub mod request;
pub mod splitter;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::{OrderAggregate, VendorOrderView};
pub use command_handler::OrderCommandHandler;
pub use numbering::{OrderNumber, OrderNumbering, OrderSequence};
pub use pricing::{PriceBreakdown, PricedOrder, PricingPolicy};
pub use projection::{OrderFilter, OrderPage, OrderProjection, PageRequest, Pagination};
pub use request::PlaceOrderRequest;
pub use splitter::split_by_vendor;

// ============================================================================
// Messaging - order-created notifications
// ============================================================================
//
// Delivery is best-effort: the order engine awaits a notifier for at most its
// timeout and never fails or undoes a placement because of it.
//
// ============================================================================

mod notifier;
#[cfg(feature = "redpanda")]
mod redpanda;

pub use notifier::{
    BroadcastNotifier, GuardedNotifier, LogNotifier, NotifyError, OrderCreatedNotice,
    OrderNotifier,
};
#[cfg(feature = "redpanda")]
pub use redpanda::RedpandaNotifier;

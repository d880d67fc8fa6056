use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event_sourcing::core::{Aggregate, EventEnvelope};
use crate::event_sourcing::store::EventStore;
use super::aggregate::{OrderAggregate, VendorOrderView};
use super::errors::{OrderError, ValidationErrors};
use super::events::OrderEvent;
use super::value_objects::{OrderStatus, PaymentStatus, VendorOrderStatus};

// ============================================================================
// Order Read Model
// ============================================================================
//
// Listing queries (a customer's orders, a vendor's orders, the admin list)
// are answered from this projection instead of replaying every stream.
//
// - Fed with each batch of envelopes right after the batch is appended
// - Rebuilt from the event store on startup
// - An envelope at or below the order's projected version is skipped, so a
//   batch can be fed twice
// - Lists are newest first (created_at, then order number)
//
// ============================================================================

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Validated page selector (1-based page, 1..=50 items)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, OrderError> {
        let mut errors = ValidationErrors::default();

        if page < 1 {
            errors.push("page", "Page must be a positive integer");
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            errors.push("limit", "Limit must be between 1 and 50");
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Admin list filter; `None` matches everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl OrderFilter {
    fn matches(&self, order: &OrderAggregate) -> bool {
        self.status.map_or(true, |status| order.order_status == status)
            && self
                .payment_status
                .map_or(true, |status| order.payment_status == status)
    }
}

#[derive(Default)]
pub struct OrderProjection {
    orders: RwLock<HashMap<Uuid, OrderAggregate>>,
}

impl OrderProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay every order stream in the store
    pub async fn rebuild(store: &dyn EventStore<OrderEvent>) -> Result<Self, OrderError> {
        let projection = Self::new();

        for order_id in store.aggregate_ids().await? {
            let events = store.load_events(order_id).await?;
            projection.project(&events).await?;
        }

        tracing::info!(orders = projection.len().await, "Order read model rebuilt");
        Ok(projection)
    }

    pub async fn project(&self, envelopes: &[EventEnvelope<OrderEvent>]) -> Result<(), OrderError> {
        let mut orders = self.orders.write().await;

        for envelope in envelopes {
            let order_id = envelope.aggregate_id;

            match orders.get_mut(&order_id) {
                Some(order) => {
                    if envelope.sequence_number <= order.version() {
                        continue;
                    }
                    order.apply_event(&envelope.event_data)?;
                    order.set_version(envelope.sequence_number);
                }
                None => {
                    let mut order = OrderAggregate::apply_first_event(order_id, &envelope.event_data)?;
                    order.set_version(envelope.sequence_number);
                    orders.insert(order_id, order);
                }
            }
        }

        Ok(())
    }

    pub async fn get(&self, order_id: Uuid) -> Option<OrderAggregate> {
        self.orders.read().await.get(&order_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    /// A customer's orders, optionally narrowed to one order status
    pub async fn customer_orders(
        &self,
        customer_id: Uuid,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> OrderPage<OrderAggregate> {
        let orders = self.orders.read().await;
        let matched = orders
            .values()
            .filter(|order| order.is_owned_by(customer_id))
            .filter(|order| status.map_or(true, |status| order.order_status == status))
            .collect();

        paginate(matched, page, |order| order.clone())
    }

    /// Orders carrying a sub-order for `vendor_id`, narrowed to that vendor.
    ///
    /// `status` filters on the vendor's own sub-order, not on the parent.
    pub async fn vendor_orders(
        &self,
        vendor_id: Uuid,
        status: Option<VendorOrderStatus>,
        page: PageRequest,
    ) -> OrderPage<VendorOrderView> {
        let orders = self.orders.read().await;
        let matched = orders
            .values()
            .filter(|order| match order.vendor_order(vendor_id) {
                Some(group) => status.map_or(true, |status| group.status == status),
                None => false,
            })
            .collect();

        paginate(matched, page, |order| order.vendor_view(vendor_id))
            .flatten()
    }

    /// Every order, filtered by order and payment status
    pub async fn orders(&self, filter: OrderFilter, page: PageRequest) -> OrderPage<OrderAggregate> {
        let orders = self.orders.read().await;
        let matched = orders.values().filter(|order| filter.matches(order)).collect();

        paginate(matched, page, |order| order.clone())
    }
}

impl<T> OrderPage<Option<T>> {
    fn flatten(self) -> OrderPage<T> {
        OrderPage {
            data: self.data.into_iter().flatten().collect(),
            pagination: self.pagination,
        }
    }
}

fn newest_first(a: &&OrderAggregate, b: &&OrderAggregate) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.order_number.as_str().cmp(a.order_number.as_str()))
}

fn paginate<T>(
    mut matched: Vec<&OrderAggregate>,
    page: PageRequest,
    view: impl Fn(&OrderAggregate) -> T,
) -> OrderPage<T> {
    matched.sort_by(newest_first);

    let total = matched.len();
    let limit = page.limit() as usize;
    let data = matched
        .into_iter()
        .skip(page.offset())
        .take(limit)
        .map(view)
        .collect();

    OrderPage {
        data,
        pagination: Pagination {
            page: page.page(),
            limit: page.limit(),
            total,
            pages: total.div_ceil(limit),
        },
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

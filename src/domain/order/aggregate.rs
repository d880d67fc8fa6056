use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::domain::catalog::StockLine;
use crate::event_sourcing::core::Aggregate;
use super::commands::{OrderCommand, OrderDraft};
use super::errors::OrderError;
use super::events::*;
use super::numbering::OrderNumber;
use super::pricing::PriceBreakdown;
use super::splitter::is_partition_of;
use super::value_objects::{
    CancelledBy, OrderLineItem, OrderStatus, OrderSummary, PaymentInfo, PaymentStatus,
    ShippingAddress, VendorOrderStatus, VendorSubOrder,
};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Invariants held from the first event on:
// - items is never re-derived; line items are fixed at placement
// - itemsPrice == Σ quantity × price and
//   totalPrice == itemsPrice + taxPrice + shippingPrice
// - vendor_orders partition items exactly (each item once, by its vendor)
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,
    pub order_number: OrderNumber,
    pub customer_id: Uuid,

    // Captured at placement
    pub items: Vec<OrderLineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_info: PaymentInfo,
    pub prices: PriceBreakdown,

    // Current State (derived from events)
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub vendor_orders: Vec<VendorSubOrder>,
    pub tracking_number: Option<String>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub return_reason: Option<String>,
    pub notes: Option<String>,

    // Lifecycle timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// What a vendor sees of an order: only its own items and sub-order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorOrderView {
    pub order_id: Uuid,
    pub order_number: OrderNumber,
    pub order_status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderLineItem>,
    pub vendor_order: VendorSubOrder,
    pub created_at: DateTime<Utc>,
}

impl OrderAggregate {
    /// Validate a draft and produce the event that opens the order stream
    pub fn open(draft: OrderDraft) -> Result<OrderEvent, OrderError> {
        if draft.items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        if let Some(item) = draft.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }

        if !draft.prices.reconciles(&draft.items) {
            return Err(OrderError::InvalidDraft("prices do not match line items"));
        }

        if !is_partition_of(&draft.vendor_orders, &draft.items) {
            return Err(OrderError::InvalidDraft(
                "vendor sub-orders do not partition the line items",
            ));
        }

        if draft
            .vendor_orders
            .iter()
            .any(|group| group.status != VendorOrderStatus::Pending)
        {
            return Err(OrderError::InvalidDraft("vendor sub-orders must start pending"));
        }

        Ok(OrderEvent::Placed(OrderPlaced {
            order_number: draft.order_number,
            customer_id: draft.customer_id,
            items: draft.items,
            shipping_address: draft.shipping_address,
            payment_info: draft.payment_info,
            prices: draft.prices,
            vendor_orders: draft.vendor_orders,
            notes: draft.notes,
            placed_at: draft.placed_at,
        }))
    }

    pub fn is_owned_by(&self, customer_id: Uuid) -> bool {
        self.customer_id == customer_id
    }

    /// Quantities to hand back to stock if this order is cancelled
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.items
            .iter()
            .map(|item| StockLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect()
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            order_number: self.order_number.to_string(),
            total_items: self.items.len(),
            total_price: self.prices.total_price,
            status: self.order_status,
            created_at: self.created_at,
        }
    }

    pub fn vendor_view(&self, vendor_id: Uuid) -> Option<VendorOrderView> {
        let vendor_order = self.vendor_order(vendor_id)?.clone();

        Some(VendorOrderView {
            order_id: self.id,
            order_number: self.order_number.clone(),
            order_status: self.order_status,
            shipping_address: self.shipping_address.clone(),
            items: self
                .items
                .iter()
                .filter(|item| item.vendor_id == vendor_id)
                .cloned()
                .collect(),
            vendor_order,
            created_at: self.created_at,
        })
    }

    pub fn vendor_order(&self, vendor_id: Uuid) -> Option<&VendorSubOrder> {
        self.vendor_orders.iter().find(|group| group.vendor_id == vendor_id)
    }

    fn cancel(
        &self,
        reason: &Option<String>,
        cancelled_by: CancelledBy,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.order_status.is_cancellable() {
            return Err(OrderError::OrderNotCancellable(self.order_status));
        }

        Ok(vec![OrderEvent::Cancelled(OrderCancelled {
            from: self.order_status,
            reason: reason.clone(),
            cancelled_by,
            cancelled_at: at,
        })])
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_first_event(aggregate_id: Uuid, event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Placed(e) => {
                let paid_at = match e.payment_info.status {
                    PaymentStatus::Completed => Some(e.placed_at),
                    _ => None,
                };

                Ok(Self {
                    id: aggregate_id,
                    version: 0,
                    order_number: e.order_number.clone(),
                    customer_id: e.customer_id,
                    items: e.items.clone(),
                    shipping_address: e.shipping_address.clone(),
                    payment_info: e.payment_info.clone(),
                    prices: e.prices,
                    payment_status: e.payment_info.status,
                    order_status: OrderStatus::Pending,
                    vendor_orders: e.vendor_orders.clone(),
                    tracking_number: None,
                    cancel_reason: None,
                    cancelled_by: None,
                    return_reason: None,
                    notes: e.notes.clone(),
                    created_at: e.placed_at,
                    updated_at: e.placed_at,
                    paid_at,
                    delivered_at: None,
                    cancelled_at: None,
                    return_requested_at: None,
                    estimated_delivery: None,
                })
            }
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            // A stream is opened exactly once
            OrderEvent::Placed(_) => Err(OrderError::NotInitialized),

            OrderEvent::StatusChanged(e) => {
                self.order_status = e.to;
                match e.to {
                    OrderStatus::Shipped => {
                        if e.tracking_number.is_some() {
                            self.tracking_number = e.tracking_number.clone();
                        }
                        if e.estimated_delivery.is_some() {
                            self.estimated_delivery = e.estimated_delivery;
                        }
                    }
                    OrderStatus::Delivered => self.delivered_at = Some(e.changed_at),
                    OrderStatus::Returned => {
                        self.return_requested_at = Some(e.changed_at);
                        self.return_reason = e.reason.clone();
                    }
                    _ => {}
                }
                self.updated_at = e.changed_at;
                Ok(())
            }

            OrderEvent::Cancelled(e) => {
                self.order_status = OrderStatus::Cancelled;
                self.cancelled_at = Some(e.cancelled_at);
                self.cancel_reason = e.reason.clone();
                self.cancelled_by = Some(e.cancelled_by);
                self.updated_at = e.cancelled_at;
                Ok(())
            }

            OrderEvent::VendorOrderUpdated(e) => {
                let group = self
                    .vendor_orders
                    .iter_mut()
                    .find(|group| group.vendor_id == e.vendor_id)
                    .ok_or(OrderError::VendorNotAuthorized { vendor_id: e.vendor_id })?;

                group.status = e.to;
                match e.to {
                    VendorOrderStatus::Shipped => {
                        group.shipped_at = Some(e.updated_at);
                        if e.tracking_number.is_some() {
                            group.tracking_number = e.tracking_number.clone();
                        }
                    }
                    VendorOrderStatus::Delivered => group.delivered_at = Some(e.updated_at),
                    _ => {}
                }
                self.updated_at = e.updated_at;
                Ok(())
            }
        }
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::ChangeStatus { to: OrderStatus::Cancelled, reason, at, .. } => {
                self.cancel(reason, CancelledBy::Admin, *at)
            }

            OrderCommand::ChangeStatus { to, tracking_number, estimated_delivery, reason, at } => {
                if !self.order_status.can_transition_to(*to) {
                    return Err(OrderError::InvalidTransition {
                        from: self.order_status,
                        to: *to,
                    });
                }

                Ok(vec![OrderEvent::StatusChanged(OrderStatusChanged {
                    from: self.order_status,
                    to: *to,
                    tracking_number: tracking_number.clone(),
                    estimated_delivery: match to {
                        OrderStatus::Shipped => *estimated_delivery,
                        _ => None,
                    },
                    reason: reason.clone(),
                    changed_at: *at,
                })])
            }

            OrderCommand::Cancel { reason, cancelled_by, at } => {
                self.cancel(reason, *cancelled_by, *at)
            }

            OrderCommand::UpdateVendorOrder { vendor_id, status, tracking_number, at } => {
                if self.order_status.is_terminal() {
                    return Err(OrderError::OrderClosed(self.order_status));
                }

                let group = self
                    .vendor_order(*vendor_id)
                    .ok_or(OrderError::VendorNotAuthorized { vendor_id: *vendor_id })?;

                if !group.status.can_transition_to(*status) {
                    return Err(OrderError::InvalidVendorTransition {
                        from: group.status,
                        to: *status,
                    });
                }

                Ok(vec![OrderEvent::VendorOrderUpdated(VendorOrderUpdated {
                    vendor_id: *vendor_id,
                    from: group.status,
                    to: *status,
                    tracking_number: tracking_number.clone(),
                    updated_at: *at,
                })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::catalog::{CheckedLine, ProductSnapshot};
    use crate::domain::order::pricing::PricingPolicy;
    use crate::domain::order::splitter::split_by_vendor;
    use crate::domain::order::value_objects::PaymentMethod;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    pub fn placed_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-02T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    pub fn product(vendor_id: Uuid, name: &str) -> ProductSnapshot {
        ProductSnapshot {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price: dec!(15.00),
            stock: 10,
            is_active: true,
            vendor_id,
            images: vec![format!("{}.png", name)],
            discount: dec!(0),
        }
    }

    pub fn draft(vendors: &[Uuid]) -> OrderDraft {
        let lines: Vec<CheckedLine> = vendors
            .iter()
            .enumerate()
            .map(|(i, vendor)| CheckedLine {
                product: product(*vendor, &format!("item-{}", i)),
                quantity: 2,
            })
            .collect();
        let priced = PricingPolicy::default().price(&lines).unwrap();

        OrderDraft {
            order_number: OrderNumber::format(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(), 1)
                .unwrap(),
            customer_id: Uuid::new_v4(),
            vendor_orders: split_by_vendor(&priced.items),
            items: priced.items,
            shipping_address: ShippingAddress {
                name: "Kemi".to_string(),
                phone: "0800".to_string(),
                street: "3 Allen Ave".to_string(),
                city: "Ikeja".to_string(),
                state: "LA".to_string(),
                zip_code: "100271".to_string(),
                country: "NG".to_string(),
            },
            payment_info: PaymentInfo {
                id: "pay_123".to_string(),
                status: PaymentStatus::Completed,
                method: PaymentMethod::Paypal,
            },
            prices: priced.prices,
            notes: Some("Ring twice".to_string()),
            placed_at: placed_at(),
        }
    }

    /// A placed order with two vendors
    pub fn sample_order() -> OrderAggregate {
        let event = OrderAggregate::open(draft(&[Uuid::new_v4(), Uuid::new_v4()])).unwrap();
        let mut order = OrderAggregate::apply_first_event(Uuid::new_v4(), &event).unwrap();
        order.set_version(1);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{draft, placed_at};
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn open(vendors: &[Uuid]) -> OrderAggregate {
        let event = OrderAggregate::open(draft(vendors)).unwrap();
        let mut order = OrderAggregate::apply_first_event(Uuid::new_v4(), &event).unwrap();
        order.set_version(1);
        order
    }

    fn run(order: &mut OrderAggregate, command: OrderCommand) -> Result<(), OrderError> {
        for event in order.handle_command(&command)? {
            order.apply_event(&event)?;
            order.version += 1;
        }
        Ok(())
    }

    fn change(to: OrderStatus) -> OrderCommand {
        OrderCommand::ChangeStatus {
            to,
            tracking_number: None,
            estimated_delivery: None,
            reason: None,
            at: placed_at() + Duration::hours(1),
        }
    }

    #[test]
    fn test_open_order() {
        let vendor = Uuid::new_v4();
        let order = open(&[vendor, vendor]);

        assert_eq!(order.order_status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(order.paid_at, Some(placed_at()));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.vendor_orders.len(), 1);
        assert_eq!(order.prices.total_price, dec!(76.00));
        assert_eq!(order.notes.as_deref(), Some("Ring twice"));
        assert_eq!(order.estimated_delivery, None);
    }

    #[test]
    fn test_open_rejects_inconsistent_drafts() {
        let mut empty = draft(&[Uuid::new_v4()]);
        empty.items.clear();
        empty.vendor_orders.clear();
        assert!(matches!(OrderAggregate::open(empty), Err(OrderError::EmptyItems)));

        let mut mispriced = draft(&[Uuid::new_v4()]);
        mispriced.prices.tax_price += dec!(0.01);
        assert!(matches!(OrderAggregate::open(mispriced), Err(OrderError::InvalidDraft(_))));

        let mut unsplit = draft(&[Uuid::new_v4(), Uuid::new_v4()]);
        unsplit.vendor_orders.pop();
        assert!(matches!(OrderAggregate::open(unsplit), Err(OrderError::InvalidDraft(_))));
    }

    #[test]
    fn test_full_lifecycle_stamps_timestamps() {
        let mut order = open(&[Uuid::new_v4()]);

        run(&mut order, change(OrderStatus::Processing)).unwrap();
        run(
            &mut order,
            OrderCommand::ChangeStatus {
                to: OrderStatus::Shipped,
                tracking_number: Some("1Z999".to_string()),
                estimated_delivery: Some(placed_at() + Duration::days(4)),
                reason: None,
                at: placed_at() + Duration::days(1),
            },
        )
        .unwrap();
        run(&mut order, change(OrderStatus::Delivered)).unwrap();
        run(
            &mut order,
            OrderCommand::ChangeStatus {
                to: OrderStatus::Returned,
                tracking_number: None,
                estimated_delivery: None,
                reason: Some("Arrived damaged".to_string()),
                at: placed_at() + Duration::days(5),
            },
        )
        .unwrap();

        assert_eq!(order.order_status, OrderStatus::Returned);
        assert_eq!(order.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(order.estimated_delivery, Some(placed_at() + Duration::days(4)));
        assert!(order.delivered_at.is_some());
        assert_eq!(order.return_requested_at, Some(placed_at() + Duration::days(5)));
        assert_eq!(order.return_reason.as_deref(), Some("Arrived damaged"));
        assert_eq!(order.version, 5);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut order = open(&[Uuid::new_v4()]);

        let result = run(&mut order, change(OrderStatus::Delivered));
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered
            })
        ));
        assert_eq!(order.order_status, OrderStatus::Pending);
    }

    #[test]
    fn test_cancel_only_before_shipping() {
        let mut order = open(&[Uuid::new_v4()]);
        run(&mut order, change(OrderStatus::Processing)).unwrap();
        run(&mut order, change(OrderStatus::Shipped)).unwrap();
        let customer = order.customer_id;

        let result = run(
            &mut order,
            OrderCommand::Cancel {
                reason: None,
                cancelled_by: CancelledBy::Customer(customer),
                at: placed_at(),
            },
        );

        assert!(matches!(result, Err(OrderError::OrderNotCancellable(OrderStatus::Shipped))));
    }

    #[test]
    fn test_admin_cancel_through_status_change() {
        let mut order = open(&[Uuid::new_v4()]);

        run(&mut order, change(OrderStatus::Cancelled)).unwrap();

        assert_eq!(order.order_status, OrderStatus::Cancelled);
        assert_eq!(order.cancelled_by, Some(CancelledBy::Admin));
        assert!(order.cancelled_at.is_some());

        let again = run(&mut order, change(OrderStatus::Cancelled));
        assert!(matches!(again, Err(OrderError::OrderNotCancellable(OrderStatus::Cancelled))));
    }

    #[test]
    fn test_vendor_updates_only_own_sub_order() {
        let vendor_a = Uuid::new_v4();
        let vendor_b = Uuid::new_v4();
        let mut order = open(&[vendor_a, vendor_b]);

        let ship = |vendor_id, status| OrderCommand::UpdateVendorOrder {
            vendor_id,
            status,
            tracking_number: Some("TRK-A".to_string()),
            at: placed_at() + Duration::hours(3),
        };

        run(&mut order, ship(vendor_a, VendorOrderStatus::Processing)).unwrap();
        run(&mut order, ship(vendor_a, VendorOrderStatus::Shipped)).unwrap();

        let a = order.vendor_order(vendor_a).unwrap();
        assert_eq!(a.status, VendorOrderStatus::Shipped);
        assert_eq!(a.tracking_number.as_deref(), Some("TRK-A"));
        assert!(a.shipped_at.is_some());
        assert_eq!(order.vendor_order(vendor_b).unwrap().status, VendorOrderStatus::Pending);
        // Parent status is not derived from sub-orders
        assert_eq!(order.order_status, OrderStatus::Pending);

        let stranger = run(&mut order, ship(Uuid::new_v4(), VendorOrderStatus::Processing));
        assert!(matches!(stranger, Err(OrderError::VendorNotAuthorized { .. })));

        let backwards = run(&mut order, ship(vendor_a, VendorOrderStatus::Processing));
        assert!(matches!(backwards, Err(OrderError::InvalidVendorTransition { .. })));
    }

    #[test]
    fn test_vendor_update_on_cancelled_order_rejected() {
        let vendor = Uuid::new_v4();
        let mut order = open(&[vendor]);
        run(&mut order, change(OrderStatus::Cancelled)).unwrap();

        let result = run(
            &mut order,
            OrderCommand::UpdateVendorOrder {
                vendor_id: vendor,
                status: VendorOrderStatus::Processing,
                tracking_number: None,
                at: placed_at(),
            },
        );
        assert!(matches!(result, Err(OrderError::OrderClosed(OrderStatus::Cancelled))));
    }

    #[test]
    fn test_summary_and_vendor_view() {
        let vendor_a = Uuid::new_v4();
        let vendor_b = Uuid::new_v4();
        let order = open(&[vendor_a, vendor_b, vendor_a]);

        let summary = order.summary();
        assert_eq!(summary.order_number, "ORD2503020001");
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.total_price, order.prices.total_price);

        let view = order.vendor_view(vendor_a).unwrap();
        assert_eq!(view.items.len(), 2);
        assert!(view.items.iter().all(|item| item.vendor_id == vendor_a));
        assert_eq!(view.vendor_order.vendor_id, vendor_a);
        assert!(order.vendor_view(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_replay_from_events() {
        use crate::event_sourcing::core::EventEnvelope;

        let id = Uuid::new_v4();
        let placed = OrderAggregate::open(draft(&[Uuid::new_v4()])).unwrap();
        let mut order = OrderAggregate::apply_first_event(id, &placed).unwrap();
        let changed = order.handle_command(&change(OrderStatus::Processing)).unwrap();
        order.apply_event(&changed[0]).unwrap();

        let correlation = Uuid::new_v4();
        let history = vec![
            EventEnvelope::new(id, 1, "OrderPlaced".to_string(), placed, correlation),
            EventEnvelope::new(id, 2, "OrderStatusChanged".to_string(), changed[0].clone(), correlation),
        ];

        let replayed = OrderAggregate::load_from_events(id, history).unwrap().unwrap();
        assert_eq!(replayed.id, id);
        assert_eq!(replayed.version, 2);
        assert_eq!(replayed.order_status, OrderStatus::Processing);
        assert!(OrderAggregate::load_from_events(id, vec![]).unwrap().is_none());
    }
}

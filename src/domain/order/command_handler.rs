use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::domain::catalog::{Catalog, Inventory};
use crate::event_sourcing::core::{Aggregate, DomainEvent, EventEnvelope};
use crate::event_sourcing::store::{load_aggregate, EventStore};
use crate::messaging::OrderNotifier;
use crate::metrics::Metrics;
use crate::utils::RetryConfig;

use super::aggregate::{OrderAggregate, VendorOrderView};
use super::commands::{OrderCommand, OrderDraft, PlaceOrder};
use super::errors::OrderError;
use super::events::OrderEvent;
use super::numbering::{OrderNumbering, OrderSequence};
use super::pricing::{PricedOrder, PricingPolicy};
use super::projection::{OrderFilter, OrderPage, OrderProjection, PageRequest};
use super::request::PlaceOrderRequest;
use super::splitter::split_by_vendor;
use super::value_objects::{
    CancelledBy, OrderStatus, PaymentInfo, PaymentStatus, VendorOrderStatus,
};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Placement:
//   check stock → price → commit stock → number → open → append → notify
//
//   Nothing is mutated before every line has been checked. Once stock is
//   committed, any later failure (numbering, append) releases it again before
//   the error is returned. The order id is minted up front and keys every
//   stock release, so a release is applied at most once. Notification is
//   spawned after the order is durable; its failure is only logged.
//
// Existing orders:
//   load → Aggregate::handle_command → append (expected version) → apply
//
//   A cancellation appends the event first; only the writer that wins the
//   version check releases stock, so stock is returned exactly once.
//
// Every appended batch is also fed to the order read model, which answers
// the listing queries.
//
// ============================================================================

pub struct OrderCommandHandler {
    event_store: Arc<dyn EventStore<OrderEvent>>,
    projection: Arc<OrderProjection>,
    catalog: Arc<dyn Catalog>,
    inventory: Inventory,
    numbering: OrderNumbering,
    notifier: Arc<dyn OrderNotifier>,
    pricing: PricingPolicy,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
    notify_timeout: Duration,
}

impl OrderCommandHandler {
    pub fn new(
        event_store: Arc<dyn EventStore<OrderEvent>>,
        catalog: Arc<dyn Catalog>,
        sequence: Arc<dyn OrderSequence>,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        let metrics = Arc::new(Metrics::default());
        let retry = RetryConfig::compensating();

        Self {
            event_store,
            projection: Arc::new(OrderProjection::new()),
            inventory: Inventory::new(catalog.clone(), metrics.clone()).with_retry(retry.clone()),
            catalog,
            numbering: OrderNumbering::new(sequence),
            notifier,
            pricing: PricingPolicy::default(),
            clock: Arc::new(SystemClock),
            metrics,
            retry,
            notify_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self.rebuild_inventory();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self.rebuild_inventory();
        self
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Use a read model already rebuilt from the event store
    pub fn with_projection(mut self, projection: Arc<OrderProjection>) -> Self {
        self.projection = projection;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn rebuild_inventory(&mut self) {
        self.inventory =
            Inventory::new(self.catalog.clone(), self.metrics.clone()).with_retry(self.retry.clone());
    }

    // ------------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------------

    /// Validate a raw checkout body, then place it
    pub async fn place_order_request(
        &self,
        customer_id: Uuid,
        request: &PlaceOrderRequest,
    ) -> Result<OrderAggregate, OrderError> {
        let command = match request.validate(customer_id) {
            Ok(command) => command,
            Err(errors) => {
                tracing::debug!(customer_id = %customer_id, errors = %errors, "Rejected checkout request");
                let err = OrderError::from(errors);
                self.metrics.record_failure(err.kind());
                return Err(err);
            }
        };

        self.place_order(command).await
    }

    pub async fn place_order(&self, command: PlaceOrder) -> Result<OrderAggregate, OrderError> {
        let started = Instant::now();
        let customer_id = command.customer_id;

        let result = self.place(command).await;

        self.metrics.record_placement(
            started.elapsed().as_secs_f64(),
            result.as_ref().map(|_| ()).map_err(OrderError::kind),
        );

        match &result {
            Ok(order) => tracing::info!(
                order_id = %order.id,
                order_number = %order.order_number,
                customer_id = %customer_id,
                items = order.items.len(),
                vendors = order.vendor_orders.len(),
                total = %order.prices.total_price,
                "Order placed"
            ),
            Err(e) => tracing::warn!(
                customer_id = %customer_id,
                kind = e.kind().as_str(),
                error = %e,
                "Order placement failed"
            ),
        }

        result
    }

    async fn place(&self, command: PlaceOrder) -> Result<OrderAggregate, OrderError> {
        let checked = self.inventory.check(&command.items).await?;
        let priced = self.pricing.price(&checked)?;

        let order_id = Uuid::now_v7();
        let reservation = self.inventory.commit(order_id, checked).await?;

        let order = match self.open_order(order_id, &command, priced).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(
                    order_id = %order_id,
                    customer_id = %command.customer_id,
                    error = %e,
                    "Releasing reserved stock after failed placement"
                );
                if let Err(release_err) = self
                    .inventory
                    .release(order_id, &reservation.stock_lines())
                    .await
                {
                    tracing::error!(error = %release_err, "Reserved stock could not be fully released");
                }
                return Err(e);
            }
        };

        self.notify(&order);
        Ok(order)
    }

    async fn open_order(
        &self,
        order_id: Uuid,
        command: &PlaceOrder,
        priced: PricedOrder,
    ) -> Result<OrderAggregate, OrderError> {
        let order_number = self.numbering.assign(self.clock.today()).await?;
        let placed_at = self.clock.now();

        let draft = OrderDraft {
            order_number,
            customer_id: command.customer_id,
            vendor_orders: split_by_vendor(&priced.items),
            items: priced.items,
            shipping_address: command.shipping_address.clone(),
            payment_info: PaymentInfo {
                id: command.payment.id.clone(),
                status: PaymentStatus::Completed,
                method: command.payment.method,
            },
            prices: priced.prices,
            notes: command.notes.clone(),
            placed_at,
        };

        let event = OrderAggregate::open(draft)?;
        let mut order = OrderAggregate::apply_first_event(order_id, &event)?;

        let version = self
            .append(order_id, 0, vec![event], Some(command.customer_id))
            .await?;
        order.set_version(version);

        Ok(order)
    }

    /// Fire-and-forget; placement never waits on the transport
    fn notify(&self, order: &OrderAggregate) {
        let notifier = self.notifier.clone();
        let metrics = self.metrics.clone();
        let timeout = self.notify_timeout;
        let order = order.clone();

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(timeout, notifier.notify_order_created(&order)).await;

            let error = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", timeout),
            };

            metrics.notifications_failed.inc();
            tracing::warn!(
                order_id = %order.id,
                order_number = %order.order_number,
                error = %error,
                "Order created notification dropped"
            );
        });
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Customer cancellation; someone else's order is reported as not found
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderAggregate, OrderError> {
        let result: Result<OrderAggregate, OrderError> = async {
            let order = self.load(order_id).await?;
            if !order.is_owned_by(customer_id) {
                return Err(OrderError::OrderNotFound(order_id));
            }

            let command = OrderCommand::Cancel {
                reason,
                cancelled_by: CancelledBy::Customer(customer_id),
                at: self.clock.now(),
            };
            self.execute(order, command, Some(customer_id)).await
        }
        .await;

        self.observe(result)
    }

    /// Administrative status change (cancelling here releases stock too)
    pub async fn update_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        tracking_number: Option<String>,
        reason: Option<String>,
    ) -> Result<OrderAggregate, OrderError> {
        let result: Result<OrderAggregate, OrderError> = async {
            let order = self.load(order_id).await?;
            let command = OrderCommand::ChangeStatus {
                to: status,
                tracking_number,
                estimated_delivery: None,
                reason,
                at: self.clock.now(),
            };
            self.execute(order, command, None).await
        }
        .await;

        self.observe(result)
    }

    /// Administrative move to shipped with tracking details
    pub async fn ship_order(
        &self,
        order_id: Uuid,
        tracking_number: Option<String>,
        estimated_delivery: Option<DateTime<Utc>>,
    ) -> Result<OrderAggregate, OrderError> {
        let result: Result<OrderAggregate, OrderError> = async {
            let order = self.load(order_id).await?;
            let command = OrderCommand::ChangeStatus {
                to: OrderStatus::Shipped,
                tracking_number,
                estimated_delivery,
                reason: None,
                at: self.clock.now(),
            };
            self.execute(order, command, None).await
        }
        .await;

        self.observe(result)
    }

    pub async fn update_vendor_order(
        &self,
        order_id: Uuid,
        vendor_id: Uuid,
        status: VendorOrderStatus,
        tracking_number: Option<String>,
    ) -> Result<OrderAggregate, OrderError> {
        let result: Result<OrderAggregate, OrderError> = async {
            let order = self.load(order_id).await?;
            let command = OrderCommand::UpdateVendorOrder {
                vendor_id,
                status,
                tracking_number,
                at: self.clock.now(),
            };
            self.execute(order, command, Some(vendor_id)).await
        }
        .await;

        self.observe(result)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn find_order(&self, order_id: Uuid) -> Result<OrderAggregate, OrderError> {
        self.load(order_id).await
    }

    /// The customer's own order; anyone else's is reported as not found
    pub async fn find_customer_order(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<OrderAggregate, OrderError> {
        let order = self.load(order_id).await?;
        if !order.is_owned_by(customer_id) {
            return Err(OrderError::OrderNotFound(order_id));
        }
        Ok(order)
    }

    /// A vendor's slice of an order; orders without the vendor are not found
    pub async fn vendor_order(
        &self,
        order_id: Uuid,
        vendor_id: Uuid,
    ) -> Result<VendorOrderView, OrderError> {
        self.load(order_id)
            .await?
            .vendor_view(vendor_id)
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// The customer's orders, newest first
    pub async fn list_customer_orders(
        &self,
        customer_id: Uuid,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> OrderPage<OrderAggregate> {
        self.projection.customer_orders(customer_id, status, page).await
    }

    /// Orders containing the vendor's products, each narrowed to that vendor
    pub async fn list_vendor_orders(
        &self,
        vendor_id: Uuid,
        status: Option<VendorOrderStatus>,
        page: PageRequest,
    ) -> OrderPage<VendorOrderView> {
        self.projection.vendor_orders(vendor_id, status, page).await
    }

    /// Administrative listing
    pub async fn list_orders(&self, filter: OrderFilter, page: PageRequest) -> OrderPage<OrderAggregate> {
        self.projection.orders(filter, page).await
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn load(&self, order_id: Uuid) -> Result<OrderAggregate, OrderError> {
        load_aggregate::<OrderAggregate, _>(self.event_store.as_ref(), order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Command → events → append → apply, then release stock if cancelled
    async fn execute(
        &self,
        mut order: OrderAggregate,
        command: OrderCommand,
        actor: Option<Uuid>,
    ) -> Result<OrderAggregate, OrderError> {
        let events = order.handle_command(&command)?;
        let cancelled = events.iter().any(|e| matches!(e, OrderEvent::Cancelled(_)));

        let version = self
            .append(order.id, order.version(), events.clone(), actor)
            .await?;

        for event in &events {
            order.apply_event(event)?;
        }
        order.set_version(version);

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            command = command.name(),
            status = %order.order_status,
            version = version,
            "Order updated"
        );

        if cancelled {
            self.release_cancelled(&order).await;
        }

        Ok(order)
    }

    async fn release_cancelled(&self, order: &OrderAggregate) {
        self.metrics.orders_cancelled.inc();

        // The cancellation is already durable; a failed release is surfaced
        // through logs and stock_release_failures_total.
        if let Err(e) = self.inventory.release(order.id, &order.stock_lines()).await {
            tracing::error!(
                order_id = %order.id,
                order_number = %order.order_number,
                error = %e,
                "Stock not fully released for cancelled order"
            );
        }
    }

    async fn append(
        &self,
        order_id: Uuid,
        expected_version: i64,
        events: Vec<OrderEvent>,
        actor: Option<Uuid>,
    ) -> Result<i64, OrderError> {
        let correlation_id = Uuid::new_v4();
        let timestamp = self.clock.now();

        let envelopes = events
            .into_iter()
            .zip(expected_version + 1..)
            .map(|(event, seq)| {
                let envelope = EventEnvelope::new(
                    order_id,
                    seq,
                    event.event_type().to_string(),
                    event,
                    correlation_id,
                )
                .with_timestamp(timestamp);

                match actor {
                    Some(user_id) => envelope.with_user(user_id),
                    None => envelope,
                }
            })
            .collect::<Vec<_>>();

        let version = self
            .event_store
            .append_events(order_id, expected_version, envelopes.clone())
            .await?;

        // The events are durable at this point; a stale read model is only logged
        if let Err(e) = self.projection.project(&envelopes).await {
            tracing::error!(order_id = %order_id, error = %e, "Order read model not updated");
        }

        Ok(version)
    }

    fn observe<T>(&self, result: Result<T, OrderError>) -> Result<T, OrderError> {
        if let Err(e) = &result {
            self.metrics.record_failure(e.kind());
        }
        result
    }
}

// ============================================================================
// Scenario Tests - whole flows against the in-memory adapters
// ============================================================================

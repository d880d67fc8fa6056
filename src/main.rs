use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use vendora_orders::config::{AppConfig, NotifierBackend, SequenceBackend, StorageBackend};
use vendora_orders::domain::catalog::{Catalog, ProductSnapshot};
use vendora_orders::domain::order::{
    OrderEvent, OrderProjection, OrderSequence, OrderStatus, PageRequest, PlaceOrderRequest,
    VendorOrderStatus,
};
use vendora_orders::event_sourcing::{EventStore, InMemoryEventStore, PostgresEventStore};
use vendora_orders::messaging::{BroadcastNotifier, GuardedNotifier, LogNotifier, OrderNotifier};
use vendora_orders::metrics::{self, Metrics};
use vendora_orders::storage::{
    self, InMemoryCatalog, InMemoryOrderSequence, PostgresCatalog, PostgresOrderSequence,
    RedisOrderSequence,
};
use vendora_orders::OrderCommandHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vendora_orders=debug")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(
        storage = ?config.storage.backend,
        sequence = ?config.sequence.backend,
        notifier = ?config.notifier.backend,
        "Starting Vendora order engine"
    );

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    if config.metrics.enabled {
        let registry = Arc::new(metrics.registry().clone());
        let port = config.metrics.port;
        std::thread::spawn(move || {
            let system = actix_web::rt::System::new();
            if let Err(e) = system.block_on(metrics::start_metrics_server(registry, port)) {
                tracing::error!(error = %e, "Metrics server error");
            }
        });
    }

    // === 2. Storage ===
    let needs_postgres = config.storage.backend == StorageBackend::Postgres
        || config.sequence.backend == SequenceBackend::Postgres;
    let pool: Option<PgPool> = if needs_postgres {
        Some(storage::connect(&config.storage.database_url, config.storage.max_connections).await?)
    } else {
        None
    };

    let demo_products = demo_products();

    let (event_store, catalog): (Arc<dyn EventStore<OrderEvent>>, Arc<dyn Catalog>) =
        match (&config.storage.backend, &pool) {
            (StorageBackend::Postgres, Some(pool)) => {
                let store = PostgresEventStore::<OrderEvent>::new(pool.clone(), "Order");
                store.ensure_schema().await?;
                let catalog = PostgresCatalog::new(pool.clone());
                catalog.ensure_schema().await?;
                for product in &demo_products {
                    catalog.upsert_product(product).await?;
                }
                let store: Arc<dyn EventStore<OrderEvent>> = Arc::new(store);
                let catalog: Arc<dyn Catalog> = Arc::new(catalog);
                (store, catalog)
            }
            _ => {
                let store: Arc<dyn EventStore<OrderEvent>> = Arc::new(InMemoryEventStore::new());
                let catalog: Arc<dyn Catalog> =
                    Arc::new(InMemoryCatalog::with_products(demo_products.clone()));
                (store, catalog)
            }
        };

    let sequence: Arc<dyn OrderSequence> = match (&config.sequence.backend, &pool) {
        (SequenceBackend::Postgres, Some(pool)) => {
            let sequence = PostgresOrderSequence::new(pool.clone());
            sequence.ensure_schema().await?;
            Arc::new(sequence)
        }
        (SequenceBackend::Redis, _) => Arc::new(
            RedisOrderSequence::connect(&config.sequence.redis_url, &config.sequence.key_prefix)
                .await?,
        ),
        _ => Arc::new(InMemoryOrderSequence::new()),
    };

    // === 3. Notifier (best-effort, behind a circuit breaker) ===
    let transport: Arc<dyn OrderNotifier> = match config.notifier.backend {
        NotifierBackend::Log => Arc::new(LogNotifier),
        NotifierBackend::Broadcast => Arc::new(BroadcastNotifier::new(256)),
        NotifierBackend::Redpanda => redpanda_notifier(&config)?,
    };
    let notifier = Arc::new(GuardedNotifier::new(
        transport,
        config.notifier.timeout(),
        config.notifier.circuit_breaker(),
    ));

    let projection = OrderProjection::rebuild(event_store.as_ref())
        .await
        .context("failed to rebuild order read model")?;

    let handler = OrderCommandHandler::new(event_store, catalog, sequence, notifier)
        .with_projection(Arc::new(projection))
        .with_pricing(config.pricing_policy())
        .with_metrics(metrics.clone())
        .with_notify_timeout(config.notifier.timeout());

    // === 4. Demo flow ===
    run_demo(&handler, &demo_products).await?;

    if config.metrics.enabled {
        tracing::info!(port = config.metrics.port, "Demo finished; serving metrics until Ctrl+C");
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}

#[cfg(feature = "redpanda")]
fn redpanda_notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn OrderNotifier>> {
    use vendora_orders::messaging::RedpandaNotifier;

    Ok(Arc::new(RedpandaNotifier::new(
        &config.notifier.brokers,
        &config.notifier.topic,
        config.notifier.timeout(),
    )?))
}

#[cfg(not(feature = "redpanda"))]
fn redpanda_notifier(_config: &AppConfig) -> anyhow::Result<Arc<dyn OrderNotifier>> {
    anyhow::bail!("notifier backend 'redpanda' requires building with --features redpanda")
}

fn demo_products() -> Vec<ProductSnapshot> {
    let bookshop = Uuid::new_v4();
    let potter = Uuid::new_v4();

    vec![
        ProductSnapshot {
            id: Uuid::new_v4(),
            name: "Field Notes (3-pack)".to_string(),
            price: Decimal::new(1299, 2),
            stock: 40,
            is_active: true,
            vendor_id: bookshop,
            images: vec!["https://cdn.vendora.example/field-notes.jpg".to_string()],
            discount: Decimal::ZERO,
        },
        ProductSnapshot {
            id: Uuid::new_v4(),
            name: "Stoneware Mug".to_string(),
            price: Decimal::new(2400, 2),
            stock: 5,
            is_active: true,
            vendor_id: potter,
            images: vec![],
            discount: Decimal::new(10, 0),
        },
    ]
}

async fn run_demo(handler: &OrderCommandHandler, products: &[ProductSnapshot]) -> anyhow::Result<()> {
    let customer_id = Uuid::new_v4();

    let request: PlaceOrderRequest = serde_json::from_value(serde_json::json!({
        "items": products
            .iter()
            .map(|p| serde_json::json!({ "product": p.id.to_string(), "quantity": 2 }))
            .collect::<Vec<_>>(),
        "shippingAddress": {
            "name": "Ada Obi",
            "phone": "+234 801 234 5678",
            "street": "12 Marina Road",
            "city": "Lagos",
            "state": "Lagos",
            "zipCode": "101001",
            "country": "NG"
        },
        "paymentInfo": { "id": "pi_demo_001", "method": "stripe" },
        "notes": "Leave at the front desk"
    }))?;

    let order = match handler.place_order_request(customer_id, &request).await {
        Ok(order) => order,
        Err(e) => {
            tracing::error!(response = ?e.to_response(), "Demo order rejected");
            return Err(e.into());
        }
    };
    tracing::info!(summary = %serde_json::to_string(&order.summary())?, "Placed demo order");

    if let Some(first_vendor) = order.vendor_orders.first().map(|group| group.vendor_id) {
        handler
            .update_vendor_order(order.id, first_vendor, VendorOrderStatus::Processing, None)
            .await?;
        let view = handler.vendor_order(order.id, first_vendor).await?;
        tracing::info!(
            vendor_id = %first_vendor,
            items = view.items.len(),
            status = %view.vendor_order.status,
            "Vendor picked up its sub-order"
        );
    }

    handler
        .update_status(order.id, OrderStatus::Processing, None, None)
        .await?;

    let cancelled = handler
        .cancel_order(order.id, customer_id, Some("Ordered by mistake".to_string()))
        .await?;
    tracing::info!(
        order_number = %cancelled.order_number,
        status = %cancelled.order_status,
        "Demo order cancelled, stock released"
    );

    let history = handler
        .list_customer_orders(customer_id, None, PageRequest::default())
        .await;
    tracing::info!(
        orders = history.pagination.total,
        pages = history.pagination.pages,
        "Customer order history"
    );

    Ok(())
}

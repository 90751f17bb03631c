//! Consumer binary.
//!
//! Wires the bus, topology, projection and worker, feeds a short burst of
//! demo traffic through the pipeline in place of the record-store write
//! path, and logs the resulting index contents.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::info;

use searchsync_broker::{Broker, ensure_topology};
use searchsync_core::{Product, ProductId};
use searchsync_index::{InMemoryIndex, SearchIndex};
use searchsync_relay::{
    ConsumerConfig, Dispatcher, HandlerTable, ProductChange, ProductProjection, ProductPublisher,
    Worker,
};

fn main() -> anyhow::Result<()> {
    searchsync_observability::init();

    let config = ConsumerConfig::from_env();
    info!(?config, "starting searchsync consumer");

    let broker = Broker::new();
    let connection = broker.connect();

    let consumer_channel = connection.channel();
    ensure_topology(&consumer_channel, &config.binding_spec())?;

    let index = Arc::new(InMemoryIndex::new());
    let dispatcher = Dispatcher::new(
        consumer_channel,
        config.queue.clone(),
        HandlerTable::for_entity(&config.entity_kind),
        ProductProjection::new(Arc::clone(&index)),
    );
    let worker = Worker::spawn("searchsync-consumer", dispatcher, config.tick);

    let publisher = ProductPublisher::new(connection.channel(), config.exchange.clone());
    publisher.publish(&ProductChange::Created(sample_product(
        1, "Desk lamp", 49.0,
    )))?;
    publisher.publish(&ProductChange::Created(sample_product(
        2,
        "Office chair",
        219.0,
    )))?;
    let mut updated = sample_product(1, "Desk lamp, warm white", 44.0);
    updated.sales = 3;
    publisher.publish(&ProductChange::Updated(updated))?;
    publisher.publish(&ProductChange::Deleted(ProductId::new(2)))?;

    wait_until_drained(&broker, &config.queue, Duration::from_secs(5));

    for doc in index.search("")? {
        info!(
            product_id = %doc.product_id,
            title = %doc.title,
            price = doc.price,
            sales = doc.sales,
            "indexed document"
        );
    }

    worker.shutdown();
    connection.close();
    broker.close();
    Ok(())
}

fn wait_until_drained(broker: &Broker, queue: &str, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if broker.queue_depth(queue) == Some(0) {
            // The worker may still hold the last delivery in flight.
            std::thread::sleep(Duration::from_millis(50));
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn sample_product(id: u64, title: &str, price: f64) -> Product {
    let now = Utc::now();
    Product {
        product_id: ProductId::new(id),
        title: title.to_string(),
        long_title: format!("{title} (catalogue edition)"),
        description: format!("Demo listing for {title}"),
        sku: format!("DEMO-{id:04}"),
        price,
        sales: 0,
        created_at: now,
        updated_at: now,
    }
}

use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, info_span};

use mongo_log_sink::buffered::BufferedHandler;
use mongo_log_sink::config::HandlerConfig;
use mongo_log_sink::connection::ConnectionMode;
use mongo_log_sink::direct::DirectHandler;
use mongo_log_sink::handler::LogHandler;
use mongo_log_sink::init::init_tracing;
use mongo_log_sink::mongo::MongoTransport;

/// Persistent-connection handlers. Pass `direct` as first argument to
/// write every record immediately instead of buffering.
#[tokio::main]
async fn main() {
    let transport = MongoTransport::from_uri("mongodb://127.0.0.1:27017/?appName=orders")
        .await
        .expect("parse connection string");

    let config = HandlerConfig {
        capacity: 500,
        collection_name: "orders".to_string(),
        connection_mode: ConnectionMode::Persistent,
        ..HandlerConfig::default()
    };

    let direct = std::env::args().nth(1).as_deref() == Some("direct");
    let handler: Arc<dyn LogHandler> = if direct {
        Arc::new(DirectHandler::new(transport, config).await.expect("build handler"))
    } else {
        Arc::new(BufferedHandler::new(transport, config).await.expect("build handler"))
    };
    init_tracing(handler.clone()).expect("install subscriber");

    for order_id in 0..20u64 {
        let span = info_span!("process_order", order_id);
        let _entered = span.enter();
        if order_id % 7 == 6 {
            error!(order_id, "payment declined");
        } else {
            info!(order_id, "order accepted");
        }
    }

    sleep(Duration::from_millis(500)).await;

    let stats = handler.stats().snapshot();
    println!("{:?}", stats);

    handler.flush().await;
    handler.close().await;
}

use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use mongo_log_sink::buffered::BufferedHandler;
use mongo_log_sink::config::HandlerConfig;
use mongo_log_sink::handler::LogHandler;
use mongo_log_sink::init::init_tracing;
use mongo_log_sink::mongo::MongoTransport;
use mongo_log_sink::transport::CollectionOptions;

/// Buffered handler that connects for every flush. Configure with
/// `MONGO_LOG_URI`, `MONGO_LOG_DATABASE`, `MONGO_LOG_COLLECTION`, ...
#[tokio::main]
async fn main() {
    let transport = MongoTransport::from_env().await.expect("parse MONGO_LOG_URI");

    let mut config = HandlerConfig::from_env().expect("read MONGO_LOG_* variables");
    config.auto_create_collection = true;
    config.collection_options = CollectionOptions::capped(64 * 1024 * 1024);

    let handler = Arc::new(
        BufferedHandler::new(transport, config)
            .await
            .expect("prepare log collection"),
    );
    init_tracing(handler.clone()).expect("install subscriber");

    info!("starting service");
    warn!(queue_depth = 812, "queue is filling up");

    // Nothing reaches MongoDB until the buffer fills or this error arrives.
    error!(user_id = 42, reason = "invalid password", "authentication failed");

    sleep(Duration::from_secs(1)).await;

    info!("shutting down");
    sleep(Duration::from_millis(200)).await;
    handler.flush().await;
    handler.close().await;
}

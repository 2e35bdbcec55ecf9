use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use mongo_log_sink::buffered::BufferedHandler;
use mongo_log_sink::config::HandlerConfig;
use mongo_log_sink::handler::LogHandler;
use mongo_log_sink::init::{init_tracing_with_config, LayerConfig};
use mongo_log_sink::memory::MemoryTransport;

#[tokio::main]
async fn main() {
    let transport = MemoryTransport::new();
    let config = HandlerConfig {
        capacity: 1_000,
        ..HandlerConfig::default()
    };
    let handler = Arc::new(
        BufferedHandler::new(transport.clone(), config)
            .await
            .expect("build handler"),
    );

    let layer_config = LayerConfig {
        channel_buffer: 50_000,
        enable_stdout: false,
        ..LayerConfig::default()
    };
    init_tracing_with_config(handler.clone(), layer_config).expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        if i % 1_000 == 999 {
            error!(iteration = i, "load test error");
        } else {
            info!(iteration = i, "load test event");
        }
    }

    let elapsed = start.elapsed();
    println!("emitted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    // Give background task a little time to drain the channel
    sleep(Duration::from_secs(2)).await;
    handler.flush().await;

    let stats = handler.stats().snapshot();
    println!(
        "handler: emitted={} delivered={} flushes={} stored={}",
        stats.emitted,
        stats.delivered,
        stats.flushes,
        transport.written().len()
    );
}

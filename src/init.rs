use crate::handler::LogHandler;
use crate::layer::MongoLogLayer;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Logging layer configuration.
///
/// **Fields**
/// - `channel_buffer`: maximum number of [`LogRecord`](crate::record::LogRecord)s
///   queued for the handler before new records are dropped.
/// - `min_level`: most verbose level the layer forwards to the handler.
/// - `default_filter`: `EnvFilter` directives used when `RUST_LOG` is not
///   set.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added so events are also printed to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub min_level: Level,
    pub default_filter: String,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            min_level: Level::DEBUG,
            default_filter: "info".to_string(),
            enable_stdout: true,
        }
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid log filter directives: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global `tracing` subscriber with a [`MongoLogLayer`] in
/// front of `handler`.
///
/// **Parameters**
/// - `handler`: implementation of [`LogHandler`] that will receive the
///   captured records.
/// - `config`: [`LayerConfig`] controlling the channel and filtering.
///
/// **Returns**
/// - the handle of the background task feeding the handler. It completes
///   once the subscriber is dropped and the handler was flushed and
///   closed.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    handler: Arc<dyn LogHandler>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_filter)?,
    };

    let (layer, handle) = MongoLogLayer::new(handler, config.channel_buffer, config.min_level);
    let fmt_layer = config.enable_stdout.then(tracing_subscriber::fmt::layer);

    let subscriber = Registry::default().with(filter).with(layer).with(fmt_layer);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        handle.abort();
        return Err(e.into());
    }

    Ok(handle)
}

/// Initialize tracing with [`LayerConfig::default`]. This is the
/// recommended entrypoint for typical services.
pub fn init_tracing(handler: Arc<dyn LogHandler>) -> Result<JoinHandle<()>, InitError> {
    init_tracing_with_config(handler, LayerConfig::default())
}

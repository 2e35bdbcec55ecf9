use crate::connection::ConnectionMode;
use crate::env::{
    env_opt, MONGO_LOG_CAPACITY_ENV, MONGO_LOG_COLLECTION_ENV, MONGO_LOG_DATABASE_ENV,
    MONGO_LOG_FLUSH_LEVEL_ENV, MONGO_LOG_PERSISTENT_ENV,
};
use crate::error::{ConfigError, HandlerError};
use crate::record::Severity;
use crate::transport::{CollectionOptions, Namespace};
use serde::Deserialize;

/// Configuration shared by all handler variants.
///
/// **Fields**
/// - `capacity`: maximum buffered records before a forced flush. Ignored
///   by direct handlers.
/// - `flush_threshold`: any record at or above this severity flushes the
///   whole buffer immediately. Ignored by direct handlers.
/// - `database_name`, `collection_name`: target location.
/// - `auto_create_collection`: create the collection with
///   `collection_options` when the handler is built.
/// - `connection_mode`: connect per write or keep one connection open.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub capacity: usize,
    pub flush_threshold: Severity,
    pub database_name: String,
    pub collection_name: String,
    pub auto_create_collection: bool,
    pub collection_options: CollectionOptions,
    pub connection_mode: ConnectionMode,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            flush_threshold: Severity::Error,
            database_name: "log".to_string(),
            collection_name: "log".to_string(),
            auto_create_collection: false,
            collection_options: CollectionOptions::default(),
            connection_mode: ConnectionMode::PerFlush,
        }
    }
}

impl HandlerConfig {
    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.database_name.clone(), self.collection_name.clone())
    }

    pub fn validate(&self) -> Result<(), HandlerError> {
        if self.capacity == 0 {
            return Err(HandlerError::ZeroCapacity);
        }
        if self.database_name.trim().is_empty() || self.collection_name.trim().is_empty() {
            return Err(HandlerError::EmptyNamespace);
        }
        Ok(())
    }

    /// Build a config from `MONGO_LOG_*` variables, keeping defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = HandlerConfig::default();

        if let Some(database) = env_opt(MONGO_LOG_DATABASE_ENV) {
            config.database_name = database;
        }
        if let Some(collection) = env_opt(MONGO_LOG_COLLECTION_ENV) {
            config.collection_name = collection;
        }
        if let Some(raw) = env_opt(MONGO_LOG_CAPACITY_ENV) {
            config.capacity = match raw.trim().parse::<usize>() {
                Ok(0) => return Err(ConfigError::invalid(MONGO_LOG_CAPACITY_ENV, raw, "must be positive")),
                Ok(n) => n,
                Err(e) => return Err(ConfigError::invalid(MONGO_LOG_CAPACITY_ENV, raw, e)),
            };
        }
        if let Some(raw) = env_opt(MONGO_LOG_FLUSH_LEVEL_ENV) {
            config.flush_threshold = raw
                .parse()
                .map_err(|e| ConfigError::invalid(MONGO_LOG_FLUSH_LEVEL_ENV, raw.clone(), e))?;
        }
        if let Some(raw) = env_opt(MONGO_LOG_PERSISTENT_ENV) {
            let persistent = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::invalid(MONGO_LOG_PERSISTENT_ENV, raw, "expected a boolean")),
            };
            config.connection_mode = if persistent {
                ConnectionMode::Persistent
            } else {
                ConnectionMode::PerFlush
            };
        }

        Ok(config)
    }
}

/// Environment variable names used by this crate for convenient
/// configuration of handlers from services.
///
/// These are purely helpers; the handler and transport types remain
/// decoupled from environment access.

/// MongoDB connection string, e.g. `mongodb://127.0.0.1:27017`.
pub const MONGO_LOG_URI_ENV: &str = "MONGO_LOG_URI";

/// Target database name.
pub const MONGO_LOG_DATABASE_ENV: &str = "MONGO_LOG_DATABASE";

/// Target collection name.
pub const MONGO_LOG_COLLECTION_ENV: &str = "MONGO_LOG_COLLECTION";

/// Maximum number of buffered records before a forced flush.
pub const MONGO_LOG_CAPACITY_ENV: &str = "MONGO_LOG_CAPACITY";

/// Severity at or above which every emission flushes, e.g. `ERROR`.
pub const MONGO_LOG_FLUSH_LEVEL_ENV: &str = "MONGO_LOG_FLUSH_LEVEL";

/// `true` to keep one connection open instead of connecting per flush.
pub const MONGO_LOG_PERSISTENT_ENV: &str = "MONGO_LOG_PERSISTENT";

/// Default connection string when [`MONGO_LOG_URI_ENV`] is unset.
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating unset and empty the same.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

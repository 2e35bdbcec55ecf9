use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Severity of a [`LogRecord`], ordered from least to most important.
///
/// Numeric levels follow the conventional `10/20/30/40` spacing so that
/// documents written by this crate sort the same way as those written by
/// other logging front ends sharing the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    #[serde(alias = "WARNING")]
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }

    pub fn level_no(&self) -> u8 {
        match self {
            Severity::Trace => 5,
            Severity::Debug => 10,
            Severity::Info => 20,
            Severity::Warn => 30,
            Severity::Error => 40,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Severity::Trace,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

impl From<Severity> for tracing::Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Trace => tracing::Level::TRACE,
            Severity::Debug => tracing::Level::DEBUG,
            Severity::Info => tracing::Level::INFO,
            Severity::Warn => tracing::Level::WARN,
            Severity::Error => tracing::Level::ERROR,
        }
    }
}

/// Error returned when a severity name cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown severity name: {0}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Severity::Trace),
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Immutable snapshot of a single log event.
///
/// `timestamp` is the creation time of the event, not the time it was
/// flushed. `sequence` is stamped by the handler when the record is
/// admitted, so within one handler it follows buffer order exactly even
/// when two records share a clock tick.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub process_name: String,
    pub process_id: u32,
    pub thread_name: String,
    pub thread_id: u64,
    pub pathname: Option<String>,
    pub filename: Option<String>,
    pub module: Option<String>,
    pub function: Option<String>,
    pub line: Option<u32>,
    pub message: Option<String>,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub severity: Severity,
    pub sequence: u64,
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

fn process_name() -> &'static str {
    static NAME: OnceLock<String> = OnceLock::new();
    NAME.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "unknown".to_string())
    })
}

impl LogRecord {
    /// Capture a new record on the calling thread.
    ///
    /// Process and thread identity are taken from the current thread, so
    /// this must run where the event is emitted rather than on a
    /// background worker.
    pub fn capture(severity: Severity, message: Option<String>) -> Self {
        let current = std::thread::current();
        LogRecord {
            timestamp: Utc::now(),
            process_name: process_name().to_string(),
            process_id: std::process::id(),
            thread_name: current.name().unwrap_or("unnamed").to_string(),
            thread_id: THREAD_ID.with(|id| *id),
            pathname: None,
            filename: None,
            module: None,
            function: None,
            line: None,
            message,
            fields: BTreeMap::new(),
            severity,
            sequence: 0,
        }
    }

    /// Attach the source location. `filename` is derived from `pathname`.
    pub fn with_location(mut self, pathname: Option<&str>, module: Option<&str>, line: Option<u32>) -> Self {
        self.filename = pathname.and_then(|p| {
            std::path::Path::new(p)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        });
        self.pathname = pathname.map(str::to_string);
        self.module = module.map(str::to_string);
        self.line = line;
        self
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Message payload as persisted: plain text when the event carried no
    /// structured fields, otherwise an object holding the message and the
    /// fields side by side.
    pub fn payload(&self) -> serde_json::Value {
        if self.fields.is_empty() {
            return serde_json::Value::String(self.message.clone().unwrap_or_default());
        }

        let mut object = serde_json::Map::new();
        if let Some(message) = &self.message {
            object.insert("message".to_string(), serde_json::Value::String(message.clone()));
        }
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        serde_json::Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_matches_level_numbers() {
        let all = [
            Severity::Trace,
            Severity::Debug,
            Severity::Info,
            Severity::Warn,
            Severity::Error,
        ];
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].level_no() < pair[1].level_no());
        }
    }

    #[test]
    fn severity_parses_common_names() {
        assert_eq!("error".parse::<Severity>(), Ok(Severity::Error));
        assert_eq!("WARNING".parse::<Severity>(), Ok(Severity::Warn));
        assert_eq!(" info ".parse::<Severity>(), Ok(Severity::Info));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_from_tracing_level() {
        assert_eq!(Severity::from(&tracing::Level::WARN), Severity::Warn);
        assert_eq!(tracing::Level::from(Severity::Debug), tracing::Level::DEBUG);
    }

    #[test]
    fn capture_fills_process_and_thread_identity() {
        let record = LogRecord::capture(Severity::Info, Some("hello".to_string()));
        assert_eq!(record.process_id, std::process::id());
        assert!(!record.process_name.is_empty());
        assert!(record.thread_id > 0);
        assert_eq!(record.sequence, 0);
    }

    #[test]
    fn thread_ids_differ_between_threads() {
        let here = LogRecord::capture(Severity::Info, None).thread_id;
        let there = std::thread::spawn(|| LogRecord::capture(Severity::Info, None).thread_id)
            .join()
            .unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn location_derives_filename() {
        let record = LogRecord::capture(Severity::Info, None).with_location(
            Some("src/server/handlers.rs"),
            Some("app::server::handlers"),
            Some(42),
        );
        assert_eq!(record.filename.as_deref(), Some("handlers.rs"));
        assert_eq!(record.module.as_deref(), Some("app::server::handlers"));
        assert_eq!(record.line, Some(42));
    }

    #[test]
    fn payload_is_text_without_fields() {
        let record = LogRecord::capture(Severity::Info, Some("plain".to_string()));
        assert_eq!(record.payload(), serde_json::json!("plain"));
    }

    #[test]
    fn payload_merges_fields() {
        let record = LogRecord::capture(Severity::Error, Some("login failed".to_string()))
            .with_field("user_id", 42)
            .with_field("reason", "invalid password");
        assert_eq!(
            record.payload(),
            serde_json::json!({
                "message": "login failed",
                "user_id": 42,
                "reason": "invalid password",
            })
        );
    }
}

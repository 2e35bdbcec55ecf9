use crate::record::LogRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Target location of the written documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Namespace {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Options used when the target collection has to be created.
///
/// A capped collection is the usual choice for log storage: inserts stay
/// cheap and the oldest documents are evicted once `size_bytes` is reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionOptions {
    pub capped: bool,
    pub size_bytes: Option<u64>,
    pub max_documents: Option<u64>,
}

impl CollectionOptions {
    pub fn capped(size_bytes: u64) -> Self {
        CollectionOptions {
            capped: true,
            size_bytes: Some(size_bytes),
            max_documents: None,
        }
    }
}

/// Failure reported by a [`SinkTransport`].
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to document store: {0}")]
    Connect(#[source] BoxError),

    #[error("write to document store failed: {0}")]
    Write(#[source] BoxError),

    #[error("failed to prepare collection: {0}")]
    Collection(#[source] BoxError),
}

impl TransportError {
    pub fn connect(err: impl Into<BoxError>) -> Self {
        TransportError::Connect(err.into())
    }

    pub fn write(err: impl Into<BoxError>) -> Self {
        TransportError::Write(err.into())
    }

    pub fn collection(err: impl Into<BoxError>) -> Self {
        TransportError::Collection(err.into())
    }
}

/// Result of one ordered write.
///
/// `Partial::written` counts the records, from the front of the batch,
/// that the store acknowledged before the first failing one. Records after
/// the failure were not attempted.
#[derive(Debug)]
pub enum WriteResult {
    Complete,
    Partial { written: usize, cause: TransportError },
    Rejected(TransportError),
}

/// Write path to a document store.
///
/// The handler owns the transport and every connection it hands out;
/// there is no process-wide client. Connection options live inside the
/// transport value and are applied by `connect`.
#[async_trait]
pub trait SinkTransport: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Open a connection. Failures are treated like a write that
    /// confirmed nothing.
    async fn connect(&self) -> Result<Self::Connection, TransportError>;

    /// Insert `records` in order, stopping at the first record the store
    /// refuses.
    async fn write_ordered(
        &self,
        connection: &mut Self::Connection,
        namespace: &Namespace,
        records: &[LogRecord],
    ) -> WriteResult;

    async fn disconnect(&self, connection: Self::Connection);

    /// Create the collection if it does not exist yet. Idempotent.
    async fn ensure_collection_exists(
        &self,
        connection: &mut Self::Connection,
        namespace: &Namespace,
        options: &CollectionOptions,
    ) -> Result<(), TransportError>;
}

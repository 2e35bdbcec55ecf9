use crate::env::{env_or, DEFAULT_MONGO_URI, MONGO_LOG_URI_ENV};
use crate::record::LogRecord;
use crate::transport::{CollectionOptions, Namespace, SinkTransport, TransportError, WriteResult};
use async_trait::async_trait;
use mongodb::bson::{self, doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, CreateCollectionOptions, InsertManyOptions};
use mongodb::Client;
use serde_json::Value;
use tracing::debug;

/// Server error code returned when creating a collection that exists.
const NAMESPACE_EXISTS: i32 = 48;

/// MongoDB implementation of [`SinkTransport`].
///
/// Each `connect` builds a fresh [`Client`] from the stored
/// [`ClientOptions`] and pings the server, so an unreachable server is
/// reported as a connect failure instead of surfacing later in the write.
/// Records are inserted with an ordered `insert_many`: the server stops at
/// the first failing document and the index of that document is the number
/// of records confirmed.
///
/// Every record becomes one document. A capped collection is recommended
/// for log storage (see [`CollectionOptions::capped`]).
#[derive(Clone, Debug)]
pub struct MongoTransport {
    options: ClientOptions,
}

impl MongoTransport {
    /// Construct a transport from already-parsed driver options. Every
    /// driver setting (credentials, TLS, timeouts, app name) passes through
    /// untouched.
    pub fn new(options: ClientOptions) -> Self {
        MongoTransport { options }
    }

    /// Parse a `mongodb://` or `mongodb+srv://` connection string.
    pub async fn from_uri(uri: &str) -> Result<Self, TransportError> {
        let options = ClientOptions::parse(uri).await.map_err(TransportError::connect)?;
        Ok(Self::new(options))
    }

    /// Parse the connection string from `MONGO_LOG_URI`, defaulting to a
    /// local server.
    pub async fn from_env() -> Result<Self, TransportError> {
        Self::from_uri(&env_or(MONGO_LOG_URI_ENV, DEFAULT_MONGO_URI)).await
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

/// Map a record to the document stored in the collection.
///
/// `threadId` and `seq` are `u64` but BSON has no unsigned 64-bit type, so
/// they are stored as `Int64` with the same bits. Read them back with
/// `as u64`.
pub fn to_document(record: &LogRecord) -> Result<Document, bson::ser::Error> {
    Ok(doc! {
        "datetime": bson::DateTime::from_millis(record.timestamp.timestamp_millis()),
        "processName": record.process_name.as_str(),
        "processId": i64::from(record.process_id),
        "threadName": record.thread_name.as_str(),
        "threadId": record.thread_id as i64,
        "pathname": record.pathname.as_deref(),
        "filename": record.filename.as_deref(),
        "module": record.module.as_deref(),
        "funcName": record.function.as_deref(),
        "lineno": record.line.map(i64::from),
        "msg": bson::to_bson(&storable(record.payload()))?,
        "levelname": record.severity.as_str(),
        "levelno": i32::from(record.severity.level_no()),
        "seq": record.sequence as i64,
    })
}

/// Rewrite the JSON integers BSON cannot hold. Unsigned values above
/// `i64::MAX` become their decimal string, which keeps the exact value.
fn storable(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_u64() && n.as_i64().is_none() => Value::String(n.to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(storable).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, storable(v))).collect()),
        other => other,
    }
}

/// Map records in order until the first one that fails. Returns the mapped
/// prefix and the error that stopped it, if any.
fn map_prefix<T, E>(
    records: &[LogRecord],
    map: impl Fn(&LogRecord) -> Result<T, E>,
) -> (Vec<T>, Option<E>) {
    let mut mapped = Vec::with_capacity(records.len());
    for record in records {
        match map(record) {
            Ok(item) => mapped.push(item),
            Err(e) => return (mapped, Some(e)),
        }
    }
    (mapped, None)
}

/// Number of documents an ordered insert stored, given the indices of its
/// write errors. The server stops at the first failing document, so that is
/// the smallest index. No index means nothing is confirmed.
fn confirmed_prefix(indices: impl IntoIterator<Item = usize>) -> Option<usize> {
    indices.into_iter().min()
}

fn write_result(written: Option<usize>, cause: TransportError) -> WriteResult {
    match written {
        Some(written) => WriteResult::Partial { written, cause },
        None => WriteResult::Rejected(cause),
    }
}

/// Turn an `insert_many` error into a [`WriteResult`].
///
/// Only a bulk write error tells us how far an ordered insert got; any
/// other failure (network, auth, write concern) confirms nothing.
fn classify(err: mongodb::error::Error) -> WriteResult {
    let written = match err.kind.as_ref() {
        ErrorKind::BulkWrite(failure) => {
            confirmed_prefix(failure.write_errors.iter().flatten().map(|e| e.index))
        }
        _ => None,
    };
    write_result(written, TransportError::write(err))
}

#[async_trait]
impl SinkTransport for MongoTransport {
    type Connection = Client;

    async fn connect(&self) -> Result<Client, TransportError> {
        let client = Client::with_options(self.options.clone()).map_err(TransportError::connect)?;
        if let Err(e) = client.database("admin").run_command(doc! { "ping": 1 }, None).await {
            client.shutdown().await;
            return Err(TransportError::connect(e));
        }
        Ok(client)
    }

    async fn write_ordered(
        &self,
        connection: &mut Client,
        namespace: &Namespace,
        records: &[LogRecord],
    ) -> WriteResult {
        // A record that cannot be mapped ends the batch there, like a
        // server-side failure would.
        let (documents, unmapped) = map_prefix(records, to_document);
        let written = documents.len();

        if !documents.is_empty() {
            let mut options = InsertManyOptions::default();
            options.ordered = Some(true);

            let collection = connection
                .database(&namespace.database)
                .collection::<Document>(&namespace.collection);
            if let Err(e) = collection.insert_many(documents, options).await {
                return classify(e);
            }
        }

        match unmapped {
            None => WriteResult::Complete,
            Some(e) => WriteResult::Partial {
                written,
                cause: TransportError::write(e),
            },
        }
    }

    async fn disconnect(&self, connection: Client) {
        connection.shutdown().await;
    }

    async fn ensure_collection_exists(
        &self,
        connection: &mut Client,
        namespace: &Namespace,
        options: &CollectionOptions,
    ) -> Result<(), TransportError> {
        let database = connection.database(&namespace.database);
        let existing = database
            .list_collection_names(None)
            .await
            .map_err(TransportError::collection)?;
        if existing.iter().any(|name| name == &namespace.collection) {
            return Ok(());
        }

        let mut create = CreateCollectionOptions::default();
        if options.capped {
            create.capped = Some(true);
            create.size = options.size_bytes;
            create.max = options.max_documents;
        }

        match database.create_collection(&namespace.collection, create).await {
            Ok(()) => {
                debug!(namespace = %namespace, capped = options.capped, "created log collection");
                Ok(())
            }
            // Lost a race with another process creating the same collection.
            Err(e) if matches!(e.kind.as_ref(), ErrorKind::Command(c) if c.code == NAMESPACE_EXISTS) => Ok(()),
            Err(e) => Err(TransportError::collection(e)),
        }
    }
}

use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::transport::{Namespace, SinkTransport, TransportError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How a handler obtains connections from its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Connect before every write and disconnect right after it.
    #[default]
    PerFlush,
    /// Keep one connection open for the lifetime of the handler.
    Persistent,
}

/// Holder for a handler's connection.
///
/// Writers call [`acquire`](Self::acquire), use the connection, then hand
/// it back through [`release`](Self::release) on every path. Release either
/// disconnects or parks the connection for reuse depending on the mode.
pub(crate) struct ConnectionSlot<C> {
    mode: ConnectionMode,
    held: Option<C>,
}

impl<C: Send + 'static> ConnectionSlot<C> {
    pub(crate) fn new(mode: ConnectionMode) -> Self {
        ConnectionSlot { mode, held: None }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.held.is_some()
    }

    pub(crate) async fn acquire<T>(&mut self, transport: &T) -> Result<C, TransportError>
    where
        T: SinkTransport<Connection = C>,
    {
        match self.held.take() {
            Some(connection) => Ok(connection),
            None => transport.connect().await,
        }
    }

    pub(crate) async fn release<T>(&mut self, transport: &T, connection: C)
    where
        T: SinkTransport<Connection = C>,
    {
        match self.mode {
            ConnectionMode::Persistent => self.held = Some(connection),
            ConnectionMode::PerFlush => transport.disconnect(connection).await,
        }
    }

    /// Disconnect a parked connection, if any.
    pub(crate) async fn close<T>(&mut self, transport: &T)
    where
        T: SinkTransport<Connection = C>,
    {
        if let Some(connection) = self.held.take() {
            transport.disconnect(connection).await;
        }
    }
}

/// Build the connection slot for a new handler.
///
/// Creates the target collection when `auto_create_collection` is set and
/// opens the long-lived connection for persistent handlers. A failed
/// persistent connect is not fatal: the slot stays empty and the first
/// write connects again.
pub(crate) async fn prepare<T: SinkTransport>(
    transport: &T,
    namespace: &Namespace,
    config: &HandlerConfig,
) -> Result<ConnectionSlot<T::Connection>, HandlerError> {
    let mut slot = ConnectionSlot::new(config.connection_mode);

    if config.auto_create_collection {
        let mut connection = slot.acquire(transport).await.map_err(HandlerError::Connect)?;
        let created = transport
            .ensure_collection_exists(&mut connection, namespace, &config.collection_options)
            .await;
        slot.release(transport, connection).await;
        created.map_err(HandlerError::CollectionSetup)?;
        debug!(namespace = %namespace, "collection ready");
    } else if config.connection_mode == ConnectionMode::Persistent {
        match slot.acquire(transport).await {
            Ok(connection) => slot.release(transport, connection).await,
            Err(e) => warn!(
                namespace = %namespace,
                error = %e,
                "persistent connection unavailable at startup, will retry on first write"
            ),
        }
    }

    Ok(slot)
}

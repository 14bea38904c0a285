//! Bookkeeping of the connected clients.
//!
//! The [`ConnectionRegistry`] issues a fresh [`ClientId`] for every connection and keeps the
//! sending half of the channel the connection's writer task drains. Everything that wants to
//! talk to a client (the broadcast dispatcher, the session itself) goes through the registry.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use fedswipe_core::ClientId;

/// A serialized message on its way to a client.
pub type Outbound = Arc<str>;

/// The sending half of a client's outbound channel.
pub type ClientSender = mpsc::UnboundedSender<Outbound>;

/// The receiving half of a client's outbound channel.
pub type ClientReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Errors that can occur when sending to a client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("{0} is not connected")]
    UnknownClient(ClientId),
    #[error("the connection of {0} is closed")]
    Closed(ClientId),
}

/// The set of currently connected clients.
///
/// Cloning the registry is cheap and all clones share the same set.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    clients: Arc<RwLock<HashMap<ClientId, ClientSender>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection.
    ///
    /// Returns the identifier issued for the connection and the receiving half of its outbound
    /// channel.
    pub fn connect(&self) -> (ClientId, ClientReceiver) {
        let client_id = ClientId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let mut clients = self.clients.write();
        clients.insert(client_id, tx);
        debug!("{} connected, {} clients connected", client_id, clients.len());
        (client_id, rx)
    }

    /// Unregisters a connection.
    ///
    /// Returns `true` if this was the last connected client, i.e. the registry transitioned
    /// from non-empty to empty.
    pub fn disconnect(&self, client_id: ClientId) -> bool {
        let mut clients = self.clients.write();
        let removed = clients.remove(&client_id).is_some();
        debug!("{} disconnected, {} clients connected", client_id, clients.len());
        removed && clients.is_empty()
    }

    /// Checks whether the client is connected.
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.read().contains_key(&client_id)
    }

    /// Gets the number of connected clients.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Takes a point-in-time copy of the connected clients.
    ///
    /// Clients connecting or disconnecting after the snapshot was taken don't affect it.
    pub fn snapshot(&self) -> Vec<(ClientId, ClientSender)> {
        self.clients
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }

    /// Sends a message to a single client.
    pub fn send(&self, client_id: ClientId, message: Outbound) -> Result<(), SendError> {
        let tx = self
            .clients
            .read()
            .get(&client_id)
            .cloned()
            .ok_or(SendError::UnknownClient(client_id))?;
        tx.send(message).map_err(|_| SendError::Closed(client_id))
    }
}

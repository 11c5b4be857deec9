//! Client session state.
//!
//! Links connections to their outbound queue and, once joined, to their
//! player. The simulation never sees these handles; it asks for a client by
//! player id.

use protocol::{EntityId, ServerMessage};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Connection identifier, assigned on connect.
pub type ClientId = u32;

/// A connected client session.
#[derive(Debug)]
pub struct Client {
    /// Unique client ID.
    pub id: ClientId,
    /// Remote address.
    pub addr: SocketAddr,
    /// Player controlled by this client, once joined.
    pub player_id: Option<EntityId>,
    connected_at: Instant,
    outbound: mpsc::Sender<ServerMessage>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            addr,
            player_id: None,
            connected_at: Instant::now(),
            outbound,
        }
    }

    /// Time since the connection was accepted.
    pub fn session_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Queue a message without waiting. A full or closed queue drops it.
    pub fn send(&self, message: ServerMessage) -> bool {
        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full for client {} ({}), dropping message", self.id, self.addr);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Client {} outbound queue closed", self.id);
                false
            }
        }
    }
}

/// All live sessions with a player -> client lookup.
#[derive(Debug, Default)]
pub struct Sessions {
    next_client_id: ClientId,
    clients: HashMap<ClientId, Client>,
    by_player: HashMap<EntityId, ClientId>,
}

impl Sessions {
    pub fn new() -> Self {
        Self {
            next_client_id: 1,
            ..Self::default()
        }
    }

    /// Register a connection.
    pub fn add(&mut self, addr: SocketAddr, outbound: mpsc::Sender<ServerMessage>) -> ClientId {
        let id = self.next_client_id;
        self.next_client_id = self.next_client_id.wrapping_add(1).max(1);
        self.clients.insert(id, Client::new(id, addr, outbound));
        id
    }

    /// Drop a connection and its player link.
    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        if let Some(player_id) = client.player_id {
            self.by_player.remove(&player_id);
        }
        Some(client)
    }

    /// Attach a player to a connection.
    pub fn bind_player(&mut self, id: ClientId, player_id: EntityId) -> bool {
        let Some(client) = self.clients.get_mut(&id) else {
            return false;
        };
        client.player_id = Some(player_id);
        self.by_player.insert(player_id, id);
        true
    }

    #[inline]
    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Client controlling a player.
    #[inline]
    pub fn by_player(&self, player_id: EntityId) -> Option<&Client> {
        self.by_player.get(&player_id).and_then(|id| self.clients.get(id))
    }

    /// Player ids of every joined client.
    pub fn players(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.by_player.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

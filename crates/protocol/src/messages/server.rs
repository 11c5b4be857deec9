//! Server -> Client message building.

use crate::{Color, EntityId, Position, ProtocolError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A player as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub username: String,
    pub color: Color,
    pub size: f32,
}

impl PlayerView {
    #[inline]
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// A pellet as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PelletView {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

/// World dimensions sent with the join snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldSize {
    pub width: f32,
    pub height: f32,
}

/// Server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full snapshot of everything in view, sent once after join.
    #[serde(rename_all = "camelCase")]
    Joined {
        id: EntityId,
        players: HashMap<EntityId, PlayerView>,
        pellets: HashMap<EntityId, PelletView>,
        world_size: WorldSize,
    },
    /// Changes to the client's view since the last message.
    #[serde(rename_all = "camelCase")]
    GameState {
        players: HashMap<EntityId, PlayerView>,
        pellets: HashMap<EntityId, PelletView>,
        removed_players: Vec<EntityId>,
        removed_pellets: Vec<EntityId>,
    },
}

impl ServerMessage {
    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

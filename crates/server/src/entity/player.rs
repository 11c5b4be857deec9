//! Player-controlled blob.

use super::Entity;
use crate::spatial::EntityKind;
use glam::Vec2;
use protocol::{Color, EntityId, PlayerView};

/// A blob owned by a connected client.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    id: EntityId,
    pub(crate) position: Vec2,
    size: f32,
    pub username: String,
    pub color: Color,
}

impl Player {
    pub fn new(id: EntityId, position: Vec2, size: f32, username: String, color: Color) -> Self {
        Self {
            id,
            position,
            size,
            username,
            color,
        }
    }

    /// Add to the player's size. Negative amounts are ignored so size never shrinks.
    #[inline]
    pub fn grow(&mut self, amount: f32) {
        self.size += amount.max(0.0);
    }

    pub fn to_view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            username: self.username.clone(),
            color: self.color,
            size: self.size,
        }
    }
}

impl Entity for Player {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn size(&self) -> f32 {
        self.size
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Player
    }
}

//! Food pellet.

use super::Entity;
use crate::spatial::EntityKind;
use glam::Vec2;
use protocol::{EntityId, PelletView};

/// A stationary pellet that players eat to grow. Never mutated after spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Pellet {
    id: EntityId,
    position: Vec2,
    size: f32,
}

impl Pellet {
    pub fn new(id: EntityId, position: Vec2, size: f32) -> Self {
        Self { id, position, size }
    }

    pub fn to_view(&self) -> PelletView {
        PelletView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            size: self.size,
        }
    }
}

impl Entity for Pellet {
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
        EntityKind::Pellet
    }
}

//! Common entity behaviour.

use crate::spatial::{EntityKind, QuadItem};
use glam::Vec2;
use protocol::EntityId;

/// Anything with an id, a position and a diameter.
pub trait Entity {
    fn id(&self) -> EntityId;

    fn position(&self) -> Vec2;

    /// Diameter.
    fn size(&self) -> f32;

    fn kind(&self) -> EntityKind;

    #[inline]
    fn radius(&self) -> f32 {
        self.size() / 2.0
    }

    /// Snapshot for the spatial index.
    #[inline]
    fn quad_item(&self) -> QuadItem {
        let pos = self.position();
        QuadItem::new(self.id(), pos.x, pos.y, self.kind())
    }
}

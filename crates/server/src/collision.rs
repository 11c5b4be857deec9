//! Collision detection and resolution.
//!
//! Applies a player's requested position and lets it eat every pellet it
//! now overlaps.

use crate::entity::Entity;
use crate::world::World;
use glam::Vec2;
use protocol::EntityId;

/// Result of checking overlap between two circles.
#[derive(Debug, Clone, Copy)]
pub struct CollisionResult {
    /// Sum of both radii.
    pub r: f32,
    /// Distance between centres.
    pub d: f32,
}

impl CollisionResult {
    /// Check if the circles actually overlap.
    #[inline]
    pub fn is_colliding(&self) -> bool {
        self.d < self.r
    }
}

/// Check overlap between two circles given by centre and diameter.
#[inline]
pub fn check_collision(pos: Vec2, size: f32, other_pos: Vec2, other_size: f32) -> CollisionResult {
    CollisionResult {
        r: (size + other_size) / 2.0,
        d: pos.distance(other_pos),
    }
}

/// What a resolved move did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveOutcome {
    /// Whether the clamped position differs from the previous one.
    pub moved: bool,
    /// Pellets eaten, in the order they were consumed.
    pub eaten: Vec<EntityId>,
}

/// Move a player and consume overlapping pellets.
///
/// Candidates come from the spatial index, which may be up to one tick old;
/// pellets already gone from the world are skipped. Overlapping pellets are
/// eaten in ascending id order and each adds `size_increment`.
/// Returns `None` if the player does not exist.
pub fn resolve_move(
    world: &mut World,
    player_id: EntityId,
    target: Vec2,
    size_increment: f32,
) -> Option<MoveOutcome> {
    let moved = world.set_player_position(player_id, target)?;
    let player = world.player(player_id)?;
    let center = player.position();

    let mut candidates: Vec<EntityId> = world
        .index
        .query(center.x, center.y, player.radius())
        .into_iter()
        .filter(|item| item.is_pellet())
        .map(|item| item.id)
        .collect();
    candidates.sort_unstable();

    let mut outcome = MoveOutcome {
        moved,
        eaten: Vec::new(),
    };
    for pellet_id in candidates {
        let (Some(player), Some(pellet)) = (world.player(player_id), world.pellet(pellet_id)) else {
            continue;
        };
        let hit = check_collision(center, player.size(), pellet.position(), pellet.size());
        if hit.is_colliding() {
            world.grow_player(player_id, size_increment);
            world.remove_pellet(pellet_id);
            outcome.eaten.push(pellet_id);
        }
    }

    Some(outcome)
}

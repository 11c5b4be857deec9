//! World state management.
//!
//! Owns every player and pellet, the per-tick change markers and the
//! spatial index derived from them.

use crate::config::WorldConfig;
use crate::entity::{Entity, Pellet, Player};
use crate::spatial::QuadTree;
use glam::Vec2;
use protocol::{EntityId, WorldSize};
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// World border. The playable area spans `[0, width] x [0, height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBorder {
    pub width: f32,
    pub height: f32,
}

impl WorldBorder {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Clamp a point so a circle of `radius` around it stays inside.
    #[inline]
    pub fn clamp(&self, pos: Vec2, radius: f32) -> Vec2 {
        Vec2::new(
            clamp_axis(pos.x, radius, self.width),
            clamp_axis(pos.y, radius, self.height),
        )
    }

    /// Get a random position whose `radius` circle fits inside the border.
    #[inline]
    pub fn random_position<R: Rng>(&self, rng: &mut R, radius: f32) -> Vec2 {
        Vec2::new(
            random_axis(rng, radius, self.width),
            random_axis(rng, radius, self.height),
        )
    }

    pub fn size(&self) -> WorldSize {
        WorldSize {
            width: self.width,
            height: self.height,
        }
    }
}

#[inline]
fn clamp_axis(value: f32, radius: f32, extent: f32) -> f32 {
    let (lo, hi) = (radius, extent - radius);
    if lo > hi || value.is_nan() {
        return extent / 2.0;
    }
    value.clamp(lo, hi)
}

#[inline]
fn random_axis<R: Rng>(rng: &mut R, radius: f32, extent: f32) -> f32 {
    let (lo, hi) = (radius, extent - radius);
    if lo >= hi {
        return extent / 2.0;
    }
    rng.random_range(lo..=hi)
}

/// Entities touched since the last tick finished broadcasting.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub players: HashSet<EntityId>,
    pub pellets: HashSet<EntityId>,
}

impl ChangeSet {
    pub fn clear(&mut self) {
        self.players.clear();
        self.pellets.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.pellets.is_empty()
    }
}

/// The game world containing all entities.
#[derive(Debug)]
pub struct World {
    /// Next entity ID to assign. Players and pellets share the sequence.
    next_entity_id: EntityId,

    players: HashMap<EntityId, Player>,
    pellets: HashMap<EntityId, Pellet>,

    pub border: WorldBorder,

    /// Entities changed this tick.
    pub changes: ChangeSet,

    /// QuadTree over players and pellets as of the last rebuild.
    pub index: QuadTree,
}

impl World {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            next_entity_id: 1,
            players: HashMap::with_capacity(64),
            pellets: HashMap::with_capacity(512),
            border: WorldBorder::new(config.width, config.height),
            changes: ChangeSet::default(),
            index: QuadTree::for_world(
                config.width,
                config.height,
                config.index_capacity,
                config.index_max_depth,
            ),
        }
    }

    /// Get the next entity ID.
    pub fn next_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1);
        if self.next_entity_id == 0 {
            self.next_entity_id = 1; // Skip 0
        }
        id
    }

    #[inline]
    pub fn player(&self, id: EntityId) -> Option<&Player> {
        self.players.get(&id)
    }

    #[inline]
    pub fn pellet(&self, id: EntityId) -> Option<&Pellet> {
        self.pellets.get(&id)
    }

    #[inline]
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    #[inline]
    pub fn pellets(&self) -> impl Iterator<Item = &Pellet> {
        self.pellets.values()
    }

    #[inline]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    #[inline]
    pub fn pellet_count(&self) -> usize {
        self.pellets.len()
    }

    /// Add a player, clamped into the border, and mark it changed.
    pub fn add_player(&mut self, mut player: Player) -> EntityId {
        player.position = self.border.clamp(player.position, player.radius());
        let id = player.id();
        self.players.insert(id, player);
        self.changes.players.insert(id);
        id
    }

    /// Remove a player and mark it changed so viewers drop it.
    pub fn remove_player(&mut self, id: EntityId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        self.changes.players.insert(id);
        Some(player)
    }

    /// Add a pellet, clamped into the border, and mark it changed.
    pub fn add_pellet(&mut self, position: Vec2, size: f32) -> EntityId {
        let id = self.next_id();
        let position = self.border.clamp(position, size / 2.0);
        self.pellets.insert(id, Pellet::new(id, position, size));
        self.changes.pellets.insert(id);
        id
    }

    /// Remove a pellet and mark it changed so viewers drop it.
    pub fn remove_pellet(&mut self, id: EntityId) -> Option<Pellet> {
        let pellet = self.pellets.remove(&id)?;
        self.changes.pellets.insert(id);
        Some(pellet)
    }

    /// Move a player, clamped to the border for its current size.
    ///
    /// Returns `None` for an unknown player, otherwise whether the stored
    /// position changed. A change marks the player.
    pub fn set_player_position(&mut self, id: EntityId, target: Vec2) -> Option<bool> {
        let border = self.border;
        let player = self.players.get_mut(&id)?;
        let clamped = border.clamp(target, player.radius());
        if clamped == player.position {
            return Some(false);
        }
        player.position = clamped;
        self.changes.players.insert(id);
        Some(true)
    }

    /// Grow a player and mark it changed. Returns the new size.
    ///
    /// The position is re-clamped for the larger radius.
    pub fn grow_player(&mut self, id: EntityId, amount: f32) -> Option<f32> {
        let border = self.border;
        let player = self.players.get_mut(&id)?;
        player.grow(amount);
        player.position = border.clamp(player.position, player.radius());
        self.changes.players.insert(id);
        Some(player.size())
    }

    /// Rebuild the QuadTree from scratch: pellets first, then players.
    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for pellet in self.pellets.values() {
            self.index.insert(pellet.quad_item());
        }
        for player in self.players.values() {
            self.index.insert(player.quad_item());
        }
    }
}

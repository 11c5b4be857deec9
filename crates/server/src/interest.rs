//! Interest management.
//!
//! Remembers which entities each client has been told about and turns the
//! tick's change markers into the smallest message that brings its view up
//! to date.

use crate::entity::Entity;
use crate::world::World;
use protocol::{EntityId, PelletView, PlayerView, ServerMessage, WorldSize};
use std::collections::{HashMap, HashSet};

/// What one client has been sent so far.
#[derive(Debug, Default, Clone)]
pub struct KnownSet {
    /// Last record sent for each visible player.
    pub players: HashMap<EntityId, PlayerView>,
    pub pellets: HashSet<EntityId>,
}

impl KnownSet {
    #[inline]
    pub fn knows_player(&self, id: EntityId) -> bool {
        self.players.contains_key(&id)
    }
}

/// Full view sent once on join.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    pub players: HashMap<EntityId, PlayerView>,
    pub pellets: HashMap<EntityId, PelletView>,
}

impl Snapshot {
    pub fn into_message(self, id: EntityId, world_size: WorldSize) -> ServerMessage {
        ServerMessage::Joined {
            id,
            players: self.players,
            pellets: self.pellets,
            world_size,
        }
    }
}

/// Changes to one client's view for one broadcast.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Delta {
    pub players: HashMap<EntityId, PlayerView>,
    pub pellets: HashMap<EntityId, PelletView>,
    pub removed_players: Vec<EntityId>,
    pub removed_pellets: Vec<EntityId>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
            && self.pellets.is_empty()
            && self.removed_players.is_empty()
            && self.removed_pellets.is_empty()
    }

    pub fn into_message(self) -> ServerMessage {
        ServerMessage::GameState {
            players: self.players,
            pellets: self.pellets,
            removed_players: self.removed_players,
            removed_pellets: self.removed_pellets,
        }
    }
}

/// Per-client visibility bookkeeping, keyed by the viewer's player id.
#[derive(Debug)]
pub struct InterestTracker {
    render_distance: f32,
    clients: HashMap<EntityId, KnownSet>,
}

impl InterestTracker {
    pub fn new(render_distance: f32) -> Self {
        Self {
            render_distance,
            clients: HashMap::new(),
        }
    }

    #[inline]
    pub fn render_distance(&self) -> f32 {
        self.render_distance
    }

    /// Known ids for a viewer.
    pub fn known(&self, viewer: EntityId) -> Option<&KnownSet> {
        self.clients.get(&viewer)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Forget a viewer entirely.
    pub fn remove(&mut self, viewer: EntityId) -> Option<KnownSet> {
        self.clients.remove(&viewer)
    }

    /// Build the join snapshot and seed the viewer's known sets with exactly
    /// its contents. Players are filtered by exact distance, pellets by the
    /// index's square window. Returns `None` if the viewer is not in the world.
    pub fn snapshot(&mut self, viewer: EntityId, world: &World) -> Option<Snapshot> {
        let center = world.player(viewer)?.position();
        let range = self.render_distance;

        let players: HashMap<_, _> = world
            .players()
            .filter(|p| p.position().distance(center) <= range)
            .map(|p| (p.id(), p.to_view()))
            .collect();

        let pellets: HashMap<_, _> = world
            .index
            .query(center.x, center.y, range)
            .into_iter()
            .filter(|item| item.is_pellet())
            .filter_map(|item| world.pellet(item.id))
            .map(|p| (p.id(), p.to_view()))
            .collect();

        let known = KnownSet {
            players: players.clone(),
            pellets: pellets.keys().copied().collect(),
        };
        self.clients.insert(viewer, known);

        Some(Snapshot { players, pellets })
    }

    /// Compute what `viewer` needs to hear about this tick and update its
    /// known sets accordingly. Returns `None` if the viewer has no entry or
    /// is no longer in the world.
    pub fn compute_delta(&mut self, viewer: EntityId, world: &World) -> Option<Delta> {
        let center = world.player(viewer)?.position();
        let known = self.clients.get_mut(&viewer)?;
        let range = self.render_distance;
        let mut delta = Delta::default();

        for &id in &world.changes.players {
            match world.player(id) {
                Some(other) if other.position().distance(center) <= range => {
                    // Skip records the client already holds, e.g. after a
                    // move was pushed out of cycle earlier this tick.
                    let view = other.to_view();
                    if known.players.get(&id) != Some(&view) {
                        delta.players.insert(id, view.clone());
                        known.players.insert(id, view);
                    }
                }
                _ => {
                    if known.players.remove(&id).is_some() {
                        delta.removed_players.push(id);
                    }
                }
            }
        }

        // Pellets never change once spawned, so a known pellet is never resent.
        for item in world.index.query(center.x, center.y, range) {
            if !item.is_pellet() || known.pellets.contains(&item.id) {
                continue;
            }
            if let Some(pellet) = world.pellet(item.id) {
                delta.pellets.insert(item.id, pellet.to_view());
                known.pellets.insert(item.id);
            }
        }

        for &id in &world.changes.pellets {
            if world.pellet(id).is_none() && known.pellets.remove(&id) {
                delta.removed_pellets.push(id);
            }
        }

        delta.removed_players.sort_unstable();
        delta.removed_pellets.sort_unstable();
        Some(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::entity::Player;
    use glam::Vec2;
    use protocol::Color;

    fn world() -> World {
        World::new(&WorldConfig::default())
    }

    fn add_player(world: &mut World, x: f32, y: f32) -> EntityId {
        let id = world.next_id();
        world.add_player(Player::new(id, Vec2::new(x, y), 50.0, format!("p{id}"), Color::default()))
    }

    /// Rebuild, compute and clear, the way one tick does for a single viewer.
    fn tick(tracker: &mut InterestTracker, viewer: EntityId, world: &mut World) -> Delta {
        world.rebuild_index();
        let delta = tracker.compute_delta(viewer, world).unwrap();
        world.changes.clear();
        delta
    }

    #[test]
    fn test_snapshot_excludes_distant_pellet() {
        let mut world = world();
        let viewer = add_player(&mut world, 100.0, 100.0);
        let near = world.add_pellet(Vec2::new(300.0, 300.0), 10.0);
        let far = world.add_pellet(Vec2::new(3000.0, 3000.0), 10.0);
        world.rebuild_index();

        let mut tracker = InterestTracker::new(1000.0);
        let snapshot = tracker.snapshot(viewer, &world).unwrap();

        assert!(snapshot.pellets.contains_key(&near));
        assert!(!snapshot.pellets.contains_key(&far));
        assert!(snapshot.players.contains_key(&viewer));

        let known = tracker.known(viewer).unwrap();
        assert_eq!(known.pellets, HashSet::from([near]));
        assert_eq!(known.players.keys().copied().collect::<Vec<_>>(), vec![viewer]);
    }

    #[test]
    fn test_snapshot_players_use_exact_distance() {
        let mut world = world();
        let viewer = add_player(&mut world, 100.0, 100.0);
        let inside = add_player(&mut world, 800.0, 800.0); // ~990
        let corner = add_player(&mut world, 900.0, 900.0); // ~1131
        world.rebuild_index();

        let mut tracker = InterestTracker::new(1000.0);
        let snapshot = tracker.snapshot(viewer, &world).unwrap();
        assert!(snapshot.players.contains_key(&inside));
        assert!(!snapshot.players.contains_key(&corner));
    }

    #[test]
    fn test_unchanged_view_yields_empty_delta() {
        let mut world = world();
        let viewer = add_player(&mut world, 500.0, 500.0);
        world.add_pellet(Vec2::new(600.0, 600.0), 10.0);
        world.rebuild_index();

        let mut tracker = InterestTracker::new(1000.0);
        tracker.snapshot(viewer, &world).unwrap();
        world.changes.clear();

        assert!(tick(&mut tracker, viewer, &mut world).is_empty());
        assert!(tick(&mut tracker, viewer, &mut world).is_empty());
    }

    #[test]
    fn test_new_pellet_sent_once() {
        let mut world = world();
        let viewer = add_player(&mut world, 500.0, 500.0);
        world.rebuild_index();
        let mut tracker = InterestTracker::new(1000.0);
        tracker.snapshot(viewer, &world).unwrap();
        world.changes.clear();

        let pellet = world.add_pellet(Vec2::new(700.0, 500.0), 10.0);
        let first = tick(&mut tracker, viewer, &mut world);
        assert_eq!(first.pellets.keys().copied().collect::<Vec<_>>(), vec![pellet]);

        // Walk away and back: the pellet stays known and is not resent.
        world.set_player_position(viewer, Vec2::new(1900.0, 1900.0));
        let away = tick(&mut tracker, viewer, &mut world);
        assert!(away.pellets.is_empty());
        assert!(away.removed_pellets.is_empty());
        world.set_player_position(viewer, Vec2::new(500.0, 500.0));
        let back = tick(&mut tracker, viewer, &mut world);
        assert!(back.pellets.is_empty());
    }

    #[test]
    fn test_eaten_pellet_removed_only_for_knowers() {
        let mut world = world();
        let viewer = add_player(&mut world, 500.0, 500.0);
        let pellet = world.add_pellet(Vec2::new(520.0, 500.0), 10.0);
        let unseen = world.add_pellet(Vec2::new(1900.0, 1900.0), 10.0);
        world.rebuild_index();
        let mut tracker = InterestTracker::new(1000.0);
        tracker.snapshot(viewer, &world).unwrap();
        world.changes.clear();

        world.remove_pellet(pellet);
        world.remove_pellet(unseen);
        let delta = tracker.compute_delta(viewer, &world).unwrap();
        assert_eq!(delta.removed_pellets, vec![pellet]);
        assert!(!tracker.known(viewer).unwrap().pellets.contains(&pellet));
    }

    #[test]
    fn test_player_leaving_range_is_removed() {
        let mut world = world();
        let viewer = add_player(&mut world, 500.0, 500.0);
        let other = add_player(&mut world, 600.0, 500.0);
        world.rebuild_index();
        let mut tracker = InterestTracker::new(1000.0);
        tracker.snapshot(viewer, &world).unwrap();
        world.changes.clear();

        world.set_player_position(other, Vec2::new(1800.0, 1800.0));
        let delta = tick(&mut tracker, viewer, &mut world);
        assert_eq!(delta.removed_players, vec![other]);
        assert!(delta.players.is_empty());

        // Further moves out of range are not news.
        world.set_player_position(other, Vec2::new(1850.0, 1850.0));
        assert!(tick(&mut tracker, viewer, &mut world).is_empty());

        // Coming back in range re-adds it.
        world.set_player_position(other, Vec2::new(700.0, 700.0));
        let delta = tick(&mut tracker, viewer, &mut world);
        assert_eq!(delta.players[&other].x, 700.0);
    }

    #[test]
    fn test_departed_player_removed_exactly_once() {
        let mut world = world();
        let viewer = add_player(&mut world, 500.0, 500.0);
        let other = add_player(&mut world, 600.0, 600.0);
        world.rebuild_index();
        let mut tracker = InterestTracker::new(1000.0);
        tracker.snapshot(viewer, &world).unwrap();
        tracker.snapshot(other, &world).unwrap();
        world.changes.clear();

        world.remove_player(other);
        tracker.remove(other);

        let first = tracker.compute_delta(viewer, &world).unwrap();
        assert_eq!(first.removed_players, vec![other]);
        let second = tracker.compute_delta(viewer, &world).unwrap();
        assert!(second.removed_players.is_empty());
        assert!(tracker.compute_delta(other, &world).is_none());
    }

    #[test]
    fn test_moved_known_player_is_resent() {
        let mut world = world();
        let viewer = add_player(&mut world, 500.0, 500.0);
        let other = add_player(&mut world, 600.0, 500.0);
        world.rebuild_index();
        let mut tracker = InterestTracker::new(1000.0);
        tracker.snapshot(viewer, &world).unwrap();
        world.changes.clear();

        world.set_player_position(other, Vec2::new(650.0, 500.0));
        let delta = tick(&mut tracker, viewer, &mut world);
        assert_eq!(delta.players.len(), 1);
        assert_eq!(delta.players[&other].x, 650.0);
    }

    #[test]
    fn test_player_already_sent_this_tick_is_skipped() {
        let mut world = world();
        let viewer = add_player(&mut world, 500.0, 500.0);
        let other = add_player(&mut world, 600.0, 500.0);
        world.rebuild_index();
        let mut tracker = InterestTracker::new(1000.0);
        tracker.snapshot(viewer, &world).unwrap();
        world.changes.clear();

        world.set_player_position(other, Vec2::new(650.0, 500.0));
        let pushed = tracker.compute_delta(viewer, &world).unwrap();
        assert_eq!(pushed.players[&other].x, 650.0);

        // Still marked changed at the tick, but the client holds this record.
        assert!(world.changes.players.contains(&other));
        assert!(tick(&mut tracker, viewer, &mut world).is_empty());
    }
}

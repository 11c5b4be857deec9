//! Pellet population upkeep.

use crate::config::PelletConfig;
use crate::entity::Entity;
use crate::world::World;
use glam::Vec2;
use rand::Rng;
use tracing::debug;

/// Outcome of one spawn batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnReport {
    /// Pellets created.
    pub spawned: usize,
    /// Pellets placed at their last candidate after every attempt was crowded.
    pub crowded: usize,
}

/// Tops the pellet population up towards its cap in spaced-out batches.
#[derive(Debug, Clone)]
pub struct PelletSpawner {
    size: f32,
    max_amount: usize,
    spawn_amount: usize,
    min_distance: f32,
    attempts: u32,
}

impl PelletSpawner {
    pub fn new(config: &PelletConfig) -> Self {
        Self {
            size: config.size,
            max_amount: config.max_amount,
            spawn_amount: config.spawn_amount,
            min_distance: config.min_spawn_distance,
            attempts: config.spawn_attempts.max(1),
        }
    }

    /// Spawn one batch using the thread-local RNG.
    pub fn spawn_batch(&self, world: &mut World) -> SpawnReport {
        self.spawn_batch_with(world, &mut rand::rng())
    }

    /// Spawn one batch.
    ///
    /// Each pellet is inserted into the index right away so later candidates
    /// in the same batch keep their distance from it.
    pub fn spawn_batch_with<R: Rng>(&self, world: &mut World, rng: &mut R) -> SpawnReport {
        let current = world.pellet_count();
        let mut report = SpawnReport::default();
        if current >= self.max_amount {
            return report;
        }

        let count = self.spawn_amount.min(self.max_amount - current);
        for _ in 0..count {
            let (position, clear) = self.pick_position(world, rng);
            if !clear {
                report.crowded += 1;
            }

            let id = world.add_pellet(position, self.size);
            if let Some(item) = world.pellet(id).map(Entity::quad_item) {
                world.index.insert(item);
            }
            report.spawned += 1;
        }

        debug!(
            "Spawned {} pellets ({} crowded), {} alive",
            report.spawned,
            report.crowded,
            world.pellet_count()
        );
        report
    }

    /// Try random candidates until one has nothing indexed within the minimum
    /// distance. Falls back to the last candidate.
    fn pick_position<R: Rng>(&self, world: &World, rng: &mut R) -> (Vec2, bool) {
        let radius = self.size / 2.0;
        let mut candidate = world.border.random_position(rng, radius);
        for attempt in 1..=self.attempts {
            if attempt > 1 {
                candidate = world.border.random_position(rng, radius);
            }
            if world.index.query(candidate.x, candidate.y, self.min_distance).is_empty() {
                return (candidate, true);
            }
        }
        (candidate, false)
    }
}

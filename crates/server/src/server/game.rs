//! Game state and main loop.

use crate::collision::resolve_move;
use crate::config::Config;
use crate::entity::{Entity, Player};
use crate::interest::InterestTracker;
use crate::spawner::{PelletSpawner, SpawnReport};
use crate::world::World;
use futures_util::FutureExt;
use glam::Vec2;
use protocol::{ClientMessage, Color, EntityId, ServerMessage};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::client::{ClientId, Sessions};

/// Game state shared between the tick loop and connection handlers.
pub type SharedGame = Arc<RwLock<GameState>>;

/// Colors handed out to joining players.
pub const PLAYER_COLORS: [Color; 6] = [
    Color::new(0xFF, 0x57, 0x33),
    Color::new(0x33, 0xFF, 0x57),
    Color::new(0x33, 0x57, 0xFF),
    Color::new(0xF3, 0xFF, 0x33),
    Color::new(0xFF, 0x33, 0xF3),
    Color::new(0x33, 0xFF, 0xF3),
];

/// Main game state.
pub struct GameState {
    pub config: Config,
    pub tick_count: u64,

    // Game world (entities)
    pub world: World,

    // Per-client visibility
    pub interest: InterestTracker,

    // Connected clients
    pub sessions: Sessions,

    spawner: PelletSpawner,
    spawn_every_ticks: u64,

    // Average tick duration in milliseconds (exponential moving average).
    pub update_time_avg: f64,
}

impl GameState {
    /// Create a new game state. The world starts empty; see [`GameState::spawn_pellets`].
    pub fn new(config: &Config) -> Self {
        let tick_ms = config.server.tick_interval_ms.max(1);
        Self {
            config: config.clone(),
            tick_count: 0,
            world: World::new(&config.world),
            interest: InterestTracker::new(config.world.render_distance),
            sessions: Sessions::new(),
            spawner: PelletSpawner::new(&config.pellet),
            spawn_every_ticks: config.pellet.spawn_interval_ms.div_ceil(tick_ms).max(1),
            update_time_avg: 0.0,
        }
    }

    /// Register a connection. Returns `None` when the server is full.
    pub fn add_client(&mut self, addr: SocketAddr, outbound: mpsc::Sender<ServerMessage>) -> Option<ClientId> {
        if self.sessions.len() >= self.config.server.max_connections {
            warn!("Connection rejected (limit reached): {}", addr);
            return None;
        }
        let id = self.sessions.add(addr, outbound);
        info!("Client {} connected from {}", id, addr);
        Some(id)
    }

    /// Remove a client and its player, then tell everyone who could see it.
    pub fn remove_client(&mut self, id: ClientId) {
        let Some(client) = self.sessions.remove(id) else {
            return;
        };
        info!(
            "Client {} ({}) disconnected after {:.1}s",
            id,
            client.addr,
            client.session_duration().as_secs_f32()
        );

        if let Some(player_id) = client.player_id {
            self.world.remove_player(player_id);
            self.interest.remove(player_id);
            self.broadcast_all();
        }
    }

    /// Handle a text message from a client. Anything unparseable is ignored.
    pub fn handle_message(&mut self, client_id: ClientId, text: &str) {
        match ClientMessage::parse(text) {
            Ok(ClientMessage::Join { username }) => self.handle_join(client_id, &username),
            Ok(ClientMessage::Move { x, y }) => self.handle_move(client_id, Vec2::new(x, y)),
            Err(e) => debug!("Ignoring message from client {}: {}", client_id, e),
        }
    }

    /// Create a player for the client and send it the join snapshot.
    fn handle_join(&mut self, client_id: ClientId, username: &str) {
        let Some(client) = self.sessions.get(client_id) else {
            return;
        };
        if let Some(existing) = client.player_id {
            debug!("Client {} already joined as player {}", client_id, existing);
            return;
        }

        let username = sanitize_username(username, self.config.player.max_username_length);
        let start_size = self.config.player.start_size;
        let mut rng = rand::rng();
        let position = self.world.border.random_position(&mut rng, start_size / 2.0);
        let color = random_color(&mut rng);

        let player_id = self.world.next_id();
        self.world
            .add_player(Player::new(player_id, position, start_size, username.clone(), color));
        self.sessions.bind_player(client_id, player_id);
        info!(
            "Client {} joined as \"{}\" (player {}) at ({:.0}, {:.0})",
            client_id, username, player_id, position.x, position.y
        );

        let world_size = self.world.border.size();
        let Some(snapshot) = self.interest.snapshot(player_id, &self.world) else {
            return;
        };
        if let Some(client) = self.sessions.get(client_id) {
            client.send(snapshot.into_message(player_id, world_size));
        }
    }

    /// Apply a move, then push fresh deltas to everyone near the mover.
    fn handle_move(&mut self, client_id: ClientId, target: Vec2) {
        let Some(player_id) = self.sessions.get(client_id).and_then(|c| c.player_id) else {
            return;
        };
        let increment = self.config.player.size_increment;
        let Some(outcome) = resolve_move(&mut self.world, player_id, target, increment) else {
            return;
        };
        if !outcome.eaten.is_empty() {
            debug!("Player {} ate {} pellets", player_id, outcome.eaten.len());
        }
        self.broadcast_near(player_id);
    }

    /// Send a viewer its delta if there is anything in it.
    fn send_delta(&mut self, viewer: EntityId) -> bool {
        let Some(delta) = self.interest.compute_delta(viewer, &self.world) else {
            return false;
        };
        if delta.is_empty() {
            return false;
        }
        match self.sessions.by_player(viewer) {
            Some(client) => client.send(delta.into_message()),
            None => false,
        }
    }

    /// Send deltas to every joined client within render distance of `source`.
    fn broadcast_near(&mut self, source: EntityId) {
        let Some(center) = self.world.player(source).map(Entity::position) else {
            return;
        };
        let range = self.interest.render_distance();
        let viewers: Vec<EntityId> = self
            .sessions
            .players()
            .filter(|&id| {
                self.world
                    .player(id)
                    .is_some_and(|p| p.position().distance(center) <= range)
            })
            .collect();
        for viewer in viewers {
            self.send_delta(viewer);
        }
    }

    /// Send deltas to every joined client.
    fn broadcast_all(&mut self) {
        let viewers: Vec<EntityId> = self.sessions.players().collect();
        for viewer in viewers {
            self.send_delta(viewer);
        }
    }

    /// Run one pellet spawn batch against the current index.
    pub fn spawn_pellets(&mut self) -> SpawnReport {
        self.spawner.spawn_batch(&mut self.world)
    }

    /// Run one simulation tick.
    pub fn tick(&mut self) {
        self.tick_count += 1;

        self.world.rebuild_index();

        if self.tick_count % self.spawn_every_ticks == 0 {
            self.spawn_pellets();
        }

        self.broadcast_all();

        self.world.changes.clear();
    }
}

/// Trim and cap a display name.
fn sanitize_username(raw: &str, max_len: usize) -> String {
    let name: String = raw.trim().chars().take(max_len).collect();
    if name.is_empty() {
        "Anonymous".to_string()
    } else {
        name
    }
}

/// Pick a player color from the palette.
fn random_color<R: Rng>(rng: &mut R) -> Color {
    PLAYER_COLORS.choose(rng).copied().unwrap_or_default()
}

/// Run the main game loop.
pub async fn run_game_loop(state: SharedGame, tick_interval_ms: u64) {
    let tick_interval_ms = tick_interval_ms.max(1);
    let start = Instant::now() + Duration::from_millis(tick_interval_ms);
    let mut ticker = interval_at(start, Duration::from_millis(tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Initial spawn
    {
        let mut game = state.write().await;
        info!("Initial world spawn...");
        let report = game.spawn_pellets();
        info!("World initialized: {} pellets", report.spawned);
    }

    loop {
        let scheduled = ticker.tick().await;

        // Drain any backlog so the tick we run is the most recent one.
        let mut skipped = 0u32;
        while ticker.tick().now_or_never().is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            debug!(
                "Skipped {} ticks to stay current (lag: {:?})",
                skipped,
                Instant::now().saturating_duration_since(scheduled)
            );
        }

        let mut game = state.write().await;
        let tick_start = std::time::Instant::now();
        game.tick();
        let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;

        game.update_time_avg = game.update_time_avg * 0.5 + tick_ms * 0.5;

        let tick_budget = tick_interval_ms as f64 * 0.9;
        if tick_ms > tick_budget {
            warn!(
                "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} clients, {} players, {} pellets",
                game.tick_count,
                tick_ms,
                tick_budget,
                game.sessions.len(),
                game.world.player_count(),
                game.world.pellet_count()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::mpsc::Receiver;

    /// Quiet config: no pellet spawning unless a test asks for it.
    fn config() -> Config {
        let mut config = Config::default();
        config.pellet.max_amount = 0;
        config
    }

    fn connect(game: &mut GameState, port: u16) -> (ClientId, Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        (game.add_client(addr, tx).unwrap(), rx)
    }

    fn join(game: &mut GameState, client: ClientId, name: &str) -> EntityId {
        game.handle_message(client, &format!(r#"{{"type":"join","username":"{name}"}}"#));
        game.sessions.get(client).unwrap().player_id.unwrap()
    }

    fn place(game: &mut GameState, player: EntityId, x: f32, y: f32) {
        game.world.set_player_position(player, Vec2::new(x, y)).unwrap();
    }

    fn drain(rx: &mut Receiver<ServerMessage>) -> Vec<ServerMessage> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn removed_players(messages: &[ServerMessage]) -> Vec<EntityId> {
        messages
            .iter()
            .flat_map(|m| match m {
                ServerMessage::GameState { removed_players, .. } => removed_players.clone(),
                _ => Vec::new(),
            })
            .collect()
    }

    #[test]
    fn test_join_sends_snapshot() {
        let mut game = GameState::new(&config());
        let (client, mut rx) = connect(&mut game, 5000);
        let player = join(&mut game, client, "  alice  ");

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        let ServerMessage::Joined { id, players, world_size, .. } = &messages[0] else {
            panic!("expected joined, got {:?}", messages[0]);
        };
        assert_eq!(*id, player);
        assert_eq!(players[&player].username, "alice");
        assert_eq!(players[&player].size, 50.0);
        assert!(PLAYER_COLORS.contains(&players[&player].color));
        assert_eq!(world_size.width, 2000.0);

        let p = game.world.player(player).unwrap();
        assert!(p.position().x >= 25.0 && p.position().x <= 1975.0);
    }

    #[test]
    fn test_second_join_is_ignored() {
        let mut game = GameState::new(&config());
        let (client, mut rx) = connect(&mut game, 5000);
        let first = join(&mut game, client, "a");
        let again = join(&mut game, client, "b");

        assert_eq!(first, again);
        assert_eq!(game.world.player_count(), 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_malformed_and_premature_messages_ignored() {
        let mut game = GameState::new(&config());
        let (client, mut rx) = connect(&mut game, 5000);

        game.handle_message(client, "{not json");
        game.handle_message(client, r#"{"type":"dance"}"#);
        game.handle_message(client, r#"{"type":"move","x":5,"y":5}"#);
        game.handle_message(9999, r#"{"type":"join","username":"ghost"}"#);

        assert!(drain(&mut rx).is_empty());
        assert_eq!(game.world.player_count(), 0);
    }

    #[test]
    fn test_move_eats_and_notifies_nearby() {
        let mut game = GameState::new(&config());
        let (a, mut rx_a) = connect(&mut game, 5000);
        let (b, mut rx_b) = connect(&mut game, 5001);
        let (c, mut rx_c) = connect(&mut game, 5002);
        let player_a = join(&mut game, a, "a");
        let player_b = join(&mut game, b, "b");
        let player_c = join(&mut game, c, "c");
        place(&mut game, player_a, 500.0, 500.0);
        place(&mut game, player_b, 800.0, 800.0);
        place(&mut game, player_c, 1950.0, 1950.0);
        let pellet = game.world.add_pellet(Vec2::new(505.0, 505.0), 10.0);
        game.tick();
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);
        assert!(game.interest.known(player_b).unwrap().pellets.contains(&pellet));

        game.handle_message(a, r#"{"type":"move","x":505,"y":505}"#);

        assert!(game.world.pellet(pellet).is_none());
        assert_eq!(game.world.player(player_a).unwrap().size(), 51.0);
        for rx in [&mut rx_a, &mut rx_b] {
            let messages = drain(rx);
            assert_eq!(messages.len(), 1);
            let ServerMessage::GameState { players, removed_pellets, .. } = &messages[0] else {
                panic!("expected gameState");
            };
            assert_eq!(removed_pellets, &vec![pellet]);
            assert_eq!(players[&player_a].size, 51.0);
        }
        // Out of range of the mover: nothing until the tick, and the tick has
        // nothing for it either since it never knew about the pellet or A.
        assert!(drain(&mut rx_c).is_empty());
        game.tick();
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn test_tick_after_move_does_not_repeat_mover() {
        let mut game = GameState::new(&config());
        let (a, mut rx_a) = connect(&mut game, 5000);
        let (b, mut rx_b) = connect(&mut game, 5001);
        let player_a = join(&mut game, a, "a");
        let player_b = join(&mut game, b, "b");
        place(&mut game, player_a, 500.0, 500.0);
        place(&mut game, player_b, 700.0, 500.0);
        game.tick();
        drain(&mut rx_a);
        drain(&mut rx_b);

        game.handle_message(a, r#"{"type":"move","x":520,"y":500}"#);
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);

        game.tick();
        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_idle_tick_sends_nothing() {
        let mut game = GameState::new(&config());
        let (a, mut rx_a) = connect(&mut game, 5000);
        join(&mut game, a, "a");
        game.tick();
        drain(&mut rx_a);

        for _ in 0..5 {
            game.tick();
        }
        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn test_disconnect_removes_player_once() {
        let mut game = GameState::new(&config());
        let (a, _rx_a) = connect(&mut game, 5000);
        let (b, mut rx_b) = connect(&mut game, 5001);
        let player_a = join(&mut game, a, "a");
        let player_b = join(&mut game, b, "b");
        place(&mut game, player_a, 900.0, 900.0);
        place(&mut game, player_b, 1000.0, 1000.0);
        game.tick();
        drain(&mut rx_b);
        assert!(game.interest.known(player_b).unwrap().knows_player(player_a));

        game.remove_client(a);
        game.tick();
        game.tick();

        assert_eq!(removed_players(&drain(&mut rx_b)), vec![player_a]);
        assert!(game.world.player(player_a).is_none());
        assert!(game.interest.known(player_a).is_none());
        assert!(game.sessions.by_player(player_a).is_none());
    }

    #[test]
    fn test_tick_spawns_within_cap_and_sends_each_pellet_once() {
        let mut config = Config::default();
        config.pellet.max_amount = 60;
        config.pellet.spawn_amount = 25;
        let mut game = GameState::new(&config);
        let (a, mut rx_a) = connect(&mut game, 5000);
        join(&mut game, a, "a");

        let mut seen = HashSet::new();
        for _ in 0..10 {
            game.tick();
            assert!(game.world.pellet_count() <= 60);
            for message in drain(&mut rx_a) {
                let (ServerMessage::GameState { pellets, .. } | ServerMessage::Joined { pellets, .. }) = message;
                for id in pellets.keys() {
                    assert!(seen.insert(*id), "pellet {id} sent twice");
                }
            }
        }
        assert_eq!(game.world.pellet_count(), 60);
    }

    #[test]
    fn test_spawn_cadence_follows_interval() {
        let mut config = Config::default();
        config.server.tick_interval_ms = 50;
        config.pellet.spawn_interval_ms = 120;
        config.pellet.spawn_amount = 1;
        let mut game = GameState::new(&config);

        for _ in 0..6 {
            game.tick();
        }
        // 120ms rounds up to every third tick.
        assert_eq!(game.world.pellet_count(), 2);
    }

    #[test]
    fn test_connection_limit() {
        let mut config = config();
        config.server.max_connections = 1;
        let mut game = GameState::new(&config);
        let (tx, _rx) = mpsc::channel(1);
        let (tx2, _rx2) = mpsc::channel(1);
        let addr = SocketAddr::from(([127, 0, 0, 1], 1));

        assert!(game.add_client(addr, tx).is_some());
        assert!(game.add_client(addr, tx2).is_none());
    }

    #[test]
    fn test_sanitize_username() {
        assert_eq!(sanitize_username("  bob ", 30), "bob");
        assert_eq!(sanitize_username("   ", 30), "Anonymous");
        assert_eq!(sanitize_username("abcdef", 3), "abc");
    }
}

//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Environment variable that overrides `server.port`.
pub const PORT_ENV: &str = "PORT";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub pellet: PelletConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults, then apply
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            default_config
        };
        config.apply_env_overrides(std::env::var(PORT_ENV).ok().as_deref());
        Ok(config)
    }

    /// Apply a `PORT` value if it parses.
    pub fn apply_env_overrides(&mut self, port: Option<&str>) {
        if let Some(raw) = port {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid {} value: {:?}", PORT_ENV, raw),
            }
        }
    }
}

/// Server networking and loop settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Maximum simultaneous connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Messages queued per client before further sends are dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    /// Directory holding the browser client build.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            tick_interval_ms: default_tick_interval(),
            max_connections: default_max_connections(),
            outbound_buffer: default_outbound_buffer(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_port() -> u16 {
    8000
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_tick_interval() -> u64 {
    50
}
fn default_max_connections() -> usize {
    500
}
fn default_outbound_buffer() -> usize {
    64
}
fn default_static_dir() -> String {
    "client/build".to_string()
}

/// World geometry and visibility.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    #[serde(default = "default_world_size")]
    pub width: f32,
    #[serde(default = "default_world_size")]
    pub height: f32,
    /// Radius around a player inside which entities are sent to it.
    #[serde(default = "default_render_distance")]
    pub render_distance: f32,
    /// Points per QuadTree region before it splits.
    #[serde(default = "default_index_capacity")]
    pub index_capacity: usize,
    /// Maximum QuadTree subdivision depth.
    #[serde(default = "default_index_max_depth")]
    pub index_max_depth: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_world_size(),
            height: default_world_size(),
            render_distance: default_render_distance(),
            index_capacity: default_index_capacity(),
            index_max_depth: default_index_max_depth(),
        }
    }
}

fn default_world_size() -> f32 {
    2000.0
}
fn default_render_distance() -> f32 {
    1000.0
}
fn default_index_capacity() -> usize {
    10
}
fn default_index_max_depth() -> u32 {
    8
}

/// Player configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_player_start_size")]
    pub start_size: f32,
    /// Growth per pellet eaten.
    #[serde(default = "default_size_increment")]
    pub size_increment: f32,
    #[serde(default = "default_max_username_length")]
    pub max_username_length: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start_size: default_player_start_size(),
            size_increment: default_size_increment(),
            max_username_length: default_max_username_length(),
        }
    }
}

fn default_player_start_size() -> f32 {
    50.0
}
fn default_size_increment() -> f32 {
    1.0
}
fn default_max_username_length() -> usize {
    30
}

/// Pellet population configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PelletConfig {
    #[serde(default = "default_pellet_size")]
    pub size: f32,
    /// Cap on live pellets.
    #[serde(default = "default_pellet_max_amount")]
    pub max_amount: usize,
    /// Pellets per spawn batch.
    #[serde(default = "default_pellet_spawn_amount")]
    pub spawn_amount: usize,
    /// Time between spawn batches, rounded to whole ticks (at least one).
    #[serde(default = "default_pellet_spawn_interval")]
    pub spawn_interval_ms: u64,
    /// Preferred clearance between a new pellet and anything indexed.
    #[serde(default = "default_min_spawn_distance")]
    pub min_spawn_distance: f32,
    /// Candidate positions tried before settling for the last one.
    #[serde(default = "default_spawn_attempts")]
    pub spawn_attempts: u32,
}

impl Default for PelletConfig {
    fn default() -> Self {
        Self {
            size: default_pellet_size(),
            max_amount: default_pellet_max_amount(),
            spawn_amount: default_pellet_spawn_amount(),
            spawn_interval_ms: default_pellet_spawn_interval(),
            min_spawn_distance: default_min_spawn_distance(),
            spawn_attempts: default_spawn_attempts(),
        }
    }
}

fn default_pellet_size() -> f32 {
    10.0
}
fn default_pellet_max_amount() -> usize {
    300
}
fn default_pellet_spawn_amount() -> usize {
    20
}
fn default_pellet_spawn_interval() -> u64 {
    50
}
fn default_min_spawn_distance() -> f32 {
    100.0
}
fn default_spawn_attempts() -> u32 {
    10
}

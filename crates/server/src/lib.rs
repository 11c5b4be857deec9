//! Blob arena game server library.
//!
//! The simulation core (spatial index, world, spawning, collisions and
//! interest management) plus the tick loop and WebSocket plumbing around it.

pub mod collision;
pub mod config;
pub mod entity;
pub mod interest;
pub mod server;
pub mod spatial;
pub mod spawner;
pub mod world;

// Re-export commonly used types
pub use config::Config;
pub use server::{Frame, GameState, SharedGame, run, run_game_loop, serve_connection, start_game};

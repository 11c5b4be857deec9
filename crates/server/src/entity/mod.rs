//! Game entities.
//!
//! Players and pellets, the two things that live in the world.

mod base;
mod pellet;
mod player;

pub use base::Entity;
pub use pellet::Pellet;
pub use player::Player;

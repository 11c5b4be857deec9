//! Shared protocol crate for blob-arena.
//!
//! This crate contains:
//! - Client -> server and server -> client message types
//! - Wire views of players and pellets
//! - Shared types (Color, Position)

mod error;
pub mod messages;

pub use error::ProtocolError;
pub use messages::{ClientMessage, PelletView, PlayerView, ServerMessage, WorldSize};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Identifier shared by players and pellets.
pub type EntityId = u32;

/// RGB color used for players. Travels as a `#RRGGBB` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#RRGGBB` string.
    pub fn from_hex(s: &str) -> Result<Self, ProtocolError> {
        let hex = s
            .strip_prefix('#')
            .filter(|h| h.len() == 6 && h.is_ascii())
            .ok_or_else(|| ProtocolError::InvalidColor(s.to_string()))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ProtocolError::InvalidColor(s.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Represents a 2D position using glam's Vec2.
pub type Position = glam::Vec2;

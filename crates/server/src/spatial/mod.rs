//! Spatial indexing utilities.
//!
//! Point QuadTree rebuilt from the authoritative world every tick.

mod quadtree;

pub use quadtree::{Bounds, EntityKind, QuadItem, QuadTree};

//! Chunk grid: maps world positions and chunk coordinates to chunk ids and back.
//!
//! # Invariants
//! - `chunk_to_coord(chunk_from_coord(c)) == c` for every in-grid coordinate,
//!   on every axis independently (axis counts need not be equal).
//! - Every function is pure; nothing here allocates state or takes a lock.
//!
//! The world is divided into `count.x * count.y * count.z` chunks of
//! `size` world units each. The per-axis [`ChunkOffset`] decides where the
//! logical origin `(0, 0, 0)` sits inside the grid.

mod config;
mod grid;

pub use config::{ChunkOffset, GridConfig};
pub use grid::{ChunkCoord, ChunkId};

pub fn crate_info() -> &'static str {
    "interest-grid v0.1.0"
}

use interest_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::config::GridConfig;

/// A signed 3D chunk coordinate, relative to the configured origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Squared Euclidean distance to another coordinate, in chunks.
    pub fn distance_squared(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dy * dy + dz * dz
    }
}

/// Linearized chunk identifier, always within `0..GridConfig::chunk_total()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub i64);

impl GridConfig {
    /// Chunk containing a world-space position.
    ///
    /// Each axis is divided by its chunk size and truncated toward zero.
    /// Non-finite components are rejected with [`Error::ChunkInvalid`].
    pub fn chunk_from_real(&self, x: f64, y: f64, z: f64) -> Result<ChunkId> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(Error::ChunkInvalid);
        }
        let [sx, sy, sz] = self.chunk_size();
        self.chunk_from_coord(ChunkCoord::new(
            (x / f64::from(sx)) as i32,
            (y / f64::from(sy)) as i32,
            (z / f64::from(sz)) as i32,
        ))
    }

    /// Same as [`chunk_from_real`](Self::chunk_from_real) for a glam vector.
    pub fn chunk_from_position(&self, position: glam::DVec3) -> Result<ChunkId> {
        self.chunk_from_real(position.x, position.y, position.z)
    }

    /// Linearize a chunk coordinate as `((z * ny) + y) * nx + x` over the
    /// grid-local (offset-applied) indices.
    pub fn chunk_from_coord(&self, coord: ChunkCoord) -> Result<ChunkId> {
        let [nx, ny, nz] = self.chunk_count().map(i64::from);
        let [ox, oy, oz] = self.chunk_offset();
        let [cx, cy, cz] = self.chunk_count();

        let x = i64::from(coord.x) + ox.origin(cx);
        let y = i64::from(coord.y) + oy.origin(cy);
        let z = i64::from(coord.z) + oz.origin(cz);

        if !(0..nx).contains(&x) || !(0..ny).contains(&y) || !(0..nz).contains(&z) {
            return Err(Error::ChunkInvalid);
        }

        let id = (z * ny + y) * nx + x;
        if !(0..self.chunk_total()).contains(&id) {
            return Err(Error::ChunkInvalid);
        }
        Ok(ChunkId(id))
    }

    /// Exact inverse of [`chunk_from_coord`](Self::chunk_from_coord).
    pub fn chunk_to_coord(&self, id: ChunkId) -> Result<ChunkCoord> {
        if !(0..self.chunk_total()).contains(&id.0) {
            return Err(Error::ChunkInvalid);
        }
        let [nx, ny, _] = self.chunk_count().map(i64::from);
        let [ox, oy, oz] = self.chunk_offset();
        let [cx, cy, cz] = self.chunk_count();

        let x = id.0 % nx;
        let y = (id.0 / nx) % ny;
        let z = id.0 / (nx * ny);

        // Every term is bounded by u16::MAX, so the narrowing cannot truncate.
        Ok(ChunkCoord::new(
            (x - ox.origin(cx)) as i32,
            (y - oy.origin(cy)) as i32,
            (z - oz.origin(cz)) as i32,
        ))
    }

    /// Every valid chunk within Euclidean distance `radius` of `center`.
    ///
    /// A discrete sphere, not a cube: a chunk is included when
    /// `dx² + dy² + dz² <= radius²`. Chunks falling outside the grid are
    /// silently dropped.
    pub fn chunk_sphere(&self, center: ChunkCoord, radius: u8) -> impl Iterator<Item = ChunkId> + '_ {
        let r = i32::from(radius);
        let r2 = i64::from(r * r);
        (-r..=r)
            .flat_map(move |dz| (-r..=r).flat_map(move |dy| (-r..=r).map(move |dx| (dx, dy, dz))))
            .map(move |(dx, dy, dz)| {
                ChunkCoord::new(
                    center.x.saturating_add(dx),
                    center.y.saturating_add(dy),
                    center.z.saturating_add(dz),
                )
            })
            .filter(move |coord| coord.distance_squared(center) <= r2)
            .filter_map(move |coord| self.chunk_from_coord(coord).ok())
    }
}

use serde::{Deserialize, Serialize};

/// Where the logical chunk-space origin sits on one axis of the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkOffset {
    /// Origin at the first chunk; valid coordinates are `0..count`.
    Begin,
    /// Origin at `count / 2`; the grid is centered around zero.
    #[default]
    Mid,
    /// Origin at the last chunk; valid coordinates are `-(count - 1)..=0`.
    End,
}

impl ChunkOffset {
    /// Grid-local index of the logical origin for an axis with `count` chunks.
    pub fn origin(self, count: u16) -> i64 {
        let count = i64::from(count.max(1));
        match self {
            Self::Begin => 0,
            Self::Mid => count / 2,
            Self::End => count - 1,
        }
    }
}

/// Grid configuration: per-axis chunk size, chunk count and origin policy.
///
/// Zero sizes and counts are clamped to 1, both through the setters and when
/// the configuration is deserialized, so every stored value is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawGridConfig")]
pub struct GridConfig {
    chunk_size: [u16; 3],
    chunk_count: [u16; 3],
    chunk_offset: [ChunkOffset; 3],
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            chunk_size: [16; 3],
            chunk_count: [256; 3],
            chunk_offset: [ChunkOffset::Mid; 3],
        }
    }
}

impl GridConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extent of one chunk in world units, per axis.
    pub fn set_chunk_size(&mut self, x: u16, y: u16, z: u16) {
        self.chunk_size = [x.max(1), y.max(1), z.max(1)];
    }

    /// Number of chunks along each axis.
    pub fn set_chunk_count(&mut self, x: u16, y: u16, z: u16) {
        self.chunk_count = [x.max(1), y.max(1), z.max(1)];
    }

    pub fn set_chunk_offset(&mut self, x: ChunkOffset, y: ChunkOffset, z: ChunkOffset) {
        self.chunk_offset = [x, y, z];
    }

    /// Builder-style variant of [`set_chunk_size`](Self::set_chunk_size).
    pub fn with_chunk_size(mut self, x: u16, y: u16, z: u16) -> Self {
        self.set_chunk_size(x, y, z);
        self
    }

    /// Builder-style variant of [`set_chunk_count`](Self::set_chunk_count).
    pub fn with_chunk_count(mut self, x: u16, y: u16, z: u16) -> Self {
        self.set_chunk_count(x, y, z);
        self
    }

    /// Builder-style variant of [`set_chunk_offset`](Self::set_chunk_offset).
    pub fn with_chunk_offset(mut self, x: ChunkOffset, y: ChunkOffset, z: ChunkOffset) -> Self {
        self.set_chunk_offset(x, y, z);
        self
    }

    pub fn chunk_size(&self) -> [u16; 3] {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> [u16; 3] {
        self.chunk_count
    }

    pub fn chunk_offset(&self) -> [ChunkOffset; 3] {
        self.chunk_offset
    }

    /// Total number of chunks in the grid; valid ids are `0..chunk_total()`.
    pub fn chunk_total(&self) -> i64 {
        self.chunk_count.iter().map(|&c| i64::from(c)).product()
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawGridConfig {
    chunk_size: [u16; 3],
    chunk_count: [u16; 3],
    chunk_offset: [ChunkOffset; 3],
}

impl Default for RawGridConfig {
    fn default() -> Self {
        let config = GridConfig::default();
        Self {
            chunk_size: config.chunk_size,
            chunk_count: config.chunk_count,
            chunk_offset: config.chunk_offset,
        }
    }
}

impl From<RawGridConfig> for GridConfig {
    fn from(raw: RawGridConfig) -> Self {
        let [sx, sy, sz] = raw.chunk_size;
        let [cx, cy, cz] = raw.chunk_count;
        let [ox, oy, oz] = raw.chunk_offset;
        GridConfig::new()
            .with_chunk_size(sx, sy, sz)
            .with_chunk_count(cx, cy, cz)
            .with_chunk_offset(ox, oy, oz)
    }
}

use std::path::Path;

use anyhow::Context;
use interest_grid::GridConfig;
use serde::{Deserialize, Serialize};

/// Host-side settings, loadable from a YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub grid: GridConfig,
    /// Bytes available to one owner's packet per tick.
    pub buffer_size: usize,
    /// World seed for ownership tokens.
    pub seed: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::new().with_chunk_count(32, 1, 32),
            buffer_size: 4096,
            seed: 42,
        }
    }
}

impl CliConfig {
    /// Defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interest_grid::ChunkOffset;

    #[test]
    fn missing_path_gives_defaults() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "
grid:
  chunk_size: [8, 8, 8]
  chunk_count: [10, 0, 10]
  chunk_offset: [begin, mid, end]
buffer_size: 512
";
        let config: CliConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.seed, 42);
        assert_eq!(config.grid.chunk_count(), [10, 1, 10]);
        assert_eq!(config.grid.chunk_offset()[0], ChunkOffset::Begin);
    }

    #[test]
    fn unreadable_file_is_reported() {
        let err = CliConfig::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }
}

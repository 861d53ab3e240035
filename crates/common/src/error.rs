use crate::types::{EntityId, OwnerId};

/// Errors reported by the registry, the grid, the query engine and the wire codec.
///
/// All of them are local and recoverable: callers log and continue with the
/// next owner or tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("world has been destroyed")]
    WorldInvalid,
    #[error("{0} has no snapshot; nothing was ever assigned to it")]
    OwnerInvalid(OwnerId),
    #[error("chunk is outside of the configured grid")]
    ChunkInvalid,
    #[error("invalid entity data: {0}")]
    EntityInvalid(&'static str),
    #[error("{0} is not tracked")]
    Untracked(EntityId),
    #[error("{0} is already tracked")]
    AlreadyTracked(EntityId),
    #[error("{0} is owned by another authority")]
    Foreign(EntityId),
    #[error("{entity} is owned by {owner}; overrides against the own owner are ignored")]
    VisibilityIgnored { entity: EntityId, owner: OwnerId },
    #[error("malformed packet at byte {offset}: {reason}")]
    ReadInvalid { offset: usize, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::{NonZeroU8, NonZeroU16};

/// Identifier of a tracked entity, unique while tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Identifier of an observing participant (a connected client, usually).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl From<u64> for OwnerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Virtual-world partition. Entities in different dimensions never see each other.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Dimension(pub i32);

/// Observation radius in chunks. An entity without one is not an observer.
pub type Radius = NonZeroU8;

/// Value that changes every time an entity's owner is reassigned.
///
/// Never zero, so a stale claim carrying `0` can never match.
pub type OwnershipToken = NonZeroU16;

/// Opaque handle into a caller-owned side table. The engine stores it and
/// hands it back, it never interprets or frees what it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserHandle(pub u64);

/// Visibility flag, either global to an entity or overridden for one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Governed by chunk-range membership only.
    #[default]
    Default,
    /// Never included, regardless of range.
    Never,
    /// Always included, regardless of range and dimension.
    Always,
}

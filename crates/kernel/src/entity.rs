use std::collections::HashMap;

use interest_common::{Dimension, OwnerId, OwnershipToken, Radius, UserHandle, Visibility};
use interest_grid::ChunkId;
use smallvec::SmallVec;

/// How many chunks one entity can occupy at the same time.
pub const ENTITY_MAX_CHUNKS: usize = 8;

/// Per-entity data stored in the world.
///
/// Fields are only mutated through [`World`](crate::World) so the registry
/// invariants (snapshot lifecycle, ownership tokens) hold; everything is
/// readable from here.
#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub(crate) chunks: SmallVec<[ChunkId; ENTITY_MAX_CHUNKS]>,
    pub(crate) owner: Option<OwnerId>,
    pub(crate) radius: Option<Radius>,
    pub(crate) dimension: Dimension,
    pub(crate) visibility: Visibility,
    /// Allocated on the first per-owner override.
    pub(crate) owner_visibility: Option<HashMap<OwnerId, Visibility>>,
    pub(crate) userdata: Option<UserHandle>,
    pub(crate) token: Option<OwnershipToken>,
    /// Last token ever issued; survives clearing the owner.
    pub(crate) last_token: Option<OwnershipToken>,
    pub(crate) foreign: bool,
}

impl Entity {
    /// Occupied chunks, primary first. Empty when the entity was never placed.
    pub fn chunks(&self) -> &[ChunkId] {
        &self.chunks
    }

    pub fn primary_chunk(&self) -> Option<ChunkId> {
        self.chunks.first().copied()
    }

    pub fn occupies(&self, chunk: ChunkId) -> bool {
        self.chunks.contains(&chunk)
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub fn is_owned_by(&self, owner: OwnerId) -> bool {
        self.owner == Some(owner)
    }

    pub fn radius(&self) -> Option<Radius> {
        self.radius
    }

    /// Observers drive chunk-range expansion for their owner.
    pub fn is_observer(&self) -> bool {
        self.radius.is_some()
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Override for one owner, `Default` when none was set.
    pub fn visibility_for(&self, owner: OwnerId) -> Visibility {
        self.owner_visibility
            .as_ref()
            .and_then(|map| map.get(&owner).copied())
            .unwrap_or_default()
    }

    /// Effective visibility for `owner`: the per-owner override when it is
    /// not `Default`, the global flag otherwise.
    pub fn resolved_visibility(&self, owner: OwnerId) -> Visibility {
        match self.visibility_for(owner) {
            Visibility::Default => self.visibility,
            overridden => overridden,
        }
    }

    pub fn userdata(&self) -> Option<UserHandle> {
        self.userdata
    }

    pub fn ownership_token(&self) -> Option<OwnershipToken> {
        self.token
    }

    /// Foreign entities are replicas owned by another authority.
    pub fn is_foreign(&self) -> bool {
        self.foreign
    }

    pub(crate) fn set_single_chunk(&mut self, chunk: Option<ChunkId>) {
        self.chunks.clear();
        self.chunks.extend(chunk);
    }

    pub(crate) fn set_chunk_list(&mut self, chunks: &[ChunkId]) {
        self.chunks.clear();
        self.chunks
            .extend(chunks.iter().copied().take(ENTITY_MAX_CHUNKS));
    }
}

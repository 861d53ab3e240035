use std::collections::HashMap;
use std::num::NonZeroU16;

use indexmap::IndexMap;
use interest_common::{
    Dimension, EntityId, Error, OwnerId, OwnershipToken, Radius, Result, UserHandle, Visibility,
};
use interest_grid::{ChunkId, ChunkOffset, GridConfig};

use crate::entity::{ENTITY_MAX_CHUNKS, Entity};
use crate::events::{Event, Handler, HandlerKind, HandlerStatus, HandlerTable, Response};
use crate::snapshot::OwnerSnapshot;

/// The authoritative interest-management state.
///
/// All mutations go through explicit operations. The world owns the truth;
/// the query engine and the wire protocol derive from it.
///
/// Entities iterate in tracking order. Ownership tokens come from a seeded
/// splitmix64 stream, so two worlds built with the same seed and the same
/// sequence of operations hand out identical tokens.
#[derive(Debug)]
pub struct World {
    valid: bool,
    grid: GridConfig,
    entities: IndexMap<EntityId, Entity>,
    snapshots: HashMap<OwnerId, OwnerSnapshot>,
    seed: u64,
    userdata: Option<UserHandle>,
    handlers: HandlerTable,
}

impl Default for World {
    fn default() -> Self {
        Self {
            valid: true,
            grid: GridConfig::default(),
            entities: IndexMap::new(),
            snapshots: HashMap::new(),
            seed: 0,
            userdata: None,
            handlers: HandlerTable::new(),
        }
    }
}

impl World {
    /// Create an empty world with the default grid and seed 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a world with a specific seed for reproducible ownership tokens.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    pub fn with_grid(grid: GridConfig) -> Self {
        Self {
            grid,
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Release every entity, snapshot and handler. The world stays invalid
    /// afterwards; calling `destroy` twice fails.
    pub fn destroy(&mut self) -> Result<()> {
        self.check_valid()?;
        tracing::debug!(entities = self.entities.len(), owners = self.snapshots.len(), "world destroyed");
        self.entities.clear();
        self.snapshots.clear();
        self.handlers.clear();
        self.userdata = None;
        self.valid = false;
        Ok(())
    }

    fn check_valid(&self) -> Result<()> {
        if self.valid { Ok(()) } else { Err(Error::WorldInvalid) }
    }

    fn entity_ref(&self, id: EntityId) -> Result<&Entity> {
        self.check_valid()?;
        self.entities.get(&id).ok_or(Error::Untracked(id))
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        self.check_valid()?;
        self.entities.get_mut(&id).ok_or(Error::Untracked(id))
    }

    // -- configuration ------------------------------------------------------

    pub fn grid(&self) -> Result<&GridConfig> {
        self.check_valid()?;
        Ok(&self.grid)
    }

    pub fn set_chunk_size(&mut self, x: u16, y: u16, z: u16) -> Result<()> {
        self.check_valid()?;
        self.grid.set_chunk_size(x, y, z);
        Ok(())
    }

    pub fn set_chunk_count(&mut self, x: u16, y: u16, z: u16) -> Result<()> {
        self.check_valid()?;
        self.grid.set_chunk_count(x, y, z);
        Ok(())
    }

    pub fn set_chunk_offset(&mut self, x: ChunkOffset, y: ChunkOffset, z: ChunkOffset) -> Result<()> {
        self.check_valid()?;
        self.grid.set_chunk_offset(x, y, z);
        Ok(())
    }

    pub fn set_world_userdata(&mut self, data: Option<UserHandle>) -> Result<()> {
        self.check_valid()?;
        self.userdata = data;
        Ok(())
    }

    pub fn world_userdata(&self) -> Result<Option<UserHandle>> {
        self.check_valid()?;
        Ok(self.userdata)
    }

    /// Current ownership-token PRNG state.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    // -- tracking -----------------------------------------------------------

    pub fn track(&mut self, id: EntityId) -> Result<()> {
        self.check_valid()?;
        if self.entities.contains_key(&id) {
            return Err(Error::AlreadyTracked(id));
        }
        self.entities.insert(id, Entity::default());
        tracing::debug!(%id, "entity tracked");
        Ok(())
    }

    /// Stop tracking an entity.
    ///
    /// Evicts the owner's snapshot when this was the last entity it owned.
    /// Foreign entities are only removed by the read path, which clears the
    /// flag first.
    pub fn untrack(&mut self, id: EntityId) -> Result<()> {
        let entity = self.entity_ref(id)?;
        if entity.foreign {
            return Err(Error::Foreign(id));
        }
        if let Some(owner) = entity.owner {
            if self.owned_count(owner) <= 1 {
                self.snapshots.remove(&owner);
                tracing::debug!(%owner, "owner snapshot evicted");
            }
        }
        self.entities.shift_remove(&id);
        tracing::debug!(%id, "entity untracked");
        Ok(())
    }

    pub fn is_tracked(&self, id: EntityId) -> Result<bool> {
        self.check_valid()?;
        Ok(self.entities.contains_key(&id))
    }

    pub fn is_foreign(&self, id: EntityId) -> Result<bool> {
        Ok(self.entity_ref(id)?.foreign)
    }

    pub fn set_foreign(&mut self, id: EntityId, foreign: bool) -> Result<()> {
        self.entity_mut(id)?.foreign = foreign;
        Ok(())
    }

    pub fn entity_count(&self) -> Result<usize> {
        self.check_valid()?;
        Ok(self.entities.len())
    }

    /// Read-only access to one entity.
    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entity_ref(id)
    }

    /// All entities in tracking order.
    pub fn entities(&self) -> Result<&IndexMap<EntityId, Entity>> {
        self.check_valid()?;
        Ok(&self.entities)
    }

    fn owned_count(&self, owner: OwnerId) -> usize {
        self.entities.values().filter(|e| e.owner == Some(owner)).count()
    }

    // -- placement ----------------------------------------------------------

    pub fn set_chunk(&mut self, id: EntityId, chunk: ChunkId) -> Result<()> {
        self.entity_mut(id)?.set_single_chunk(Some(chunk));
        Ok(())
    }

    /// Mark the entity as not placed anywhere.
    pub fn clear_chunk(&mut self, id: EntityId) -> Result<()> {
        self.entity_mut(id)?.set_single_chunk(None);
        Ok(())
    }

    /// Place the entity in several chunks at once, the first being primary.
    ///
    /// Takes `1..ENTITY_MAX_CHUNKS` chunks; anything else is
    /// [`Error::EntityInvalid`] and leaves the placement unchanged.
    pub fn set_chunks(&mut self, id: EntityId, chunks: &[ChunkId]) -> Result<()> {
        let entity = self.entity_mut(id)?;
        if chunks.is_empty() || chunks.len() >= ENTITY_MAX_CHUNKS {
            return Err(Error::EntityInvalid("chunk list must hold 1..8 chunks"));
        }
        entity.set_chunk_list(chunks);
        Ok(())
    }

    /// Primary chunk, `None` when the entity is not placed.
    pub fn chunk(&self, id: EntityId) -> Result<Option<ChunkId>> {
        Ok(self.entity_ref(id)?.primary_chunk())
    }

    pub fn chunks(&self, id: EntityId) -> Result<&[ChunkId]> {
        Ok(self.entity_ref(id)?.chunks())
    }

    // -- ownership ----------------------------------------------------------

    /// Assign or clear the entity's owner.
    ///
    /// Every assignment draws a fresh ownership token, distinct from the last
    /// one issued for this entity even across a cleared owner, and makes sure
    /// the new owner has a snapshot.
    pub fn set_owner(&mut self, id: EntityId, owner: Option<OwnerId>) -> Result<()> {
        let entity = self.entity_ref(id)?;
        if entity.foreign {
            return Err(Error::Foreign(id));
        }
        let previous = entity.last_token;
        let token = match owner {
            Some(owner) => {
                self.snapshots.entry(owner).or_default();
                Some(self.next_token(previous))
            }
            None => None,
        };

        let entity = self.entity_mut(id)?;
        entity.owner = owner;
        entity.token = token;
        if token.is_some() {
            entity.last_token = token;
        }
        tracing::debug!(%id, ?owner, "owner assigned");
        Ok(())
    }

    pub fn owner(&self, id: EntityId) -> Result<Option<OwnerId>> {
        Ok(self.entity_ref(id)?.owner)
    }

    pub fn ownership_token(&self, id: EntityId) -> Result<Option<OwnershipToken>> {
        Ok(self.entity_ref(id)?.token)
    }

    /// Draw a non-zero token that differs from `previous`.
    fn next_token(&mut self, previous: Option<OwnershipToken>) -> OwnershipToken {
        loop {
            self.seed = splitmix64(self.seed);
            let candidate = NonZeroU16::new((self.seed >> 48) as u16);
            if let Some(token) = candidate.filter(|token| Some(*token) != previous) {
                return token;
            }
        }
    }

    // -- observation --------------------------------------------------------

    /// Observation radius in chunks; 0 turns the entity into a non-observer.
    pub fn set_radius(&mut self, id: EntityId, radius: u8) -> Result<()> {
        self.entity_mut(id)?.radius = Radius::new(radius);
        Ok(())
    }

    pub fn radius(&self, id: EntityId) -> Result<u8> {
        Ok(self.entity_ref(id)?.radius.map_or(0, Radius::get))
    }

    pub fn set_dimension(&mut self, id: EntityId, dimension: Dimension) -> Result<()> {
        self.entity_mut(id)?.dimension = dimension;
        Ok(())
    }

    pub fn dimension(&self, id: EntityId) -> Result<Dimension> {
        Ok(self.entity_ref(id)?.dimension)
    }

    pub fn set_visibility_global(&mut self, id: EntityId, visibility: Visibility) -> Result<()> {
        self.entity_mut(id)?.visibility = visibility;
        Ok(())
    }

    pub fn visibility_global(&self, id: EntityId) -> Result<Visibility> {
        Ok(self.entity_ref(id)?.visibility)
    }

    /// Override visibility of `id` for one owner.
    ///
    /// An owner always sees its own entities, so targeting the entity's own
    /// owner fails with [`Error::VisibilityIgnored`] and changes nothing.
    pub fn set_visibility_for(&mut self, id: EntityId, owner: OwnerId, visibility: Visibility) -> Result<()> {
        let entity = self.entity_mut(id)?;
        if entity.owner == Some(owner) {
            return Err(Error::VisibilityIgnored { entity: id, owner });
        }
        match visibility {
            Visibility::Default => {
                if let Some(overrides) = entity.owner_visibility.as_mut() {
                    overrides.remove(&owner);
                }
            }
            other => {
                entity
                    .owner_visibility
                    .get_or_insert_with(HashMap::new)
                    .insert(owner, other);
            }
        }
        Ok(())
    }

    pub fn visibility_for(&self, id: EntityId, owner: OwnerId) -> Result<Visibility> {
        Ok(self.entity_ref(id)?.visibility_for(owner))
    }

    // -- user data ----------------------------------------------------------

    pub fn set_userdata(&mut self, id: EntityId, data: Option<UserHandle>) -> Result<()> {
        self.entity_mut(id)?.userdata = data;
        Ok(())
    }

    pub fn userdata(&self, id: EntityId) -> Result<Option<UserHandle>> {
        Ok(self.entity_ref(id)?.userdata)
    }

    // -- owner snapshots ----------------------------------------------------

    pub fn has_owner_snapshot(&self, owner: OwnerId) -> Result<bool> {
        self.check_valid()?;
        Ok(self.snapshots.contains_key(&owner))
    }

    /// Snapshot last communicated to `owner`; [`Error::OwnerInvalid`] when the
    /// owner has never been assigned an entity.
    pub fn owner_snapshot(&self, owner: OwnerId) -> Result<&OwnerSnapshot> {
        self.check_valid()?;
        self.snapshots.get(&owner).ok_or(Error::OwnerInvalid(owner))
    }

    /// Swap in a freshly built snapshot, returning the one it replaces.
    pub fn replace_owner_snapshot(&mut self, owner: OwnerId, snapshot: OwnerSnapshot) -> Result<OwnerSnapshot> {
        self.check_valid()?;
        match self.snapshots.get_mut(&owner) {
            Some(slot) => Ok(std::mem::replace(slot, snapshot)),
            None => Err(Error::OwnerInvalid(owner)),
        }
    }

    /// Owners that currently hold a snapshot, in ascending id order.
    pub fn owners(&self) -> Result<Vec<OwnerId>> {
        self.check_valid()?;
        let mut owners: Vec<OwnerId> = self.snapshots.keys().copied().collect();
        owners.sort();
        Ok(owners)
    }

    // -- handlers -----------------------------------------------------------

    pub fn set_handler(&mut self, kind: HandlerKind, handler: Handler) -> Result<HandlerStatus> {
        self.check_valid()?;
        Ok(self.handlers.set(kind, handler))
    }

    pub fn remove_handler(&mut self, kind: HandlerKind) -> Result<HandlerStatus> {
        self.check_valid()?;
        Ok(self.handlers.remove(kind))
    }

    pub fn has_handler(&self, kind: HandlerKind) -> Result<bool> {
        self.check_valid()?;
        Ok(self.handlers.contains(kind))
    }

    /// Run the handler registered for the event's kind, if any.
    pub fn dispatch(&mut self, event: &mut Event<'_>) -> Option<Response> {
        self.handlers.dispatch(event)
    }
}

/// Splitmix64: a fast, high-quality deterministic PRNG step function.
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

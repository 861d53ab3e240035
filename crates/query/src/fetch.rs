//! Plain registry scans, independent of owners' observers.
//!
//! Each helper walks at most `limit` entities in tracking order, so the
//! result is never longer than `limit`.

use interest_common::{EntityId, OwnerId, Result};
use interest_grid::ChunkId;
use interest_kernel::{Entity, World};

fn scan(world: &World, limit: usize, keep: impl Fn(&Entity) -> bool) -> Result<Vec<EntityId>> {
    Ok(world
        .entities()?
        .iter()
        .take(limit)
        .filter(|(_, entity)| keep(entity))
        .map(|(id, _)| *id)
        .collect())
}

pub fn fetch_all(world: &World, limit: usize) -> Result<Vec<EntityId>> {
    scan(world, limit, |_| true)
}

/// Entities occupying `chunk`, through any of their chunk slots.
pub fn fetch_chunk(world: &World, chunk: ChunkId, limit: usize) -> Result<Vec<EntityId>> {
    fetch_chunks(world, &[chunk], limit)
}

pub fn fetch_chunks(world: &World, chunks: &[ChunkId], limit: usize) -> Result<Vec<EntityId>> {
    scan(world, limit, |entity| chunks.iter().any(|c| entity.occupies(*c)))
}

pub fn fetch_owner(world: &World, owner: OwnerId, limit: usize) -> Result<Vec<EntityId>> {
    fetch_owners(world, &[owner], limit)
}

pub fn fetch_owners(world: &World, owners: &[OwnerId], limit: usize) -> Result<Vec<EntityId>> {
    scan(world, limit, |entity| entity.owner().is_some_and(|o| owners.contains(&o)))
}

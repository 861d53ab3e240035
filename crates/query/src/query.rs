use std::collections::{HashMap, HashSet};

use interest_common::{Dimension, EntityId, OwnerId, Result, Visibility};
use interest_grid::ChunkId;
use interest_kernel::{Entity, World};

/// Entities visible to `owner`, at most `limit` of them.
///
/// Self-owned entities lead the result. Every observer the owner controls
/// (placed, with a radius) contributes a discrete sphere of chunks around
/// each chunk it occupies, keyed by its dimension. Other entities are then
/// scanned in tracking order, at most `limit + self_count` of them, and kept
/// when their resolved visibility is `Always`, or `Default` with a chunk
/// inside the interesting set of their own dimension.
pub fn query(world: &World, owner: OwnerId, limit: usize) -> Result<Vec<EntityId>> {
    let _span = tracing::debug_span!("query", %owner, limit).entered();
    let grid = world.grid()?;
    let entities = world.entities()?;

    let mut result = Vec::new();
    let mut seen = HashSet::new();
    let mut interest: HashMap<Dimension, HashSet<ChunkId>> = HashMap::new();
    let mut observers = 0usize;

    for (id, entity) in entities.iter().filter(|(_, e)| e.is_owned_by(owner)) {
        if seen.insert(*id) {
            result.push(*id);
        }

        let Some(radius) = entity.radius() else { continue };
        if entity.primary_chunk().is_none() {
            continue;
        }
        observers += 1;

        let chunks = interest.entry(entity.dimension()).or_default();
        for chunk in entity.chunks() {
            // A stale id (grid shrunk after placement) contributes nothing.
            let Ok(center) = grid.chunk_to_coord(*chunk) else { continue };
            chunks.extend(grid.chunk_sphere(center, radius.get()));
        }
    }
    let self_count = result.len();

    for (id, entity) in entities.iter().take(limit.saturating_add(self_count)) {
        if entity.is_owned_by(owner) {
            continue;
        }
        if is_visible(entity, owner, &interest) && seen.insert(*id) {
            result.push(*id);
        }
    }

    result.truncate(limit);
    tracing::trace!(
        observers,
        self_count,
        chunks = interest.values().map(HashSet::len).sum::<usize>(),
        visible = result.len(),
        "query complete"
    );
    Ok(result)
}

fn is_visible(entity: &Entity, owner: OwnerId, interest: &HashMap<Dimension, HashSet<ChunkId>>) -> bool {
    match entity.resolved_visibility(owner) {
        Visibility::Never => false,
        Visibility::Always => true,
        Visibility::Default => interest
            .get(&entity.dimension())
            .is_some_and(|chunks| entity.chunks().iter().any(|c| chunks.contains(c))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interest_grid::ChunkCoord;

    fn e(id: u64) -> EntityId {
        EntityId(id)
    }

    fn ids(result: &[EntityId]) -> Vec<u64> {
        result.iter().map(|id| id.0).collect()
    }

    /// 5x5x5 centered grid with entities placed at chunk coordinates.
    /// Coordinates outside the grid leave the entity unplaced.
    fn scenario_world(placements: &[(u64, (i32, i32, i32))]) -> World {
        let mut world = World::new();
        world.set_chunk_count(5, 5, 5).unwrap();
        for &(id, (x, y, z)) in placements {
            world.track(e(id)).unwrap();
            if let Ok(chunk) = world.grid().unwrap().chunk_from_coord(ChunkCoord::new(x, y, z)) {
                world.set_chunk(e(id), chunk).unwrap();
            }
        }
        world
    }

    fn observer(world: &mut World, id: u64, owner: u64, radius: u8) {
        world.set_owner(e(id), Some(OwnerId(owner))).unwrap();
        world.set_radius(e(id), radius).unwrap();
    }

    #[test]
    fn concrete_scenario() {
        let mut world = scenario_world(&[
            (1, (0, 0, 0)),
            (2, (1, 0, 0)),
            (3, (0, 1, 0)),
            (4, (0, 0, 1)),
            (5, (-1, -1, -1)),
            (6, (0, 2, 0)),
            (7, (0, 2, 0)),
            (8, (-5, -1, -1)),
            (9, (0, 0, 3)),
            (10, (2323, 0, 3)),
        ]);
        observer(&mut world, 1, 1, 2);

        let result = query(&world, OwnerId(1), 16).unwrap();
        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn self_entities_lead_in_tracking_order() {
        let mut world = scenario_world(&[(4, (0, 0, 0)), (9, (2, 2, 2)), (2, (1, 0, 0)), (7, (9, 9, 9))]);
        observer(&mut world, 4, 1, 1);
        // Unplaced and without radius, still included.
        world.set_owner(e(7), Some(OwnerId(1))).unwrap();
        world.set_visibility_global(e(7), Visibility::Never).unwrap();

        let result = query(&world, OwnerId(1), 16).unwrap();
        assert_eq!(ids(&result), vec![4, 7, 2]);
    }

    #[test]
    fn self_entities_survive_a_tight_limit() {
        let mut world = scenario_world(&[(1, (0, 0, 0)), (2, (0, 0, 0)), (3, (0, 0, 0))]);
        observer(&mut world, 3, 1, 1);
        world.set_owner(e(1), Some(OwnerId(1))).unwrap();

        assert_eq!(ids(&query(&world, OwnerId(1), 2).unwrap()), vec![1, 3]);
        assert_eq!(ids(&query(&world, OwnerId(1), 1).unwrap()), vec![1]);
        assert!(query(&world, OwnerId(1), 0).unwrap().is_empty());
    }

    #[test]
    fn owner_without_entities_sees_nothing() {
        let world = scenario_world(&[(1, (0, 0, 0)), (2, (1, 0, 0))]);
        assert!(query(&world, OwnerId(5), 16).unwrap().is_empty());
    }

    #[test]
    fn dimensions_are_isolated() {
        let mut world = scenario_world(&[(1, (0, 0, 0)), (2, (0, 0, 0))]);
        observer(&mut world, 1, 1, 2);
        observer(&mut world, 2, 2, 2);
        world.set_dimension(e(2), Dimension(1)).unwrap();

        assert_eq!(ids(&query(&world, OwnerId(1), 16).unwrap()), vec![1]);
        assert_eq!(ids(&query(&world, OwnerId(2), 16).unwrap()), vec![2]);

        world.set_dimension(e(2), Dimension(0)).unwrap();
        assert_eq!(ids(&query(&world, OwnerId(1), 16).unwrap()), vec![1, 2]);
    }

    #[test]
    fn per_owner_override_beats_global_flag() {
        let mut world = scenario_world(&[(1, (0, 0, 0)), (2, (1, 0, 0)), (3, (1, 0, 0))]);
        observer(&mut world, 1, 1, 1);

        world.set_visibility_global(e(2), Visibility::Never).unwrap();
        world.set_visibility_for(e(2), OwnerId(1), Visibility::Always).unwrap();
        world.set_visibility_global(e(3), Visibility::Always).unwrap();
        world.set_visibility_for(e(3), OwnerId(1), Visibility::Never).unwrap();

        assert_eq!(ids(&query(&world, OwnerId(1), 16).unwrap()), vec![1, 2]);
    }

    #[test]
    fn global_never_hides_in_range_entity() {
        let mut world = scenario_world(&[(1, (0, 0, 0)), (2, (1, 0, 0))]);
        observer(&mut world, 1, 1, 1);
        world.set_visibility_global(e(2), Visibility::Never).unwrap();
        assert_eq!(ids(&query(&world, OwnerId(1), 16).unwrap()), vec![1]);

        // An override for someone else changes nothing for owner 1.
        world.set_visibility_for(e(2), OwnerId(9), Visibility::Always).unwrap();
        assert_eq!(ids(&query(&world, OwnerId(1), 16).unwrap()), vec![1]);
    }

    #[test]
    fn always_ignores_range_and_dimension() {
        let mut world = scenario_world(&[(1, (0, 0, 0)), (2, (2, 2, 2)), (3, (9, 9, 9))]);
        observer(&mut world, 1, 1, 1);
        world.set_dimension(e(2), Dimension(3)).unwrap();
        world.set_visibility_global(e(2), Visibility::Always).unwrap();
        world.set_visibility_for(e(3), OwnerId(1), Visibility::Always).unwrap();

        assert_eq!(ids(&query(&world, OwnerId(1), 16).unwrap()), vec![1, 2, 3]);
    }

    #[test]
    fn non_observer_owner_only_sees_itself() {
        let mut world = scenario_world(&[(1, (0, 0, 0)), (2, (0, 0, 0))]);
        world.set_owner(e(1), Some(OwnerId(1))).unwrap();
        assert_eq!(ids(&query(&world, OwnerId(1), 16).unwrap()), vec![1]);
    }

    #[test]
    fn secondary_chunks_extend_the_range() {
        let mut world = scenario_world(&[(1, (-2, 0, 0)), (2, (2, 0, 0))]);
        observer(&mut world, 1, 1, 1);
        assert_eq!(ids(&query(&world, OwnerId(1), 16).unwrap()), vec![1]);

        let grid = world.grid().unwrap().clone();
        let near = grid.chunk_from_coord(ChunkCoord::new(-2, 0, 0)).unwrap();
        let far = grid.chunk_from_coord(ChunkCoord::new(1, 0, 0)).unwrap();
        world.set_chunks(e(1), &[near, far]).unwrap();
        assert_eq!(ids(&query(&world, OwnerId(1), 16).unwrap()), vec![1, 2]);
    }

    #[test]
    fn result_is_truncated_to_limit() {
        let mut placements = vec![(1, (0, 0, 0))];
        placements.extend((2..=20).map(|id| (id, (1, 0, 0))));
        let mut world = scenario_world(&placements);
        observer(&mut world, 1, 1, 1);

        assert_eq!(ids(&query(&world, OwnerId(1), 5).unwrap()), vec![1, 2, 3, 4, 5]);
        assert_eq!(query(&world, OwnerId(1), 100).unwrap().len(), 20);
    }

    #[test]
    fn destroyed_world_fails() {
        let mut world = World::new();
        world.destroy().unwrap();
        assert!(query(&world, OwnerId(1), 4).is_err());
    }
}

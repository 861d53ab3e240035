//! Snapshot-diff wire protocol.
//!
//! # Invariants
//! - A packet is a sequence of segments in CREATE, UPDATE, REMOVE order;
//!   empty segments are never written.
//! - `write` never touches bytes past the end of its buffer and replaces the
//!   owner's snapshot only after all three segments are built.
//! - `read` validates a whole segment before any of its entries reach a
//!   handler, and never reads past the end of its input.
//!
//! All integers on the wire are little-endian with no padding:
//!
//! ```text
//! Segment := { kind: u8, reserved: u8, entry_count: u16, payload_size: u32 } Entry*
//! Entry   := { entity_id: u64, payload_len: u16 } payload[payload_len]
//! ```

mod read;
pub mod segment;
mod write;

pub use read::{ReadSummary, read};
pub use segment::{EntryHeader, SegmentHeader, SegmentKind};
pub use write::{WRITE_QUERY_LIMIT, write};

pub fn crate_info() -> &'static str {
    "interest-wire v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    use interest_common::{EntityId, OwnerId};
    use interest_grid::ChunkCoord;
    use interest_kernel::World;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("wire"));
    }

    fn tracked_ids(world: &World) -> Vec<u64> {
        world.entities().unwrap().keys().map(|id| id.0).collect()
    }

    #[test]
    fn client_mirrors_server_view_across_ticks() {
        let mut server = World::new();
        server.set_chunk_count(16, 1, 16).unwrap();
        let grid = server.grid().unwrap().clone();
        let at = |x: i32, z: i32| grid.chunk_from_coord(ChunkCoord::new(x, 0, z)).unwrap();

        for (id, chunk) in [(1, at(0, 0)), (2, at(1, 0)), (3, at(6, 6))] {
            server.track(EntityId(id)).unwrap();
            server.set_chunk(EntityId(id), chunk).unwrap();
        }
        server.set_owner(EntityId(1), Some(OwnerId(1))).unwrap();
        server.set_radius(EntityId(1), 2).unwrap();

        let mut client = World::new();
        let mut buf = vec![0u8; 1024];
        let mut tick = |server: &mut World, client: &mut World| {
            let n = write(server, OwnerId(1), &mut buf, None).unwrap();
            read(client, OwnerId(1), &buf[..n], None).unwrap()
        };

        tick(&mut server, &mut client);
        assert_eq!(tracked_ids(&client), vec![1, 2]);

        server.set_chunk(EntityId(3), at(0, 1)).unwrap();
        server.set_chunk(EntityId(2), at(7, 7)).unwrap();
        let summary = tick(&mut server, &mut client);
        assert_eq!((summary.created, summary.removed), (1, 1));
        assert_eq!(tracked_ids(&client), vec![1, 3]);

        let summary = tick(&mut server, &mut client);
        assert_eq!(summary, ReadSummary { created: 0, updated: 2, removed: 0, errors: 0 });
    }
}

use interest_common::{EntityId, OwnerId, Result};
use interest_kernel::{Context, Event, Liveness, OwnerSnapshot, Response, World};
use interest_query::query;

use crate::segment::{EntryHeader, SegmentHeader, SegmentKind};

/// Upper bound on the query feeding one `write`, independent of buffer size.
pub const WRITE_QUERY_LIMIT: usize = 16384;

/// Build the next packet for `owner` into `buffer` and return its length.
///
/// Entities new to the owner go into CREATE, known ones into UPDATE, and
/// known ones that dropped out of range into REMOVE. Whatever does not fit
/// in `buffer` is skipped for this tick: a missed CREATE is retried next
/// tick, a missed UPDATE keeps the entity alive, a missed REMOVE keeps the
/// entity in the snapshot until its removal gets through. Handler rejections
/// follow the same rules.
pub fn write(world: &mut World, owner: OwnerId, buffer: &mut [u8], mut ctx: Context<'_>) -> Result<usize> {
    let _span = tracing::debug_span!("write", %owner, limit = buffer.len()).entered();
    let mut previous = world.owner_snapshot(owner)?.clone();
    let candidates = query(world, owner, WRITE_QUERY_LIMIT)?;

    let mut next = OwnerSnapshot::new();
    let mut counts = [0usize; 3];
    let mut written = 0;

    for kind in SegmentKind::ALL {
        let ids: Vec<EntityId> = match kind {
            SegmentKind::Create => candidates.iter().copied().filter(|id| !previous.contains(*id)).collect(),
            SegmentKind::Update => {
                let mut alive = Vec::new();
                for &id in &candidates {
                    if previous.confirm(id) {
                        alive.push(id);
                    }
                }
                alive
            }
            SegmentKind::Remove => previous
                .iter()
                .filter(|(_, liveness)| *liveness != Liveness::Confirmed)
                .map(|(id, _)| id)
                .collect(),
        };

        let mut segment = SegmentWriter::begin(buffer, written, kind);
        for id in ids {
            let sent = match segment.as_mut() {
                Some(segment) => segment.push(world, owner, id, ctx.as_deref_mut()),
                None => false,
            };
            match kind {
                SegmentKind::Create if sent => next.insert(id, Liveness::Created),
                SegmentKind::Update => next.insert(id, Liveness::Created),
                SegmentKind::Remove if !sent => next.insert(id, Liveness::Created),
                _ => {}
            }
        }
        if let Some(segment) = segment {
            counts[kind as usize] = usize::from(segment.entries);
            written = segment.finish();
        }
    }

    world.replace_owner_snapshot(owner, next)?;
    tracing::trace!(
        created = counts[0],
        updated = counts[1],
        removed = counts[2],
        bytes = written,
        "packet written"
    );
    Ok(written)
}

/// One segment under construction. The header slot is reserved up front and
/// filled in by [`finish`](Self::finish) once the entry count is known.
struct SegmentWriter<'b> {
    buffer: &'b mut [u8],
    start: usize,
    cursor: usize,
    end: usize,
    kind: SegmentKind,
    entries: u16,
}

impl<'b> SegmentWriter<'b> {
    /// `None` when not even the header fits after `start`.
    fn begin(buffer: &'b mut [u8], start: usize, kind: SegmentKind) -> Option<Self> {
        let cursor = start + SegmentHeader::LEN;
        if cursor > buffer.len() {
            return None;
        }
        // payload_size is a u32 on the wire.
        let end = buffer.len().min(cursor.saturating_add(u32::MAX as usize));
        Some(Self {
            buffer,
            start,
            cursor,
            end,
            kind,
            entries: 0,
        })
    }

    /// Run the write handler for `entity` and append its entry. Returns
    /// whether the entry made it into the segment.
    fn push(&mut self, world: &mut World, owner: OwnerId, entity: EntityId, ctx: Context<'_>) -> bool {
        if self.entries == u16::MAX {
            return false;
        }
        let payload_at = self.cursor + EntryHeader::LEN;
        if payload_at > self.end {
            return false;
        }
        let window_end = self.end.min(payload_at + usize::from(u16::MAX));
        let window = window_end - payload_at;

        let mut event = Event::for_write(
            self.kind.write_handler(),
            owner,
            entity,
            &mut self.buffer[payload_at..window_end],
            ctx,
        );
        let len = match world.dispatch(&mut event) {
            None => 0,
            Some(Response::Written(len)) if len <= window => len,
            Some(Response::Written(len)) => {
                tracing::debug!(%entity, len, window, "handler overran its window, entry rejected");
                return false;
            }
            Some(Response::Reject) => return false,
        };

        let header = EntryHeader {
            entity,
            // Bounded by the window, itself capped at u16::MAX.
            payload_len: len as u16,
        };
        self.buffer[self.cursor..payload_at].copy_from_slice(&header.encode());
        self.cursor = payload_at + len;
        self.entries += 1;
        true
    }

    /// Write the header and return the packet length after this segment.
    /// An empty segment leaves no trace.
    fn finish(self) -> usize {
        if self.entries == 0 {
            return self.start;
        }
        let header = SegmentHeader {
            kind: self.kind,
            entry_count: self.entries,
            payload_size: (self.cursor - self.start - SegmentHeader::LEN) as u32,
        };
        self.buffer[self.start..self.start + SegmentHeader::LEN].copy_from_slice(&header.encode());
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::segment::segment_size;
    use interest_common::Error;
    use interest_grid::ChunkId;
    use interest_kernel::HandlerKind;

    fn e(id: u64) -> EntityId {
        EntityId(id)
    }

    /// Entities 1..=3 share chunk 1; entity 1 is owner 1's observer.
    fn three_in_a_chunk() -> World {
        let mut world = World::new();
        for id in 1..=3 {
            world.track(e(id)).unwrap();
            world.set_chunk(e(id), ChunkId(1)).unwrap();
        }
        world.set_owner(e(1), Some(OwnerId(1))).unwrap();
        world.set_radius(e(1), 1).unwrap();
        world
    }

    fn on(world: &mut World, kind: HandlerKind, f: impl FnMut(&mut Event<'_>) -> Response + 'static) {
        world.set_handler(kind, Box::new(f)).unwrap();
    }

    fn two_bytes(event: &mut Event<'_>) -> Response {
        event.write(&[9, 9])
    }

    fn write_with(world: &mut World, limit: usize) -> (usize, Vec<u8>) {
        let mut buf = vec![0u8; limit];
        let n = write(world, OwnerId(1), &mut buf, None).unwrap();
        buf.truncate(n);
        (n, buf)
    }

    fn snapshot_ids(world: &World) -> Vec<u64> {
        world.owner_snapshot(OwnerId(1)).unwrap().ids().map(|id| id.0).collect()
    }

    #[test]
    fn create_for_single_entity() {
        let mut world = World::new();
        world.track(e(1)).unwrap();
        world.set_chunk(e(1), ChunkId(1)).unwrap();
        world.set_owner(e(1), Some(OwnerId(1))).unwrap();
        on(&mut world, HandlerKind::WriteCreate, |_| Response::ACCEPT);

        assert_eq!(write_with(&mut world, 4096).0, segment_size(1, 0));
    }

    #[test]
    fn create_section_bytes() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteCreate, two_bytes);

        let (n, buf) = write_with(&mut world, 4096);
        assert_eq!(n, segment_size(3, 2));
        #[rustfmt::skip]
        let expected = [
            0x00, 0x00, 0x03, 0x00, 0x24, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x09, 0x09,
            0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x09, 0x09,
            0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x09, 0x09,
        ];
        assert_eq!(buf, expected);
        assert_eq!(snapshot_ids(&world), vec![1, 2, 3]);
    }

    #[test]
    fn rejected_creates_write_nothing_and_retry() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteCreate, |event| {
            event.write(&[9, 9]);
            Response::Reject
        });

        assert_eq!(write_with(&mut world, 4096).0, 0);
        assert!(snapshot_ids(&world).is_empty());

        on(&mut world, HandlerKind::WriteCreate, two_bytes);
        let (n, buf) = write_with(&mut world, 4096);
        assert_eq!(n, segment_size(3, 2));
        assert_eq!(buf[0], SegmentKind::Create as u8);
    }

    #[test]
    fn create_under_size_limit_gives_rest_next_call() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteCreate, |_| Response::ACCEPT);

        assert_eq!(write_with(&mut world, 30).0, segment_size(2, 0));
        assert_eq!(snapshot_ids(&world), vec![1, 2]);
        assert_eq!(write_with(&mut world, 30).0, segment_size(1, 0));
    }

    #[test]
    fn create_under_size_limit_with_data() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteCreate, two_bytes);

        assert_eq!(write_with(&mut world, 35).0, segment_size(2, 2));
        assert_eq!(write_with(&mut world, 35).0, segment_size(1, 2));
    }

    #[test]
    fn exact_size_buffer_fits() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteCreate, two_bytes);
        assert_eq!(write_with(&mut world, segment_size(3, 2)).0, segment_size(3, 2));
    }

    #[test]
    fn buffer_smaller_than_header_writes_nothing() {
        let mut world = three_in_a_chunk();
        assert_eq!(write_with(&mut world, 7).0, 0);
        assert!(snapshot_ids(&world).is_empty());
        assert_eq!(write_with(&mut world, 0).0, 0);
    }

    #[test]
    fn second_write_is_update_only() {
        let mut world = three_in_a_chunk();
        write_with(&mut world, 4096);

        let (n, buf) = write_with(&mut world, 4096);
        assert_eq!(n, segment_size(3, 0));
        assert_eq!(buf[0], SegmentKind::Update as u8);
    }

    #[test]
    fn update_section_bytes() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteUpdate, two_bytes);
        write_with(&mut world, 4096);

        let (n, buf) = write_with(&mut world, 4096);
        assert_eq!(n, segment_size(3, 2));
        assert_eq!(&buf[..8], &[0x01, 0x00, 0x03, 0x00, 0x24, 0x00, 0x00, 0x00]);
        assert_eq!(&buf[8..20], &[0x01, 0, 0, 0, 0, 0, 0, 0, 0x02, 0x00, 0x09, 0x09]);
    }

    #[test]
    fn rejected_updates_keep_entities_alive() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteUpdate, |_| Response::Reject);
        write_with(&mut world, 4096);

        assert_eq!(write_with(&mut world, 4096).0, 0);
        assert_eq!(snapshot_ids(&world), vec![1, 2, 3]);
        assert_eq!(write_with(&mut world, 4096).0, 0);
    }

    #[test]
    fn update_under_size_limit_repeats() {
        let mut world = three_in_a_chunk();
        write_with(&mut world, 4096);

        assert_eq!(write_with(&mut world, 30).0, segment_size(2, 0));
        assert_eq!(write_with(&mut world, 30).0, segment_size(2, 0));
        assert_eq!(snapshot_ids(&world), vec![1, 2, 3]);
    }

    #[test]
    fn remove_section_after_untrack() {
        let mut world = three_in_a_chunk();
        write_with(&mut world, 4096);
        world.untrack(e(2)).unwrap();

        let (n, buf) = write_with(&mut world, 4096);
        assert_eq!(n, segment_size(2, 0) + segment_size(1, 0));
        assert_eq!(buf[segment_size(2, 0)], SegmentKind::Remove as u8);
        assert_eq!(buf[segment_size(2, 0) + 8], 2);

        assert_eq!(write_with(&mut world, 4096).0, segment_size(2, 0));
    }

    #[test]
    fn remove_section_with_data() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteRemove, two_bytes);
        write_with(&mut world, 4096);
        world.untrack(e(2)).unwrap();

        assert_eq!(write_with(&mut world, 4096).0, segment_size(2, 0) + segment_size(1, 2));
        assert_eq!(write_with(&mut world, 4096).0, segment_size(2, 0));
    }

    #[test]
    fn limited_removes_arrive_on_later_calls() {
        let mut world = three_in_a_chunk();
        write_with(&mut world, 4096);
        world.untrack(e(2)).unwrap();
        world.untrack(e(3)).unwrap();

        assert_eq!(write_with(&mut world, 30).0, segment_size(1, 0));
        assert_eq!(snapshot_ids(&world), vec![1, 2, 3]);
        assert_eq!(write_with(&mut world, 40).0, segment_size(1, 0) * 2);
        assert_eq!(write_with(&mut world, 40).0, segment_size(1, 0) * 2);
        assert_eq!(snapshot_ids(&world), vec![1]);
    }

    #[test]
    fn rejected_remove_is_retried() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteRemove, |event| {
            if let Some(attempts) = event.context_mut::<u32>() {
                *attempts += 1;
            }
            Response::Reject
        });
        write_with(&mut world, 4096);
        world.untrack(e(2)).unwrap();

        let mut attempts = 0u32;
        let mut buf = vec![0u8; 4096];
        for _ in 0..2 {
            let n = write(&mut world, OwnerId(1), &mut buf, Some(&mut attempts as &mut dyn Any)).unwrap();
            assert_eq!(n, segment_size(2, 0));
            assert!(world.owner_snapshot(OwnerId(1)).unwrap().contains(e(2)));
        }
        assert_eq!(attempts, 2);
    }

    #[test]
    fn overlong_reply_counts_as_reject() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteCreate, |event| Response::Written(event.len() + 1));
        assert_eq!(write_with(&mut world, 4096).0, 0);
    }

    #[test]
    fn handler_sees_owner_entity_and_context() {
        let mut world = three_in_a_chunk();
        on(&mut world, HandlerKind::WriteCreate, |event| {
            assert_eq!(event.owner(), OwnerId(1));
            assert_eq!(event.kind(), HandlerKind::WriteCreate);
            let entity = event.entity().0;
            if let Some(seen) = event.context_mut::<Vec<u64>>() {
                seen.push(entity);
            }
            Response::ACCEPT
        });

        let mut seen: Vec<u64> = Vec::new();
        let mut buf = [0u8; 128];
        write(&mut world, OwnerId(1), &mut buf, Some(&mut seen as &mut dyn Any)).unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_owner_is_rejected() {
        let mut world = three_in_a_chunk();
        let mut buf = [0u8; 64];
        assert_eq!(write(&mut world, OwnerId(2), &mut buf, None), Err(Error::OwnerInvalid(OwnerId(2))));
    }

    #[test]
    fn out_of_range_entity_is_removed() {
        let mut world = three_in_a_chunk();
        write_with(&mut world, 4096);

        // Move entity 3 far outside the observer's radius.
        world.set_chunk(e(3), ChunkId(1_000_000)).unwrap();
        let (n, buf) = write_with(&mut world, 4096);
        assert_eq!(n, segment_size(2, 0) + segment_size(1, 0));
        assert_eq!(buf[segment_size(2, 0) + 8], 3);
        assert_eq!(snapshot_ids(&world), vec![1, 2]);
    }
}

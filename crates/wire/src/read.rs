use std::ops::Range;

use interest_common::{EntityId, Error, OwnerId, Result};
use interest_kernel::{Context, Event, HandlerKind, World};

use crate::segment::{EntryHeader, SegmentHeader, SegmentKind};

/// What one `read` did to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Entries routed to an error handler.
    pub errors: usize,
}

/// Apply a packet produced by [`write`](crate::write) on the remote side.
///
/// CREATE tracks the entity and marks it foreign, UPDATE is only accepted
/// for tracked foreign entities, REMOVE untracks. Entries that do not apply
/// go to the matching error handler instead.
///
/// Segments must come in CREATE, UPDATE, REMOVE order. A malformed segment
/// stops parsing with [`Error::ReadInvalid`]; segments before it have
/// already been applied, the malformed one has not been touched.
pub fn read(world: &mut World, owner: OwnerId, buffer: &[u8], mut ctx: Context<'_>) -> Result<ReadSummary> {
    let _span = tracing::debug_span!("read", %owner, len = buffer.len()).entered();
    if !world.is_valid() {
        return Err(Error::WorldInvalid);
    }

    let mut summary = ReadSummary::default();
    let mut offset = 0;
    let mut last_kind = None;

    while offset < buffer.len() {
        let header = SegmentHeader::decode(&buffer[offset..], offset)?;
        if last_kind.is_some_and(|last| header.kind < last) {
            return Err(Error::ReadInvalid {
                offset,
                reason: "segments out of order",
            });
        }
        last_kind = Some(header.kind);

        let body_start = offset + SegmentHeader::LEN;
        let body_end = body_start
            .checked_add(header.payload_size as usize)
            .filter(|end| *end <= buffer.len())
            .ok_or(Error::ReadInvalid {
                offset,
                reason: "segment payload exceeds input",
            })?;

        let entries = parse_entries(buffer, body_start..body_end, header.entry_count)?;
        for (entity, payload) in entries {
            apply(
                world,
                owner,
                header.kind,
                entity,
                &buffer[payload],
                ctx.as_deref_mut(),
                &mut summary,
            )?;
        }
        offset = body_end;
    }

    tracing::trace!(
        created = summary.created,
        updated = summary.updated,
        removed = summary.removed,
        errors = summary.errors,
        "packet read"
    );
    Ok(summary)
}

/// Split a segment body into entries, checking that exactly `count` of them
/// fill it.
fn parse_entries(buffer: &[u8], body: Range<usize>, count: u16) -> Result<Vec<(EntityId, Range<usize>)>> {
    let mut entries = Vec::with_capacity(usize::from(count));
    let mut pos = body.start;
    for _ in 0..count {
        let entry = EntryHeader::decode(&buffer[pos..body.end], pos)?;
        let payload_start = pos + EntryHeader::LEN;
        let payload_end = payload_start + usize::from(entry.payload_len);
        if payload_end > body.end {
            return Err(Error::ReadInvalid {
                offset: pos,
                reason: "entry payload exceeds segment",
            });
        }
        entries.push((entry.entity, payload_start..payload_end));
        pos = payload_end;
    }
    if pos != body.end {
        return Err(Error::ReadInvalid {
            offset: pos,
            reason: "segment size does not match its entries",
        });
    }
    Ok(entries)
}

fn apply(
    world: &mut World,
    owner: OwnerId,
    kind: SegmentKind,
    entity: EntityId,
    payload: &[u8],
    ctx: Context<'_>,
    summary: &mut ReadSummary,
) -> Result<()> {
    match kind {
        SegmentKind::Create => match world.track(entity) {
            Ok(()) => {
                world.set_foreign(entity, true)?;
                notify(world, kind.read_handler(), owner, entity, payload, ctx);
                summary.created += 1;
            }
            Err(Error::AlreadyTracked(_)) => {
                notify(world, kind.error_handler(), owner, entity, payload, ctx);
                summary.errors += 1;
            }
            Err(err) => return Err(err),
        },
        SegmentKind::Update => {
            if world.is_tracked(entity)? && world.is_foreign(entity)? {
                notify(world, kind.read_handler(), owner, entity, payload, ctx);
                summary.updated += 1;
            } else {
                notify(world, kind.error_handler(), owner, entity, payload, ctx);
                summary.errors += 1;
            }
        }
        SegmentKind::Remove => {
            if world.is_tracked(entity)? {
                notify(world, kind.read_handler(), owner, entity, payload, ctx);
                world.set_foreign(entity, false)?;
                world.untrack(entity)?;
                summary.removed += 1;
            } else {
                notify(world, kind.error_handler(), owner, entity, payload, ctx);
                summary.errors += 1;
            }
        }
    }
    Ok(())
}

fn notify(world: &mut World, kind: HandlerKind, owner: OwnerId, entity: EntityId, payload: &[u8], ctx: Context<'_>) {
    let mut event = Event::for_read(kind, owner, entity, payload, ctx);
    // Read-side replies carry no meaning.
    let _ = world.dispatch(&mut event);
}

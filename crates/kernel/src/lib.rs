//! World Kernel: the authoritative entity and owner registry.
//!
//! # Invariants
//! - The world is either valid or destroyed; every operation on a destroyed
//!   world fails with [`Error::WorldInvalid`](interest_common::Error::WorldInvalid).
//! - At most one snapshot exists per owner, and it is only ever replaced
//!   wholesale, never patched in place.
//! - Entities iterate in tracking order.

pub mod entity;
pub mod events;
pub mod snapshot;
pub mod world;

pub use entity::{ENTITY_MAX_CHUNKS, Entity};
pub use events::{Context, Event, Handler, HandlerKind, HandlerStatus, HandlerTable, Response};
pub use snapshot::{Liveness, OwnerSnapshot};
pub use world::World;

//! Visibility query: which entities an owner should hear about this tick.
//!
//! # Invariants
//! - The owner's own entities come first, in tracking order, regardless of
//!   visibility flags or placement.
//! - Entities in different dimensions never see each other through chunk
//!   range; only an explicit `Always` crosses that boundary.
//! - Results are deduplicated and never longer than the requested limit.

mod fetch;
mod query;

pub use fetch::{fetch_all, fetch_chunk, fetch_chunks, fetch_owner, fetch_owners};
pub use query::query;

pub fn crate_info() -> &'static str {
    "interest-query v0.1.0"
}

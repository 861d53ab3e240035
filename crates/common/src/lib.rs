//! Shared types for the interest engine: identifiers, visibility flags, errors.
//!
//! # Invariants
//! - Identifiers are plain 64-bit values chosen by the host application.
//! - Every fallible operation in the workspace reports an [`Error`] variant
//!   from this crate; none of them is process-terminating.

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Dimension, EntityId, OwnerId, OwnershipToken, Radius, UserHandle, Visibility};

pub fn crate_info() -> &'static str {
    "interest-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}

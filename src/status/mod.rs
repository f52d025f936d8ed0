//! Status lattice
//!
//! Canonical status values and the rules for combining them.

mod lattice;
mod value;

pub use lattice::{classify_count, fold, is_conflict, merge};
pub use value::{ParseStatusError, StatusCategory, StatusValue};

/// Default evidence count at or below which availability is `LIMITED`
pub const DEFAULT_LIMITED_THRESHOLD: u32 = 5;

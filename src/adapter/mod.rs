//! Adapter layer
//!
//! Site adapters are external collaborators: each implements [`Adapter`] and
//! turns one source into signals. This module holds the contract, the
//! run-scoped context and cache they share, and a fixture-driven adapter.

mod cache;
mod replay;
mod traits;

pub use cache::{CachePolicy, RunCache};
pub use replay::ReplayAdapter;
pub use traits::{Adapter, AdapterError, RunContext};

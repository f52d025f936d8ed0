//! Publication of aggregated statuses
//!
//! A [`Publisher`] turns each [`AggregationResult`](crate::aggregate::AggregationResult)
//! into a [`StatusRecord`] and upserts it into a [`StatusStore`]. Stores:
//! SQLite, in-memory, and a remote HTTP API.

mod dump;
mod http;
mod memory;
mod publisher;
mod sqlite;
mod traits;

pub use dump::EvidenceDump;
pub use http::{ApiSecret, HttpStatusStore, DEFAULT_HTTP_TIMEOUT_SECS};
pub use memory::MemoryStatusStore;
pub use publisher::{PublishOutcome, Publisher};
pub use sqlite::SqliteStatusStore;
pub use traits::{StatusRecord, StatusStore, StoreError, StoreResult};

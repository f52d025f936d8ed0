//! Slotwatch: availability status classification and aggregation
//!
//! Turns noisy, per-source availability signals scraped from many booking
//! sites into one canonical status per location and publishes it.
//!
//! # Core Concepts
//!
//! - **Status lattice**: canonical values plus a commutative, associative merge
//! - **Signals**: one adapter's evidence about one or more locations
//! - **Entity resolution**: raw addresses and keys mapped to stable entity keys
//! - **Aggregation**: all signals for a key folded into one verdict
//! - **Publishing**: idempotent, best-effort upsert per key
//!
//! # Example
//!
//! ```
//! use slotwatch::{merge, classify_count, StatusValue};
//!
//! assert_eq!(merge(StatusValue::No, StatusValue::Yes), StatusValue::Yes);
//! assert_eq!(classify_count(3, 5), StatusValue::Limited);
//! ```

pub mod adapter;
pub mod aggregate;
pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod publish;
pub mod resolver;
pub mod signal;
pub mod status;

pub use adapter::{Adapter, AdapterError, CachePolicy, ReplayAdapter, RunCache, RunContext};
pub use aggregate::{AggregationResult, Aggregator, Evidence, StatusConflict};
pub use config::{ConfigError, ConfigResult, EngineConfig, StoreConfig};
pub use orchestrator::{AdapterReport, AdapterState, Orchestrator, RunReport};
pub use publish::{
    MemoryStatusStore, PublishOutcome, Publisher, SqliteStatusStore, StatusRecord, StatusStore,
    StoreError, StoreResult,
};
pub use resolver::{Entity, EntityResolver, KeyCollision, RegionLookup, ZipCountyTable};
pub use signal::{Discovery, Signal, StatusBasis};
pub use status::{classify_count, fold, merge, StatusValue, DEFAULT_LIMITED_THRESHOLD};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

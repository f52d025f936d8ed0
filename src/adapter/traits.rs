//! The contract site adapters implement
//!
//! An adapter fetches one external source and reports what it found as
//! [`Signal`]s. Everything about the source (URLs, page structure, parsing)
//! stays inside the adapter.

use super::cache::RunCache;
use crate::signal::Signal;
use crate::status::{StatusValue, DEFAULT_LIMITED_THRESHOLD};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Why an adapter could not produce signals
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The fetch could not complete (network, DNS, refused connection)
    #[error("transport failure: {0}")]
    Transport(String),
    /// The page or payload no longer has the structure the adapter expects
    #[error("schema drift: {0}")]
    SchemaDrift(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("adapter panicked: {0}")]
    Panicked(String),
    #[error("adapter error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Status reported for the keys an adapter covers when it fails.
    ///
    /// Schema drift is flagged for review as `POSSIBLE`; every other failure
    /// is `UNKNOWN`. Neither is ever `NO`.
    pub fn fallback_status(&self) -> StatusValue {
        match self {
            AdapterError::SchemaDrift(_) => StatusValue::Possible,
            _ => StatusValue::Unknown,
        }
    }
}

/// Run-scoped state handed to every adapter
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    /// YES/LIMITED boundary for count-based signals
    pub limited_threshold: u32,
    /// Shared by sibling adapters, discarded when the run ends
    pub cache: Arc<RunCache>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(DEFAULT_LIMITED_THRESHOLD)
    }
}

impl RunContext {
    pub fn new(limited_threshold: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            limited_threshold,
            cache: Arc::new(RunCache::new()),
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// A count-based signal using this run's threshold
    pub fn counted(&self, evidence_count: u32) -> Signal {
        Signal::counted(evidence_count, self.limited_threshold)
    }
}

/// The contract adapters implement.
///
/// `fetch` may issue several network calls and take a while; the orchestrator
/// treats it as one opaque step. An error fails only this adapter.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Unique identifier for this adapter
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str {
        self.id()
    }

    /// Pre-registered keys this adapter answers for.
    ///
    /// When the adapter fails, these keys receive a fallback signal instead
    /// of silently dropping out of the run.
    fn covers(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fetch the source and report what it says
    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<Signal>, AdapterError>;
}

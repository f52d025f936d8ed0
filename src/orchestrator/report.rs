//! Run summary

use crate::aggregate::StatusConflict;
use crate::publish::PublishOutcome;
use crate::resolver::KeyCollision;
use crate::status::StatusValue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-adapter lifecycle: `Pending → Fetching → {Signaled, Failed}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AdapterState {
    Pending,
    Fetching,
    Signaled { signals: usize },
    Failed { reason: String },
}

impl AdapterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AdapterState::Signaled { .. } | AdapterState::Failed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AdapterState::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdapterReport {
    pub id: String,
    pub name: String,
    pub state: AdapterState,
    /// Fetches performed, including retries
    pub attempts: u32,
    /// Fallback signals created for covered keys after a failure
    pub synthesized: usize,
    /// Discoveries that could not be resolved to a key
    pub unresolved: usize,
}

impl AdapterReport {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: AdapterState::Pending,
            attempts: 0,
            synthesized: 0,
            unresolved: 0,
        }
    }

    /// Move `Pending` to `Fetching`; any other state is left alone.
    pub(crate) fn mark_fetching(&mut self) -> bool {
        if self.state != AdapterState::Pending {
            return false;
        }
        self.state = AdapterState::Fetching;
        true
    }
}

/// Everything one run did, serializable for `--report`
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub adapters: Vec<AdapterReport>,
    /// Final verdict per entity key
    pub statuses: BTreeMap<String, StatusValue>,
    pub outcomes: BTreeMap<String, PublishOutcome>,
    pub conflicts: Vec<StatusConflict>,
    pub collisions: Vec<KeyCollision>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            adapters: Vec::new(),
            statuses: BTreeMap::new(),
            outcomes: BTreeMap::new(),
            conflicts: Vec::new(),
            collisions: Vec::new(),
        }
    }

    pub fn adapter(&self, id: &str) -> Option<&AdapterReport> {
        self.adapters.iter().find(|a| a.id == id)
    }

    pub fn failed_adapters(&self) -> Vec<&str> {
        self.adapters
            .iter()
            .filter(|a| a.state.is_failed())
            .map(|a| a.id.as_str())
            .collect()
    }

    pub fn status(&self, key: &str) -> Option<StatusValue> {
        self.statuses.get(key).copied()
    }

    pub fn published(&self) -> Vec<&str> {
        self.keys_where(PublishOutcome::is_ok)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.keys_where(|o| matches!(o, PublishOutcome::Skipped(_)))
    }

    pub fn publish_failures(&self) -> Vec<&str> {
        self.keys_where(PublishOutcome::is_failed)
    }

    fn keys_where(&self, pred: impl Fn(&PublishOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| pred(outcome))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// True when no adapter failed and every publish succeeded or was skipped
    pub fn is_clean(&self) -> bool {
        self.failed_adapters().is_empty() && self.publish_failures().is_empty()
    }
}

//! Store trait and the record it persists

use crate::aggregate::AggregationResult;
use crate::resolver::Entity;
use crate::status::StatusValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur while writing to a status store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store rejected upsert with status {status}")]
    Rejected { status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Environment variable {0} is not set")]
    MissingSecret(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One row in the status store, keyed by entity key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub key: String,
    pub status: StatusValue,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub cumulative_count: u32,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub evidence_digest: Option<String>,
    /// Raw scraped evidence (usually HTML) uploaded with the status
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<u8>,
    /// Where the raw evidence was dumped, if it was
    #[serde(default)]
    pub content_url: Option<String>,
    /// When the stored status last changed
    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(key: impl Into<String>, status: StatusValue) -> Self {
        Self {
            key: key.into(),
            status,
            display_name: String::new(),
            address: String::new(),
            county: String::new(),
            city: String::new(),
            url: None,
            cumulative_count: 0,
            tags: BTreeSet::new(),
            evidence_digest: None,
            evidence: Vec::new(),
            content_url: None,
            updated_at: Utc::now(),
        }
    }

    /// Build the record for an aggregation result, copying descriptive
    /// attributes from its entity when one is known
    pub fn from_result(result: &AggregationResult, entity: Option<&Entity>) -> Self {
        let mut record = Self::new(&result.key, result.status);
        record.tags = result.tags.clone();
        record.evidence_digest = result.evidence.digest();
        record.evidence = result.evidence.blob();
        record.cumulative_count = result.evidence_count;

        if let Some(entity) = entity {
            record.display_name = entity.display_name.clone();
            record.address = entity.address.clone();
            record.county = entity.county.clone();
            record.city = entity.city.clone();
            record.url = entity.url.clone();
            record.cumulative_count = record.cumulative_count.max(entity.cumulative_count);
        }
        record
    }

    pub fn with_content_url(mut self, url: impl Into<String>) -> Self {
        self.content_url = Some(url.into());
        self
    }
}

/// Destination for published statuses.
///
/// `upsert` must be idempotent: writing the same record twice leaves the
/// store as if it had been written once.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Insert or replace the record for `record.key`
    async fn upsert(&self, record: &StatusRecord) -> StoreResult<()>;
}

//! Best-effort publication of aggregation results

use super::dump::EvidenceDump;
use super::traits::{StatusRecord, StatusStore};
use crate::aggregate::AggregationResult;
use crate::resolver::Entity;
use crate::status::StatusValue;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to one result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum PublishOutcome {
    Ok,
    /// Deliberately not written (e.g. `UNKNOWN` with publishing disabled)
    Skipped(String),
    Failed(String),
}

impl PublishOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, PublishOutcome::Ok)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PublishOutcome::Failed(_))
    }
}

/// Writes aggregation results to a [`StatusStore`], once, without retrying.
///
/// Each call is independent: a failure is logged and reported in the
/// returned outcome, never raised.
pub struct Publisher {
    store: Arc<dyn StatusStore>,
    dump: Option<EvidenceDump>,
    dry_run: bool,
    publish_unknown: bool,
}

impl Publisher {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self {
            store,
            dump: None,
            dry_run: false,
            publish_unknown: false,
        }
    }

    /// Dump evidence of `POSSIBLE`/`UNKNOWN` results for review
    pub fn with_dump(mut self, dump: EvidenceDump) -> Self {
        self.dump = Some(dump);
        self
    }

    /// Log records instead of writing them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Also write `UNKNOWN` results
    pub fn with_publish_unknown(mut self, publish_unknown: bool) -> Self {
        self.publish_unknown = publish_unknown;
        self
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    /// Upsert one result, with attributes from its entity when known
    pub async fn publish(
        &self,
        result: &AggregationResult,
        entity: Option<&Entity>,
    ) -> PublishOutcome {
        let content_url = self.dump_evidence(result);

        if result.status == StatusValue::Unknown && !self.publish_unknown {
            debug!(key = %result.key, "skipping UNKNOWN result");
            return PublishOutcome::Skipped("unknown status is not published".to_string());
        }

        let mut record = StatusRecord::from_result(result, entity);
        if let Some(url) = content_url {
            record = record.with_content_url(url);
        }

        if self.dry_run {
            info!(
                key = %record.key,
                status = %record.status,
                tags = ?record.tags,
                content_url = ?record.content_url,
                "dry run: would publish"
            );
            return PublishOutcome::Ok;
        }

        match self.store.upsert(&record).await {
            Ok(()) => {
                info!(key = %record.key, status = %record.status, store = self.store.name(), "published");
                PublishOutcome::Ok
            }
            Err(e) => {
                error!(key = %record.key, store = self.store.name(), error = %e, "publish failed");
                PublishOutcome::Failed(e.to_string())
            }
        }
    }

    fn dump_evidence(&self, result: &AggregationResult) -> Option<String> {
        let dump = self.dump.as_ref()?;
        if result.status.is_terminal() {
            return None;
        }
        match dump.write(&result.key, &result.evidence) {
            Ok(path) => path.map(|p| p.display().to_string()),
            Err(e) => {
                warn!(key = %result.key, error = %e, "could not dump evidence");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::publish::memory::MemoryStatusStore;
    use crate::publish::traits::{StoreError, StoreResult};
    use crate::signal::Signal;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct RejectingStore;

    #[async_trait]
    impl StatusStore for RejectingStore {
        fn name(&self) -> &str {
            "rejecting"
        }
        async fn upsert(&self, _record: &StatusRecord) -> StoreResult<()> {
            Err(StoreError::Rejected { status: 503 })
        }
    }

    fn result(key: &str, status: StatusValue) -> AggregationResult {
        let signals = vec![Signal::asserted(status).for_key(key).with_evidence("raw page")];
        Aggregator::new(5).aggregate(key, &signals)
    }

    #[tokio::test]
    async fn publishes_to_store() {
        let store = Arc::new(MemoryStatusStore::new());
        let publisher = Publisher::new(store.clone());
        let entity = Entity::new("k1").with_name("Clinic");

        let outcome = publisher.publish(&result("k1", StatusValue::Yes), Some(&entity)).await;
        assert!(outcome.is_ok());
        assert_eq!(store.get("k1").unwrap().display_name, "Clinic");
    }

    #[tokio::test]
    async fn failure_is_reported_not_raised() {
        let publisher = Publisher::new(Arc::new(RejectingStore));
        let outcome = publisher.publish(&result("k1", StatusValue::No), None).await;
        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn unknown_is_skipped_by_default() {
        let store = Arc::new(MemoryStatusStore::new());
        let publisher = Publisher::new(store.clone());
        let outcome = publisher.publish(&result("k1", StatusValue::Unknown), None).await;
        assert!(matches!(outcome, PublishOutcome::Skipped(_)));
        assert!(store.is_empty());

        let publisher = Publisher::new(store.clone()).with_publish_unknown(true);
        assert!(publisher.publish(&result("k1", StatusValue::Unknown), None).await.is_ok());
        assert_eq!(store.get("k1").unwrap().status, StatusValue::Unknown);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let store = Arc::new(MemoryStatusStore::new());
        let publisher = Publisher::new(store.clone()).with_dry_run(true);
        assert!(publisher.publish(&result("k1", StatusValue::Yes), None).await.is_ok());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn possible_evidence_is_dumped_and_linked() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStatusStore::new());
        let publisher = Publisher::new(store.clone()).with_dump(EvidenceDump::new(dir.path()));

        publisher.publish(&result("k1", StatusValue::Possible), None).await;
        publisher.publish(&result("k2", StatusValue::Yes), None).await;

        let url = store.get("k1").unwrap().content_url.unwrap();
        assert!(std::path::Path::new(&url).exists());
        assert_eq!(store.get("k2").unwrap().content_url, None);
    }
}

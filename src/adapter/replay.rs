//! Replay adapter: signals recorded in a YAML or JSON file
//!
//! Drives the pipeline from fixtures instead of live sites. Each entry names
//! keys and/or raw discoveries plus either a status or an evidence count:
//!
//! ```yaml
//! - keys: [clinic-a]
//!   count: 8
//!   tags: [pfizer]
//! - discoveries:
//!     - address: "123 Main St, Anytown, WA 99999"
//!       name: Main Street Pharmacy
//!   status: Call
//!   evidence: "Call (555) 010-0000 to book"
//! ```

use super::traits::{Adapter, AdapterError, RunContext};
use crate::signal::{Discovery, Signal};
use crate::status::StatusValue;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ReplayDiscovery {
    address: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    county: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplaySignal {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    discoveries: Vec<ReplayDiscovery>,
    #[serde(default)]
    status: Option<StatusValue>,
    #[serde(default)]
    count: Option<u32>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    evidence: Option<String>,
}

impl ReplaySignal {
    fn into_signal(self, index: usize, threshold: u32) -> Result<Signal, AdapterError> {
        let mut signal = match (self.count, self.status) {
            (Some(count), _) => Signal::counted(count, threshold),
            (None, Some(status)) => Signal::asserted(status),
            (None, None) => {
                return Err(AdapterError::SchemaDrift(format!(
                    "entry {index} has neither status nor count"
                )))
            }
        };

        signal = signal.for_keys(self.keys);
        for d in self.discoveries {
            let mut discovery = Discovery::new(d.address)
                .with_name(d.name)
                .with_county(d.county)
                .with_city(d.city);
            discovery.url = d.url;
            signal = signal.for_discovery(discovery);
        }
        for tag in self.tags {
            signal = signal.with_tag(tag);
        }
        if let Some(evidence) = self.evidence {
            signal = signal.with_evidence(evidence);
        }
        Ok(signal)
    }
}

/// Adapter that returns signals read from a fixture file on every fetch
#[derive(Debug, Clone)]
pub struct ReplayAdapter {
    id: String,
    path: PathBuf,
    covers: Vec<String>,
}

impl ReplayAdapter {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            covers: Vec::new(),
        }
    }

    /// Declare the pre-registered keys this fixture answers for
    pub fn with_covers(mut self, covers: Vec<String>) -> Self {
        self.covers = covers;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse fixture text. YAML is a superset of JSON, so both are accepted.
    pub fn parse(text: &str, threshold: u32) -> Result<Vec<Signal>, AdapterError> {
        let entries: Vec<ReplaySignal> =
            serde_yaml::from_str(text).map_err(|e| AdapterError::SchemaDrift(e.to_string()))?;
        entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| entry.into_signal(i, threshold))
            .collect()
    }
}

#[async_trait]
impl Adapter for ReplayAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn covers(&self) -> Vec<String> {
        self.covers.clone()
    }

    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<Signal>, AdapterError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AdapterError::Transport(format!("{}: {}", self.path.display(), e)))?;
        let signals = Self::parse(&text, ctx.limited_threshold)?;
        debug!(adapter = %self.id, signals = signals.len(), "replayed fixture");
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::StatusBasis;
    use tempfile::TempDir;

    #[test]
    fn parses_counts_and_statuses() {
        let text = r#"
- keys: [clinic-a]
  count: 8
  tags: [pfizer]
- discoveries:
    - address: "123 Main St, Anytown, WA 99999"
      name: Main Street Pharmacy
  status: call
  evidence: "Call to book"
"#;
        let signals = ReplayAdapter::parse(text, 5).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].status, StatusValue::Yes);
        assert_eq!(signals[0].basis, StatusBasis::Counted);
        assert!(signals[0].entity_keys.contains("clinic-a"));
        assert_eq!(signals[1].status, StatusValue::Call);
        assert_eq!(signals[1].discoveries[0].display_name, "Main Street Pharmacy");
        assert_eq!(signals[1].raw_evidence.as_deref(), Some(&b"Call to book"[..]));
    }

    #[test]
    fn accepts_json() {
        let text = r#"[{"keys": ["k"], "status": "No"}]"#;
        let signals = ReplayAdapter::parse(text, 5).unwrap();
        assert_eq!(signals[0].status, StatusValue::No);
    }

    #[test]
    fn entry_without_status_is_schema_drift() {
        let err = ReplayAdapter::parse("- keys: [k]\n", 5).unwrap_err();
        assert!(matches!(err, AdapterError::SchemaDrift(_)));
        assert!(matches!(
            ReplayAdapter::parse("not: [a list", 5),
            Err(AdapterError::SchemaDrift(_))
        ));
    }

    #[tokio::test]
    async fn fetch_reads_file_with_run_threshold() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixture.yaml");
        std::fs::write(&path, "- keys: [k]\n  count: 3\n").unwrap();

        let adapter = ReplayAdapter::new("fixture", &path).with_covers(vec!["k".into()]);
        let signals = adapter.fetch(&RunContext::new(2)).await.unwrap();
        assert_eq!(signals[0].status, StatusValue::Yes);
        assert_eq!(adapter.covers(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn missing_file_is_transport_failure() {
        let adapter = ReplayAdapter::new("gone", "/nonexistent/fixture.yaml");
        let err = adapter.fetch(&RunContext::default()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Transport(_)));
    }
}

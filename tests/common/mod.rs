//! Common test utilities: scripted adapters standing in for site scrapers

#![allow(dead_code)]

use async_trait::async_trait;
use slotwatch::{Adapter, AdapterError, CachePolicy, RunContext, Signal, StatusValue};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Returns a fixed script on every fetch
pub struct ScriptedAdapter {
    id: String,
    covers: Vec<String>,
    script: Result<Vec<Signal>, AdapterError>,
}

impl ScriptedAdapter {
    pub fn ok(id: &str, signals: Vec<Signal>) -> Self {
        Self {
            id: id.to_string(),
            covers: Vec::new(),
            script: Ok(signals),
        }
    }

    pub fn failing(id: &str, error: AdapterError) -> Self {
        Self {
            id: id.to_string(),
            covers: Vec::new(),
            script: Err(error),
        }
    }

    pub fn covering(mut self, keys: &[&str]) -> Self {
        self.covers = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn shared(self) -> Arc<dyn Adapter> {
        Arc::new(self)
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn covers(&self) -> Vec<String> {
        self.covers.clone()
    }

    async fn fetch(&self, _ctx: &RunContext) -> Result<Vec<Signal>, AdapterError> {
        self.script.clone()
    }
}

/// Panics during fetch
pub struct CrashingAdapter;

#[async_trait]
impl Adapter for CrashingAdapter {
    fn id(&self) -> &str {
        "crashing"
    }

    async fn fetch(&self, _ctx: &RunContext) -> Result<Vec<Signal>, AdapterError> {
        panic!("unexpected page layout")
    }
}

/// One of several adapters for the same provider. All siblings consult the
/// run cache for "is the provider frontend online?" before reporting.
pub struct ProviderSibling {
    pub key: String,
    pub upstream_checks: Arc<AtomicU32>,
}

#[async_trait]
impl Adapter for ProviderSibling {
    fn id(&self) -> &str {
        &self.key
    }

    async fn fetch(&self, ctx: &RunContext) -> Result<Vec<Signal>, AdapterError> {
        let upstream_checks = self.upstream_checks.clone();
        let online = ctx
            .cache
            .get_or_try_insert_with("provider-frontend", CachePolicy::run(), || async move {
                upstream_checks.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AdapterError>(true)
            })
            .await?;

        let status = if *online { StatusValue::Yes } else { StatusValue::Unknown };
        Ok(vec![Signal::asserted(status).for_key(self.key.clone())])
    }
}

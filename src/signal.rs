//! Signals: the unit of evidence produced by one adapter invocation

use crate::status::{classify_count, StatusValue};
use std::collections::BTreeSet;

/// How a signal's status was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusBasis {
    /// The adapter stated the status directly
    #[default]
    Asserted,
    /// The status was classified from `evidence_count`; counts for the same
    /// entity are summed and re-classified during aggregation
    Counted,
}

/// A location found by an adapter that has no pre-registered key.
///
/// The resolver turns it into an entity key by normalized address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub address: String,
    pub display_name: String,
    pub county: String,
    pub city: String,
    pub url: Option<String>,
}

impl Discovery {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_county(mut self, county: impl Into<String>) -> Self {
        self.county = county.into();
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// One adapter's evidence about one or more entities
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Entity keys this signal answers for. Keys set by an adapter are
    /// authoritative; discoveries are resolved into keys and added here.
    pub entity_keys: BTreeSet<String>,
    /// Raw locations still waiting for resolution
    pub discoveries: Vec<Discovery>,
    pub status: StatusValue,
    pub basis: StatusBasis,
    /// Number of discrete availability indicators found
    pub evidence_count: u32,
    /// YES/LIMITED boundary a counted signal was classified with
    pub threshold: Option<u32>,
    pub tags: BTreeSet<String>,
    pub raw_evidence: Option<Vec<u8>>,
    /// Adapter that produced the signal, stamped by the orchestrator
    pub source: Option<String>,
}

impl Signal {
    /// A signal whose status the adapter states directly
    pub fn asserted(status: StatusValue) -> Self {
        Self {
            entity_keys: BTreeSet::new(),
            discoveries: Vec::new(),
            status,
            basis: StatusBasis::Asserted,
            evidence_count: 0,
            threshold: None,
            tags: BTreeSet::new(),
            raw_evidence: None,
            source: None,
        }
    }

    /// A signal classified from a count of availability indicators.
    ///
    /// `threshold` is the adapter's own YES/LIMITED boundary; it travels with
    /// the signal so aggregation can re-classify summed pages the same way.
    pub fn counted(evidence_count: u32, threshold: u32) -> Self {
        Self {
            status: classify_count(evidence_count, threshold),
            basis: StatusBasis::Counted,
            evidence_count,
            threshold: Some(threshold),
            ..Self::asserted(StatusValue::Unknown)
        }
    }

    pub fn for_key(mut self, key: impl Into<String>) -> Self {
        self.entity_keys.insert(key.into());
        self
    }

    pub fn for_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn for_discovery(mut self, discovery: Discovery) -> Self {
        self.discoveries.push(discovery);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_evidence(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw_evidence = Some(raw.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// True once every discovery has been turned into a key
    pub fn is_resolved(&self) -> bool {
        self.discoveries.is_empty()
    }

    /// True if the signal names no entity at all
    pub fn is_orphan(&self) -> bool {
        self.entity_keys.is_empty() && self.discoveries.is_empty()
    }
}

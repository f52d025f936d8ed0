//! Aggregation of signals into one verdict per entity
//!
//! Signals naming several keys contribute to each key's group. Within a group,
//! statuses are folded with [`merge`](crate::status::merge). Count-based
//! signals from the same source and threshold (one adapter's pages) have
//! their counts summed and classified once before joining the fold, so
//! paginated discoveries of one location add up while independent sources
//! are never double counted.

mod evidence;

pub use evidence::{Evidence, EvidenceEntry};

use crate::signal::{Signal, StatusBasis};
use crate::status::{classify_count, fold, merge, StatusValue, DEFAULT_LIMITED_THRESHOLD};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Different manual statuses reported for one key in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusConflict {
    pub key: String,
    /// Value the merge order picked
    pub kept: StatusValue,
    /// Every distinct manual value reported
    pub reported: Vec<StatusValue>,
}

/// Final verdict for one entity, handed to the publisher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub key: String,
    pub status: StatusValue,
    pub tags: BTreeSet<String>,
    pub evidence: Evidence,
    /// Sum of evidence counts from count-based signals, across all sources
    pub evidence_count: u32,
    pub signal_count: usize,
    pub conflict: Option<StatusConflict>,
}

impl AggregationResult {
    /// Result for a key no signal mentioned: never observed means unavailable
    pub fn unobserved(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: StatusValue::No,
            tags: BTreeSet::new(),
            evidence: Evidence::new(),
            evidence_count: 0,
            signal_count: 0,
            conflict: None,
        }
    }
}

/// Folds signals for an entity key into an [`AggregationResult`]
#[derive(Debug, Clone)]
pub struct Aggregator {
    threshold: u32,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_LIMITED_THRESHOLD)
    }
}

impl Aggregator {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Group signals by entity key. A signal naming several keys appears in
    /// each of their groups.
    pub fn group<'a, I>(signals: I) -> BTreeMap<String, Vec<&'a Signal>>
    where
        I: IntoIterator<Item = &'a Signal>,
    {
        let mut groups: BTreeMap<String, Vec<&'a Signal>> = BTreeMap::new();
        for signal in signals {
            for key in &signal.entity_keys {
                groups.entry(key.clone()).or_default().push(signal);
            }
        }
        groups
    }

    /// Fold every signal that names `key`. Signals for other keys are ignored.
    pub fn aggregate<'a, I>(&self, key: &str, signals: I) -> AggregationResult
    where
        I: IntoIterator<Item = &'a Signal>,
    {
        let mut result = AggregationResult::unobserved(key);
        let mut asserted = Vec::new();
        let mut pages: BTreeMap<(Option<&str>, u32), u32> = BTreeMap::new();
        let mut manual: Vec<StatusValue> = Vec::new();

        for signal in signals.into_iter().filter(|s| s.entity_keys.contains(key)) {
            result.signal_count += 1;
            result.tags.extend(signal.tags.iter().cloned());
            if let Some(raw) = &signal.raw_evidence {
                result.evidence.push(signal.source.clone(), raw.clone());
            }

            match signal.basis {
                StatusBasis::Counted => {
                    result.evidence_count =
                        result.evidence_count.saturating_add(signal.evidence_count);
                    let threshold = signal.threshold.unwrap_or(self.threshold);
                    let total = pages
                        .entry((signal.source.as_deref(), threshold))
                        .or_default();
                    *total = total.saturating_add(signal.evidence_count);
                }
                StatusBasis::Asserted => asserted.push(signal.status),
            }
            if signal.status.is_manual() && !manual.contains(&signal.status) {
                manual.push(signal.status);
            }
        }

        if result.signal_count == 0 {
            return result;
        }

        let status = pages
            .into_iter()
            .map(|((_, threshold), count)| classify_count(count, threshold))
            .fold(fold(asserted), merge);
        result.status = status;
        result.evidence.canonicalize();

        if manual.len() > 1 {
            manual.sort_by_key(|s| s.code());
            warn!(
                key = %key,
                kept = %status,
                reported = ?manual,
                "conflicting manual statuses"
            );
            result.conflict = Some(StatusConflict {
                key: key.to_string(),
                kept: status,
                reported: manual,
            });
        }

        debug!(
            key = %key,
            status = %result.status,
            signals = result.signal_count,
            "aggregated"
        );
        result
    }

    /// Aggregate every key mentioned by `signals`
    pub fn aggregate_all(&self, signals: &[Signal]) -> Vec<AggregationResult> {
        Self::group(signals)
            .into_iter()
            .map(|(key, group)| self.aggregate(&key, group))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> Aggregator {
        Aggregator::new(5)
    }

    #[test]
    fn yes_dominates_no() {
        let signals = vec![
            Signal::counted(8, 5).for_key("clinic-A"),
            Signal::asserted(StatusValue::No).for_key("clinic-A"),
        ];
        let result = aggregator().aggregate("clinic-A", &signals);
        assert_eq!(result.status, StatusValue::Yes);
        assert_eq!(result.signal_count, 2);
    }

    #[test]
    fn all_no_stays_no() {
        let signals = vec![
            Signal::asserted(StatusValue::No).for_key("clinic-B"),
            Signal::asserted(StatusValue::No).for_key("clinic-B"),
        ];
        assert_eq!(aggregator().aggregate("clinic-B", &signals).status, StatusValue::No);
    }

    #[test]
    fn counts_are_summed_before_classifying() {
        let signals = vec![
            Signal::counted(4, 5).for_key("k"),
            Signal::counted(6, 5).for_key("k"),
        ];
        let result = aggregator().aggregate("k", &signals);
        assert_eq!(result.evidence_count, 10);
        assert_eq!(result.status, StatusValue::Yes);
    }

    #[test]
    fn adapter_threshold_is_kept() {
        let signals = vec![Signal::counted(3, 1).for_key("cvs").with_source("cvs")];
        let result = aggregator().aggregate("cvs", &signals);
        assert_eq!(result.status, StatusValue::Yes);
    }

    #[test]
    fn independent_sources_are_not_summed() {
        let signals = vec![
            Signal::counted(3, 5).for_key("k").with_source("site"),
            Signal::counted(3, 5).for_key("k").with_source("mirror"),
        ];
        let result = aggregator().aggregate("k", &signals);
        assert_eq!(result.status, StatusValue::Limited);
        assert_eq!(result.evidence_count, 6);
    }

    #[test]
    fn pages_from_one_source_are_summed() {
        let signals = vec![
            Signal::counted(3, 5).for_key("k").with_source("site"),
            Signal::counted(3, 5).for_key("k").with_source("site"),
        ];
        assert_eq!(aggregator().aggregate("k", &signals).status, StatusValue::Yes);

        // Same source, different stage thresholds: classified separately
        let staged = vec![
            Signal::counted(3, 5).for_key("k").with_source("site"),
            Signal::counted(3, 4).for_key("k").with_source("site"),
        ];
        assert_eq!(aggregator().aggregate("k", &staged).status, StatusValue::Limited);
    }

    #[test]
    fn unknown_does_not_downgrade() {
        let signals = vec![
            Signal::asserted(StatusValue::Unknown).for_key("k"),
            Signal::asserted(StatusValue::No).for_key("k"),
        ];
        assert_eq!(aggregator().aggregate("k", &signals).status, StatusValue::No);

        let only_unknown = vec![
            Signal::asserted(StatusValue::Unknown).for_key("k"),
            Signal::asserted(StatusValue::Unknown).for_key("k"),
        ];
        assert_eq!(
            aggregator().aggregate("k", &only_unknown).status,
            StatusValue::Unknown
        );
    }

    #[test]
    fn empty_group_is_no() {
        let result = aggregator().aggregate("never-seen", &Vec::<Signal>::new());
        assert_eq!(result.status, StatusValue::No);
        assert!(result.evidence.is_empty());
        assert_eq!(result.signal_count, 0);
    }

    #[test]
    fn multi_key_signal_feeds_each_group() {
        let signals = vec![
            Signal::asserted(StatusValue::Yes)
                .for_keys(["a", "b"])
                .with_tag("pfizer"),
            Signal::asserted(StatusValue::No).for_key("b").with_tag("moderna"),
        ];
        let groups = Aggregator::group(&signals);
        assert_eq!(groups["a"].len(), 1);
        assert_eq!(groups["b"].len(), 2);

        let results = aggregator().aggregate_all(&signals);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].key, "b");
        assert_eq!(results[1].tags.len(), 2);
    }

    #[test]
    fn manual_conflict_is_recorded() {
        let signals = vec![
            Signal::asserted(StatusValue::Call).for_key("k"),
            Signal::asserted(StatusValue::Waitlist).for_key("k"),
            Signal::asserted(StatusValue::Yes).for_key("k"),
        ];
        let result = aggregator().aggregate("k", &signals);
        assert_eq!(result.status, StatusValue::Waitlist);
        let conflict = result.conflict.unwrap();
        assert_eq!(conflict.kept, StatusValue::Waitlist);
        assert_eq!(conflict.reported, vec![StatusValue::Waitlist, StatusValue::Call]);
    }

    #[test]
    fn evidence_never_changes_status() {
        let signals = vec![
            Signal::asserted(StatusValue::No)
                .for_key("k")
                .with_evidence("Book now! 40 slots")
                .with_source("feed"),
        ];
        let result = aggregator().aggregate("k", &signals);
        assert_eq!(result.status, StatusValue::No);
        assert_eq!(result.evidence.len(), 1);
        assert_eq!(result.evidence.entries()[0].source.as_deref(), Some("feed"));
    }
}

//! Canonical, deduplicated schedulable locations

use crate::signal::Discovery;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A schedulable location, unique by `key` across one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub key: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub display_name: String,
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
    /// Loaded from the static location table rather than discovered
    #[serde(default)]
    pub preregistered: bool,
}

impl Entity {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Entity from the static location table
    pub fn preregistered(key: impl Into<String>) -> Self {
        Self {
            preregistered: true,
            ..Self::new(key)
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
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

    /// Fold a further discovery of this location into the entity.
    ///
    /// Descriptive attributes keep their first-seen value unless it is empty.
    pub fn absorb(&mut self, discovery: &Discovery) {
        fill(&mut self.address, &discovery.address);
        fill(&mut self.display_name, &discovery.display_name);
        fill(&mut self.county, &discovery.county);
        fill(&mut self.city, &discovery.city);
        if self.url.is_none() {
            self.url = discovery.url.clone();
        }
    }

    /// Add evidence from one signal: counts are summed, tags unioned
    pub fn record(&mut self, count: u32, tags: &BTreeSet<String>) {
        self.cumulative_count = self.cumulative_count.saturating_add(count);
        self.tags.extend(tags.iter().cloned());
    }
}

fn fill(slot: &mut String, candidate: &str) {
    if slot.trim().is_empty() && !candidate.trim().is_empty() {
        *slot = candidate.trim().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_keeps_first_seen_attributes() {
        let mut entity = Entity::new("k").with_address("1 First Ave").with_city("");
        entity.absorb(
            &Discovery::new("1 FIRST AVE.")
                .with_city("Tacoma")
                .with_name("Clinic"),
        );
        assert_eq!(entity.address, "1 First Ave");
        assert_eq!(entity.city, "Tacoma");
        assert_eq!(entity.display_name, "Clinic");
    }

    #[test]
    fn record_sums_and_unions() {
        let mut entity = Entity::new("k");
        let tags: BTreeSet<String> = ["pfizer".to_string()].into();
        entity.record(4, &tags);
        entity.record(6, &["moderna".to_string()].into());
        assert_eq!(entity.cumulative_count, 10);
        assert_eq!(entity.tags.len(), 2);
    }
}

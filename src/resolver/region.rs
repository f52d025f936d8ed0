//! Region lookup injected into the resolver

use std::collections::HashMap;

/// Maps a postal code to the county it lies in.
///
/// Implementations are immutable for the duration of a run.
pub trait RegionLookup: Send + Sync {
    /// County for `zip`, or `None` when unknown or ambiguous
    fn county_for_zip(&self, zip: &str) -> Option<String>;
}

/// Static zip → county table.
///
/// An empty county marks a zip that spans several counties; lookups for it
/// return `None` so a human can fill it in.
#[derive(Debug, Clone, Default)]
pub struct ZipCountyTable {
    counties: HashMap<String, String>,
}

impl ZipCountyTable {
    pub fn new(counties: HashMap<String, String>) -> Self {
        Self { counties }
    }

    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }
}

impl FromIterator<(String, String)> for ZipCountyTable {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl RegionLookup for ZipCountyTable {
    fn county_for_zip(&self, zip: &str) -> Option<String> {
        // ZIP+4 looks up by the five-digit prefix
        let zip5 = zip.split('-').next().unwrap_or(zip);
        self.counties
            .get(zip5)
            .filter(|county| !county.is_empty())
            .cloned()
    }
}

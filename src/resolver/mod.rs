//! Entity resolution
//!
//! Maps raw keys and addresses reported by adapters onto stable entity keys
//! and merges duplicate discoveries of the same location.
//!
//! Two discoveries share a key when their normalized addresses are equal, or
//! when a pre-registered key names them explicitly. New keys are derived
//! from the first and last token of the normalized address.

mod entity;
mod normalize;
mod region;

pub use entity::Entity;
pub use normalize::{derive_key, normalize_address, AddressParts};
pub use region::{RegionLookup, ZipCountyTable};

use crate::signal::Signal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Default prefix for keys derived from addresses
pub const DEFAULT_KEY_PREFIX: &str = "auto";

/// Errors from resolving a single discovery
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("address has no usable tokens: {0:?}")]
    EmptyAddress(String),

    #[error("pre-registered key is empty")]
    EmptyKey,
}

/// Two different addresses that derived the same key.
///
/// The incoming address is folded into the existing entity; the collision is
/// kept for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCollision {
    pub key: String,
    pub existing_address: String,
    pub incoming_address: String,
}

/// Run-scoped address → key table plus the entities it resolves to.
///
/// Not internally synchronized: the orchestrator serializes writers.
pub struct EntityResolver {
    key_prefix: String,
    regions: Arc<dyn RegionLookup>,
    addresses: HashMap<String, String>,
    entities: BTreeMap<String, Entity>,
    collisions: Vec<KeyCollision>,
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl EntityResolver {
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            regions: Arc::new(ZipCountyTable::default()),
            addresses: HashMap::new(),
            entities: BTreeMap::new(),
            collisions: Vec::new(),
        }
    }

    /// Use a region lookup to fill in missing counties
    pub fn with_regions(mut self, regions: Arc<dyn RegionLookup>) -> Self {
        self.regions = regions;
        self
    }

    /// Add an entity from the static location table.
    ///
    /// Its address (if any) is indexed so later discoveries at the same
    /// address resolve to this key.
    pub fn register(&mut self, entity: Entity) {
        let normalized = normalize_address(&entity.address);
        let key = entity.key.clone();

        match self.entities.get_mut(&key) {
            Some(existing) => {
                existing.preregistered = true;
                absorb_entity(existing, &entity);
            }
            None => {
                self.entities.insert(key.clone(), entity);
            }
        }
        if let Some(stored) = self.entities.get_mut(&key) {
            fill_region(stored, self.regions.as_ref());
        }
        if !normalized.is_empty() {
            self.addresses.entry(normalized).or_insert(key);
        }
    }

    /// Map a raw key or address to an entity key.
    ///
    /// A pre-registered key is authoritative and returned unchanged.
    /// Otherwise the normalized address is looked up, and a new key is derived
    /// and registered if it is not known yet.
    pub fn resolve(
        &mut self,
        raw: &str,
        preregistered: Option<&str>,
    ) -> Result<String, ResolveError> {
        if let Some(key) = preregistered {
            let key = key.trim();
            if key.is_empty() {
                return Err(ResolveError::EmptyKey);
            }
            self.entities
                .entry(key.to_string())
                .or_insert_with(|| Entity::new(key));
            let normalized = normalize_address(raw);
            if !normalized.is_empty() {
                self.addresses
                    .entry(normalized)
                    .or_insert_with(|| key.to_string());
            }
            return Ok(key.to_string());
        }

        if self.entities.contains_key(raw) {
            return Ok(raw.to_string());
        }

        let normalized = normalize_address(raw);
        if let Some(key) = self.addresses.get(&normalized) {
            return Ok(key.clone());
        }

        let key = derive_key(&self.key_prefix, &normalized)
            .ok_or_else(|| ResolveError::EmptyAddress(raw.to_string()))?;

        match self.entities.get(&key) {
            Some(existing) => {
                let existing_normalized = normalize_address(&existing.address);
                if !existing_normalized.is_empty() && existing_normalized != normalized {
                    warn!(
                        key = %key,
                        existing = %existing.address,
                        incoming = %raw,
                        "derived key collision; keeping first-seen entity"
                    );
                    self.collisions.push(KeyCollision {
                        key: key.clone(),
                        existing_address: existing.address.clone(),
                        incoming_address: raw.trim().to_string(),
                    });
                }
            }
            None => {
                debug!(key = %key, address = %raw, "registered derived key");
                self.entities
                    .insert(key.clone(), Entity::new(&key).with_address(raw.trim()));
            }
        }

        self.addresses.insert(normalized, key.clone());
        Ok(key)
    }

    /// Resolve every discovery in `signal` into `entity_keys` and merge the
    /// signal's count and tags into each entity it names.
    ///
    /// Discoveries that cannot be resolved are dropped and returned.
    pub fn resolve_signal(&mut self, signal: &mut Signal) -> Vec<ResolveError> {
        let mut errors = Vec::new();

        for key in signal.entity_keys.clone() {
            if let Err(e) = self.resolve("", Some(&key)) {
                signal.entity_keys.remove(&key);
                errors.push(e);
            }
        }

        for discovery in std::mem::take(&mut signal.discoveries) {
            match self.resolve(&discovery.address, None) {
                Ok(key) => {
                    if let Some(entity) = self.entities.get_mut(&key) {
                        entity.absorb(&discovery);
                        fill_region(entity, self.regions.as_ref());
                    }
                    signal.entity_keys.insert(key);
                }
                Err(e) => errors.push(e),
            }
        }

        for key in &signal.entity_keys {
            if let Some(entity) = self.entities.get_mut(key) {
                entity.record(signal.evidence_count, &signal.tags);
            }
        }

        errors
    }

    pub fn entity(&self, key: &str) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// All entities, ordered by key
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn collisions(&self) -> &[KeyCollision] {
        &self.collisions
    }
}

fn absorb_entity(existing: &mut Entity, incoming: &Entity) {
    let as_discovery = crate::signal::Discovery {
        address: incoming.address.clone(),
        display_name: incoming.display_name.clone(),
        county: incoming.county.clone(),
        city: incoming.city.clone(),
        url: incoming.url.clone(),
    };
    existing.absorb(&as_discovery);
    existing.tags.extend(incoming.tags.iter().cloned());
}

/// Fill an empty city from the address and an empty county from the zip
fn fill_region(entity: &mut Entity, regions: &dyn RegionLookup) {
    if !entity.city.is_empty() && !entity.county.is_empty() {
        return;
    }
    let parts = AddressParts::parse(&entity.address);
    if entity.city.is_empty() {
        entity.city = parts.city;
    }
    if entity.county.is_empty() {
        if let Some(county) = parts.zip.as_deref().and_then(|zip| regions.county_for_zip(zip)) {
            entity.county = county;
        }
    }
}

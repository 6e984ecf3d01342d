//! Query-to-category lookup table.
//!
//! The map is built once at startup from an ordered entry list and never mutated
//! afterwards. Enumeration order is the source order, which makes prefix lookups
//! reproducible: the first key in source order wins.

#![forbid(unsafe_code)]

use indexmap::IndexMap;
use tracing::debug;

use crate::CategoryId;

pub const VEHICLES: &str = "Vehicles";
pub const REAL_ESTATE: &str = "Real Estate";
pub const ELECTRONICS: &str = "Electronics";
pub const SERVICES: &str = "Services";
pub const JOBS: &str = "Jobs";
pub const FURNITURE: &str = "Furniture";

/// Compiled-in marketplace table. Order matters for prefix tie-breaks.
const BUILTIN: &[(&str, &str)] = &[
    ("car", VEHICLES),
    ("cars", VEHICLES),
    ("motorcycle", VEHICLES),
    ("bike", VEHICLES),
    ("truck", VEHICLES),
    ("van", VEHICLES),
    ("bus", VEHICLES),
    ("tyres", VEHICLES),
    ("apartment", REAL_ESTATE),
    ("house", REAL_ESTATE),
    ("land", REAL_ESTATE),
    ("office space", REAL_ESTATE),
    ("shop for rent", REAL_ESTATE),
    ("room", REAL_ESTATE),
    ("phone", ELECTRONICS),
    ("iphone", ELECTRONICS),
    ("laptop", ELECTRONICS),
    ("television", ELECTRONICS),
    ("tv", ELECTRONICS),
    ("camera", ELECTRONICS),
    ("headphones", ELECTRONICS),
    ("plumber", SERVICES),
    ("electrician", SERVICES),
    ("cleaning", SERVICES),
    ("care", SERVICES),
    ("tutor", SERVICES),
    ("movers", SERVICES),
    ("mechanic", SERVICES),
    ("job", JOBS),
    ("jobs", JOBS),
    ("driver", JOBS),
    ("developer", JOBS),
    ("nurse", JOBS),
    ("accountant", JOBS),
    ("sofa", FURNITURE),
    ("bed", FURNITURE),
    ("wardrobe", FURNITURE),
    ("dining table", FURNITURE),
];

/// Lowercase and trim. Idempotent.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate category key {key:?}: source entries {first:?} and {second:?} normalize to the same key")]
    DuplicateKey { key: String, first: String, second: String },
    #[error("category key at position {0} is empty after normalization")]
    EmptyKey(usize),
}

/// Immutable normalized-key -> category table with insertion-ordered iteration.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    entries: IndexMap<String, CategoryId>,
}

impl CategoryMap {
    /// Build from `(raw key, category)` pairs, rejecting keys that collide after normalization.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CategoryId>,
    {
        let mut map: IndexMap<String, CategoryId> = IndexMap::new();
        let mut raw_keys: Vec<String> = Vec::new();
        for (pos, (raw, cat)) in entries.into_iter().enumerate() {
            let raw = raw.as_ref();
            let key = normalize(raw);
            if key.is_empty() {
                return Err(CatalogError::EmptyKey(pos));
            }
            if let Some(idx) = map.get_index_of(&key) {
                return Err(CatalogError::DuplicateKey { key, first: raw_keys[idx].clone(), second: raw.to_string() });
            }
            map.insert(key, cat.into());
            raw_keys.push(raw.to_string());
        }
        debug!(keys = map.len(), "category map built");
        Ok(Self { entries: map })
    }

    /// The compiled-in marketplace table.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_entries(BUILTIN.iter().copied())
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Exact lookup of an already-normalized key.
    pub fn get(&self, key: &str) -> Option<&CategoryId> { self.entries.get(key) }

    /// Entries in enumeration (source) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys starting with `prefix`, in enumeration order.
    pub fn prefixed<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a CategoryId)> + 'a {
        self.iter().filter(move |(k, _)| k.starts_with(prefix))
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<CategoryId> {
        let mut out: Vec<CategoryId> = Vec::new();
        for cat in self.entries.values() {
            if !out.contains(cat) {
                out.push(cat.clone());
            }
        }
        out
    }

    /// Keys mapped to `category`, in enumeration order.
    pub fn keys_for<'a>(&'a self, category: &'a CategoryId) -> impl Iterator<Item = &'a str> + 'a {
        self.entries.iter().filter(move |(_, v)| *v == category).map(|(k, _)| k.as_str())
    }
}

#![forbid(unsafe_code)]

use std::sync::Arc;

use souk_core::{normalize, CategoryId, CategoryMap};

/// Maps a raw user query to a category using exact match, then first prefix match.
#[derive(Debug, Clone)]
pub struct QueryCategoryResolver {
    map: Arc<CategoryMap>,
}

impl QueryCategoryResolver {
    pub fn new(map: Arc<CategoryMap>) -> Self { Self { map } }

    pub fn map(&self) -> &CategoryMap { &self.map }

    /// Blank queries resolve to `None` instead of prefix-matching the first key.
    pub fn resolve(&self, query: &str) -> Option<CategoryId> {
        let q = normalize(query);
        if q.is_empty() {
            return None;
        }
        if let Some(cat) = self.map.get(&q) {
            return Some(cat.clone());
        }
        let hit = self.map.prefixed(&q).next().map(|(_, cat)| cat.clone());
        hit
    }
}

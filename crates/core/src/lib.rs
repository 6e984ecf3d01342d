//! Souk core types: queries, suggestions, listings and the category catalogue.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod fields;

pub use catalog::{normalize, CatalogError, CategoryMap};

/// Stable tag grouping listings (e.g. "Vehicles", "Electronics").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for CategoryId {
    fn from(v: &str) -> Self { Self(v.to_string()) }
}

impl PartialEq<&str> for CategoryId {
    fn eq(&self, other: &&str) -> bool { self.0 == *other }
}

/// A user search request. `limit` is kept signed so that zero and negative
/// inputs can be told apart from "absent" and replaced by the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SearchQuery {
    pub text: String,
    pub location: Option<String>,
    pub limit: Option<i64>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), location: None, limit: None }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Where a suggestion came from. Declaration order is the render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionOrigin {
    Category,
    Service,
    Trending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    pub origin: SuggestionOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
}

/// Ordered suggestion list: categories, then services, then trending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SuggestionResult {
    pub category: Option<CategoryId>,
    pub items: Vec<Suggestion>,
}

impl SuggestionResult {
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn by_origin(&self, origin: SuggestionOrigin) -> impl Iterator<Item = &Suggestion> {
        self.items.iter().filter(move |s| s.origin == origin)
    }
}

/// A service offering indexed for suggestions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceListing {
    pub id: String,
    pub title: String,
    pub category: CategoryId,
    pub city: Option<String>,
}

/// Sponsored entry returned next to search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    pub title: String,
    pub category: CategoryId,
    pub city: Option<String>,
    pub url: String,
}

/// Aggregated trending query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub query: String,
    pub city: Option<String>,
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

/// Server-pushed event delivered over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub id: uuid::Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { id: uuid::Uuid::new_v4(), topic: topic.into(), payload, at: Utc::now() }
    }
}

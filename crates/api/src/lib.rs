//! Souk public API façade (in-process).
//!
//! This crate defines the stable trait and types frontends (HTTP server, CLI) depend on.
//! `InProcApi` wires the search and realtime crates directly; `MockApi` serves canned data.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use souk_core::fields::{self, CategorySpec, FieldDescriptor};
use souk_core::{Ad, CategoryId, CategoryMap, RealtimeEvent, SearchQuery, Suggestion, SuggestionResult};
use souk_realtime::NotificationHub;
use souk_search::memory::DEFAULT_TRENDING_MAX_ENTRIES;
use souk_search::{
    AdBook, QueryCategoryResolver, ServiceCatalog, SourceError, SuggestConfig, SuggestionService, TrendingLog,
};
use tracing::{info, warn};

/// Longest accepted query text, in characters.
pub const MAX_QUERY_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    pub limit: usize,
    pub took_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestResponse {
    pub query: String,
    pub category: Option<CategoryId>,
    pub suggestions: Vec<Suggestion>,
    pub meta: ResponseMeta,
}

/// API errors suitable for transport over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum MarketError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<SourceError> for MarketError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Unavailable(m) => MarketError::Unavailable(m),
            SourceError::Failed(m) => MarketError::Internal(m),
        }
    }
}

pub type MarketResult<T> = Result<T, MarketError>;

/// Declarative marketplace API surface.
#[async_trait::async_trait]
pub trait MarketApi: Send + Sync {
    /// Categories with subcategories and field descriptors, in catalogue order.
    async fn categories(&self) -> MarketResult<Vec<CategorySpec>>;

    /// Field descriptors for one category. Unknown categories are `NotFound`.
    async fn fields(&self, category: &str) -> MarketResult<Vec<FieldDescriptor>>;

    async fn resolve(&self, query: &str) -> MarketResult<Option<CategoryId>>;

    /// Search-assist suggestions; served queries feed the trending log.
    async fn suggest(&self, query: SearchQuery) -> MarketResult<SuggestResponse>;

    async fn trending(&self, city: Option<&str>, limit: Option<i64>) -> MarketResult<Vec<String>>;

    async fn ads(&self, query: SearchQuery) -> MarketResult<Vec<Ad>>;

    /// Push a realtime event to a user's live connections; returns the delivery count.
    async fn notify(&self, user_id: &str, topic: &str, payload: serde_json::Value) -> MarketResult<usize>;
}

fn validate_query(q: &SearchQuery) -> MarketResult<()> {
    if q.text.chars().count() > MAX_QUERY_CHARS {
        return Err(MarketError::Validation(format!("query longer than {MAX_QUERY_CHARS} characters")));
    }
    Ok(())
}

// ----------------- In-process implementation -----------------

/// In-process implementation that calls internal crates directly.
pub struct InProcApi {
    map: Arc<CategoryMap>,
    service: Arc<SuggestionService>,
    hub: Arc<NotificationHub>,
}

impl InProcApi {
    pub fn new(map: Arc<CategoryMap>, service: Arc<SuggestionService>, hub: Arc<NotificationHub>) -> Self {
        Self { map, service, hub }
    }

    /// Compiled-in category table with the demo in-memory sources.
    /// A colliding category table fails here, at startup.
    pub fn builtin(cfg: SuggestConfig) -> anyhow::Result<Self> {
        let map = Arc::new(CategoryMap::builtin().context("building category map")?);
        let window = std::env::var("SOUK_TRENDING_WINDOW_SECS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map(chrono::Duration::seconds);
        let max_entries = std::env::var("SOUK_TRENDING_MAX_ENTRIES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_TRENDING_MAX_ENTRIES);
        let service = SuggestionService::new(
            QueryCategoryResolver::new(Arc::clone(&map)),
            Arc::new(ServiceCatalog::sample()),
            Arc::new(TrendingLog::new(window).with_max_entries(max_entries)),
            Arc::new(AdBook::sample()),
            cfg,
        );
        info!(keys = map.len(), categories = map.categories().len(), "api: category map loaded");
        Ok(Self::new(map, Arc::new(service), Arc::new(NotificationHub::default())))
    }

    pub fn hub(&self) -> Arc<NotificationHub> { Arc::clone(&self.hub) }
    pub fn service(&self) -> Arc<SuggestionService> { Arc::clone(&self.service) }
}

#[async_trait::async_trait]
impl MarketApi for InProcApi {
    async fn categories(&self) -> MarketResult<Vec<CategorySpec>> { Ok(fields::catalogue(&self.map)) }

    async fn fields(&self, category: &str) -> MarketResult<Vec<FieldDescriptor>> {
        let id = CategoryId::from(category);
        if !self.map.categories().contains(&id) {
            return Err(MarketError::NotFound(format!("category {category:?}")));
        }
        Ok(fields::fields_for(category))
    }

    async fn resolve(&self, query: &str) -> MarketResult<Option<CategoryId>> { Ok(self.service.resolver().resolve(query)) }

    async fn suggest(&self, query: SearchQuery) -> MarketResult<SuggestResponse> {
        let t0 = Instant::now();
        validate_query(&query)?;
        let limit = self.service.config().effective_limit(query.limit);
        let SuggestionResult { category, items } = self.service.suggestions(&query).await?;
        if let Err(e) = self.service.record_search(&query).await {
            warn!(error = %e, "api: trending record failed");
        }
        let took_ms = t0.elapsed().as_millis() as u64;
        info!(q = %query.text, category = ?category, count = items.len(), took_ms, "api: suggest ok");
        Ok(SuggestResponse { query: query.text, category, suggestions: items, meta: ResponseMeta { limit, took_ms } })
    }

    async fn trending(&self, city: Option<&str>, limit: Option<i64>) -> MarketResult<Vec<String>> {
        Ok(self.service.trending_searches(city, limit).await?.collect())
    }

    async fn ads(&self, query: SearchQuery) -> MarketResult<Vec<Ad>> {
        validate_query(&query)?;
        Ok(self.service.ads(&query).await?)
    }

    async fn notify(&self, user_id: &str, topic: &str, payload: serde_json::Value) -> MarketResult<usize> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(MarketError::Validation("user id is required".into()));
        }
        if topic.trim().is_empty() {
            return Err(MarketError::Validation("topic is required".into()));
        }
        let delivered = self.hub.publish(user_id, RealtimeEvent::new(topic.trim(), payload));
        metrics::counter!("realtime_notify_total", 1u64);
        info!(user = %user_id, topic = %topic, delivered, "api: notify");
        Ok(delivered)
    }
}

// ----------------- Mock implementation -----------------

/// Simple in-memory mock implementation for tests.
#[derive(Default)]
pub struct MockApi {
    pub categories: Vec<CategorySpec>,
    pub category: Option<CategoryId>,
    pub suggestions: Vec<Suggestion>,
    pub trending: Vec<String>,
    pub ads: Vec<Ad>,
    pub delivered: usize,
    pub fail_with: Option<MarketError>,
}

impl MockApi {
    pub fn new() -> Self { Self::default() }

    fn check(&self) -> MarketResult<()> {
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl MarketApi for MockApi {
    async fn categories(&self) -> MarketResult<Vec<CategorySpec>> {
        self.check()?;
        Ok(self.categories.clone())
    }

    async fn fields(&self, category: &str) -> MarketResult<Vec<FieldDescriptor>> {
        self.check()?;
        self.categories
            .iter()
            .find(|c| c.id.as_str() == category)
            .map(|c| c.fields.clone())
            .ok_or_else(|| MarketError::NotFound(format!("category {category:?}")))
    }

    async fn resolve(&self, _query: &str) -> MarketResult<Option<CategoryId>> {
        self.check()?;
        Ok(self.category.clone())
    }

    async fn suggest(&self, query: SearchQuery) -> MarketResult<SuggestResponse> {
        self.check()?;
        Ok(SuggestResponse {
            query: query.text,
            category: self.category.clone(),
            suggestions: self.suggestions.clone(),
            meta: ResponseMeta::default(),
        })
    }

    async fn trending(&self, _city: Option<&str>, _limit: Option<i64>) -> MarketResult<Vec<String>> {
        self.check()?;
        Ok(self.trending.clone())
    }

    async fn ads(&self, _query: SearchQuery) -> MarketResult<Vec<Ad>> {
        self.check()?;
        Ok(self.ads.clone())
    }

    async fn notify(&self, _user_id: &str, _topic: &str, _payload: serde_json::Value) -> MarketResult<usize> {
        self.check()?;
        Ok(self.delivered)
    }
}

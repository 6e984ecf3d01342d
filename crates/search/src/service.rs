#![forbid(unsafe_code)]

use std::iter::FusedIterator;
use std::sync::Arc;
use std::time::Instant;

use souk_core::{normalize, Ad, SearchQuery, Suggestion, SuggestionOrigin, SuggestionResult, TrendingEntry};
use tracing::debug;

use crate::resolver::QueryCategoryResolver;
use crate::sources::{AdSource, ServiceSource, SourceError, TrendingSource};

/// Limits applied to suggestion and trending requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub trending_default_limit: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self { default_limit: 10, max_limit: 50, trending_default_limit: 10 }
    }
}

impl SuggestConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let env = |k: &str| std::env::var(k).ok().and_then(|s| s.parse::<usize>().ok()).filter(|v| *v > 0);
        let max_limit = env("SOUK_SUGGEST_MAX_LIMIT").unwrap_or(d.max_limit);
        Self {
            default_limit: env("SOUK_SUGGEST_DEFAULT_LIMIT").unwrap_or(d.default_limit).min(max_limit),
            max_limit,
            trending_default_limit: env("SOUK_TRENDING_DEFAULT_LIMIT").unwrap_or(d.trending_default_limit).min(max_limit),
        }
    }

    /// Absent, zero or negative requests fall back to the default; everything is clamped to `max_limit`.
    pub fn effective_limit(&self, requested: Option<i64>) -> usize {
        self.clamp(requested, self.default_limit)
    }

    pub fn effective_trending_limit(&self, requested: Option<i64>) -> usize {
        self.clamp(requested, self.trending_default_limit)
    }

    fn clamp(&self, requested: Option<i64>, default: usize) -> usize {
        let v = match requested {
            Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
            _ => default,
        };
        v.min(self.max_limit)
    }
}

/// Single-pass sequence of trending query strings, most frequent first.
#[derive(Debug)]
pub struct TrendingSearches {
    inner: std::vec::IntoIter<TrendingEntry>,
}

impl TrendingSearches {
    fn new(entries: Vec<TrendingEntry>) -> Self { Self { inner: entries.into_iter() } }
}

impl Iterator for TrendingSearches {
    type Item = String;

    fn next(&mut self) -> Option<String> { self.inner.next().map(|e| e.query) }

    fn size_hint(&self) -> (usize, Option<usize>) { self.inner.size_hint() }
}

impl ExactSizeIterator for TrendingSearches {}
impl FusedIterator for TrendingSearches {}

/// Orchestrates category resolution and the service, trending and ad sources.
pub struct SuggestionService {
    resolver: QueryCategoryResolver,
    services: Arc<dyn ServiceSource>,
    trending: Arc<dyn TrendingSource>,
    ads: Arc<dyn AdSource>,
    cfg: SuggestConfig,
}

impl SuggestionService {
    pub fn new(
        resolver: QueryCategoryResolver,
        services: Arc<dyn ServiceSource>,
        trending: Arc<dyn TrendingSource>,
        ads: Arc<dyn AdSource>,
        cfg: SuggestConfig,
    ) -> Self {
        Self { resolver, services, trending, ads, cfg }
    }

    pub fn resolver(&self) -> &QueryCategoryResolver { &self.resolver }
    pub fn config(&self) -> SuggestConfig { self.cfg }

    /// Categories first, then services, then trending; capped at the effective limit.
    /// An unmatched category only drops the category group.
    pub async fn suggestions(&self, query: &SearchQuery) -> Result<SuggestionResult, SourceError> {
        let started = Instant::now();
        let limit = self.cfg.effective_limit(query.limit);
        let text = normalize(&query.text);
        let category = self.resolver.resolve(&text);
        let location = query.location.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let mut items: Vec<Suggestion> = Vec::with_capacity(limit);
        if let Some(cat) = category.as_ref() {
            items.push(Suggestion { text: cat.to_string(), origin: SuggestionOrigin::Category, category: Some(cat.clone()) });
            for (key, c) in self.resolver.map().prefixed(&text) {
                if c == cat {
                    items.push(Suggestion { text: key.to_string(), origin: SuggestionOrigin::Category, category: Some(c.clone()) });
                }
            }
        }

        let (services, trending) = futures::try_join!(
            self.services.services(&text, category.as_ref(), location, limit),
            // Over-fetch: trending entries are filtered by the query text below.
            self.trending.trending(location, self.cfg.max_limit),
        )?;

        for listing in services {
            items.push(Suggestion { text: listing.title, origin: SuggestionOrigin::Service, category: Some(listing.category) });
        }
        for entry in trending {
            if !text.is_empty() && !entry.query.contains(&text) {
                continue;
            }
            if items.iter().any(|s| s.text.eq_ignore_ascii_case(&entry.query)) {
                continue;
            }
            let cat = self.resolver.resolve(&entry.query);
            items.push(Suggestion { text: entry.query, origin: SuggestionOrigin::Trending, category: cat });
        }
        items.truncate(limit);

        let elapsed = started.elapsed();
        metrics::histogram!("search_eval_ms", elapsed.as_secs_f64() * 1_000.0);
        metrics::histogram!("suggest_items", items.len() as f64);
        debug!(query = %text, category = ?category, items = items.len(), limit, "suggestions served");
        Ok(SuggestionResult { category, items })
    }

    pub async fn trending_searches(&self, city: Option<&str>, limit: Option<i64>) -> Result<TrendingSearches, SourceError> {
        let limit = self.cfg.effective_trending_limit(limit);
        let city = city.map(str::trim).filter(|s| !s.is_empty());
        let mut entries = self.trending.trending(city, limit).await?;
        entries.truncate(limit);
        Ok(TrendingSearches::new(entries))
    }

    /// Pass-through to the ad source with the resolved category attached.
    pub async fn ads(&self, query: &SearchQuery) -> Result<Vec<Ad>, SourceError> {
        let limit = self.cfg.effective_limit(query.limit);
        let category = self.resolver.resolve(&query.text);
        let city = query.location.as_deref().map(str::trim).filter(|s| !s.is_empty());
        self.ads.ads(&query.text, category.as_ref(), city, limit).await
    }

    /// Feed a served query into the trending source.
    pub async fn record_search(&self, query: &SearchQuery) -> Result<(), SourceError> {
        if normalize(&query.text).is_empty() {
            return Ok(());
        }
        self.trending.record(&query.text, query.location.as_deref()).await
    }
}

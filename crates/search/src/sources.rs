//! Collaborator seams for the suggestion flow.

#![forbid(unsafe_code)]

use souk_core::{Ad, CategoryId, ServiceListing, TrendingEntry};

/// Failure reported by a collaborator. Passed upward unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("source failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
pub trait ServiceSource: Send + Sync {
    /// Service listings relevant to `text`, best first. `category` is the resolved
    /// category of the query, if any, and should be favoured.
    async fn services(
        &self,
        text: &str,
        category: Option<&CategoryId>,
        location: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ServiceListing>, SourceError>;
}

#[async_trait::async_trait]
pub trait TrendingSource: Send + Sync {
    /// Most frequent queries first; ties broken by recency.
    async fn trending(&self, city: Option<&str>, limit: usize) -> Result<Vec<TrendingEntry>, SourceError>;

    async fn record(&self, query: &str, city: Option<&str>) -> Result<(), SourceError>;
}

#[async_trait::async_trait]
pub trait AdSource: Send + Sync {
    async fn ads(
        &self,
        text: &str,
        category: Option<&CategoryId>,
        city: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Ad>, SourceError>;
}

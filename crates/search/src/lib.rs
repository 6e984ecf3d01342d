//! Souk search: query-to-category resolution and search-assist suggestions.
//!
//! The suggestion flow classifies a query with [`QueryCategoryResolver`], then
//! fans out to the service, trending and ad sources. Sources are traits so the
//! HTTP layer can run against the in-memory implementations in [`memory`] or
//! against a database-backed store.

#![forbid(unsafe_code)]

pub mod memory;
pub mod resolver;
pub mod service;
pub mod sources;

pub use memory::{AdBook, ServiceCatalog, TrendingLog};
pub use resolver::QueryCategoryResolver;
pub use service::{SuggestConfig, SuggestionService, TrendingSearches};
pub use sources::{AdSource, ServiceSource, SourceError, TrendingSource};

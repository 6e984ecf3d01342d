//! Souk HTTP surface: search assist, trending, ads, category browser and admin notifications.

#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use souk_api::{MarketApi, SuggestResponse};
use souk_core::fields::CategorySpec;
use souk_core::{Ad, SearchQuery};
use tracing::info;

pub mod config;
pub mod error;
pub mod limiter;

pub use config::ServerConfig;
pub use error::ApiErrorResponse;
pub use limiter::{RateLimitConfig, RateLimiter};

type ApiResult<T> = Result<T, ApiErrorResponse>;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn MarketApi>,
    pub search_limiter: Arc<RateLimiter>,
    pub trending_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(api: Arc<dyn MarketApi>, cfg: &ServerConfig) -> Self {
        Self {
            api,
            search_limiter: Arc::new(
                RateLimiter::new("search", cfg.search_rate)
                    .trust_forwarded(cfg.trust_forwarded)
                    .with_max_clients(cfg.max_clients),
            ),
            trending_limiter: Arc::new(
                RateLimiter::new("trending", cfg.trending_rate)
                    .trust_forwarded(cfg.trust_forwarded)
                    .with_max_clients(cfg.max_clients),
            ),
        }
    }
}

/// Search and ads share one bucket per client; trending has its own.
pub fn router(state: AppState) -> Router {
    let search = Router::new()
        .route("/api/search", get(search))
        .route("/api/search/ads", get(search_ads))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state.search_limiter), limiter::enforce));
    let trending = Router::new()
        .route("/api/search/trending", get(trending))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state.trending_limiter), limiter::enforce));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/categories", get(categories))
        .route("/api/notify/{user_id}", post(notify))
        .merge(search)
        .merge(trending)
        .with_state(state)
}

/// Non-numeric limits are treated like absent ones and get the default.
fn parse_limit(raw: Option<&str>) -> Option<i64> { raw.and_then(|s| s.trim().parse::<i64>().ok()) }

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub limit: Option<String>,
}

impl SearchParams {
    fn into_query(self) -> SearchQuery {
        let limit = parse_limit(self.limit.as_deref());
        SearchQuery { text: self.q.unwrap_or_default(), location: self.location.or(self.city), limit }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendingParams {
    pub city: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
struct AdsBody {
    ads: Vec<Ad>,
}

#[derive(Debug, Serialize)]
struct TrendingBody {
    trending: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CategoriesBody {
    categories: Vec<CategorySpec>,
}

#[derive(Debug, Deserialize)]
pub struct NotifyBody {
    pub topic: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct NotifyAck {
    delivered: usize,
}

async fn healthz() -> &'static str { "ok" }

async fn search(State(st): State<AppState>, Query(p): Query<SearchParams>) -> ApiResult<Json<SuggestResponse>> {
    Ok(Json(st.api.suggest(p.into_query()).await?))
}

async fn search_ads(State(st): State<AppState>, Query(p): Query<SearchParams>) -> ApiResult<Json<AdsBody>> {
    let ads = st.api.ads(p.into_query()).await?;
    Ok(Json(AdsBody { ads }))
}

async fn trending(State(st): State<AppState>, Query(p): Query<TrendingParams>) -> ApiResult<Json<TrendingBody>> {
    let limit = parse_limit(p.limit.as_deref());
    let trending = st.api.trending(p.city.as_deref(), limit).await?;
    Ok(Json(TrendingBody { trending }))
}

async fn categories(State(st): State<AppState>) -> ApiResult<Json<CategoriesBody>> {
    Ok(Json(CategoriesBody { categories: st.api.categories().await? }))
}

async fn notify(
    State(st): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<NotifyBody>,
) -> ApiResult<(StatusCode, Json<NotifyAck>)> {
    let delivered = st.api.notify(&user_id, &body.topic, body.payload).await?;
    info!(user = %user_id, topic = %body.topic, delivered, "notify accepted");
    Ok((StatusCode::ACCEPTED, Json(NotifyAck { delivered })))
}

//! Per-client token buckets.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::rate_limited;

/// Client key used when neither a forwarded address nor a peer address is known.
pub const ANONYMOUS: &str = "anonymous";

pub const DEFAULT_MAX_CLIENTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refilled(&self, now: Instant, cfg: &RateLimitConfig) -> f64 {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * cfg.refill_per_sec).min(cfg.capacity)
    }
}

pub struct RateLimiter {
    scope: &'static str,
    cfg: RateLimitConfig,
    trust_forwarded: bool,
    max_clients: usize,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(scope: &'static str, cfg: RateLimitConfig) -> Self {
        Self { scope, cfg, trust_forwarded: false, max_clients: DEFAULT_MAX_CLIENTS, buckets: Mutex::new(HashMap::new()) }
    }

    /// Key clients on the first `x-forwarded-for` hop. Only safe behind a proxy that sets it.
    pub fn trust_forwarded(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients.max(1);
        self
    }

    pub fn scope(&self) -> &'static str { self.scope }

    pub async fn tracked_clients(&self) -> usize { self.buckets.lock().await.len() }

    /// Make room for a new client: drop buckets that refilled to capacity, then the
    /// least recently used ones.
    fn prune(&self, buckets: &mut HashMap<String, Bucket>, now: Instant) {
        let cfg = self.cfg;
        buckets.retain(|_, b| b.refilled(now, &cfg) < cfg.capacity);
        while buckets.len() >= self.max_clients {
            let Some(lru) = buckets.iter().min_by_key(|(_, b)| b.last_refill).map(|(k, _)| k.clone()) else {
                break;
            };
            buckets.remove(&lru);
        }
        debug!(scope = self.scope, clients = buckets.len(), "rate limiter pruned");
    }

    /// Take one token for `key`; `false` when the bucket is empty.
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut lock = self.buckets.lock().await;
        if !lock.contains_key(key) && lock.len() >= self.max_clients {
            self.prune(&mut lock, now);
        }
        let bucket = lock
            .entry(key.to_string())
            .or_insert_with(|| Bucket { tokens: self.cfg.capacity, last_refill: now });
        bucket.tokens = bucket.refilled(now, &self.cfg);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// First hop of `x-forwarded-for`, when it looks like an address.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    if first.is_empty() || first.len() > 64 {
        return None;
    }
    first
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
        .then(|| first.to_string())
}

/// Peer address, or the forwarded client when `trust_forwarded` is set.
pub fn client_key(req: &Request, trust_forwarded: bool) -> String {
    trust_forwarded
        .then(|| forwarded_for(req.headers()))
        .flatten()
        .or_else(|| req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip().to_string()))
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// Rejects with 429 before the handler runs when the caller's bucket is empty.
pub async fn enforce(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    let key = client_key(&req, limiter.trust_forwarded);
    if !limiter.allow(&key).await {
        metrics::counter!("rate_limited_total", 1u64, "scope" => limiter.scope());
        debug!(scope = limiter.scope(), client = %key, "rate limit exceeded");
        return rate_limited().into_response();
    }
    next.run(req).await
}

#![forbid(unsafe_code)]

use std::net::SocketAddr;

use souk_search::SuggestConfig;

use crate::limiter::{RateLimitConfig, DEFAULT_MAX_CLIENTS};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|s| s.parse::<f64>().ok()).filter(|v| *v > 0.0).unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub suggest: SuggestConfig,
    /// Shared by `/api/search` and `/api/search/ads`.
    pub search_rate: RateLimitConfig,
    pub trending_rate: RateLimitConfig,
    /// Rate-limit on the first `x-forwarded-for` hop instead of the peer address.
    pub trust_forwarded: bool,
    /// Bucket ceiling per limiter scope.
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            suggest: SuggestConfig::default(),
            search_rate: RateLimitConfig { capacity: 30.0, refill_per_sec: 10.0 },
            trending_rate: RateLimitConfig { capacity: 10.0, refill_per_sec: 2.0 },
            trust_forwarded: false,
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

impl ServerConfig {
    /// Invalid values fall back to their defaults with a warning.
    pub fn from_env() -> Self {
        let d = Self::default();
        let bind = match std::env::var("SOUK_BIND") {
            Ok(raw) => raw.parse::<SocketAddr>().unwrap_or_else(|_| {
                tracing::warn!(addr = %raw, default = DEFAULT_BIND, "invalid SOUK_BIND; expected host:port");
                d.bind
            }),
            Err(_) => d.bind,
        };
        Self {
            bind,
            suggest: SuggestConfig::from_env(),
            search_rate: RateLimitConfig {
                capacity: env_f64("SOUK_RATE_SEARCH_CAPACITY", d.search_rate.capacity),
                refill_per_sec: env_f64("SOUK_RATE_SEARCH_REFILL", d.search_rate.refill_per_sec),
            },
            trending_rate: RateLimitConfig {
                capacity: env_f64("SOUK_RATE_TRENDING_CAPACITY", d.trending_rate.capacity),
                refill_per_sec: env_f64("SOUK_RATE_TRENDING_REFILL", d.trending_rate.refill_per_sec),
            },
            trust_forwarded: std::env::var("SOUK_TRUST_FORWARDED")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(d.trust_forwarded),
            max_clients: std::env::var("SOUK_RATE_MAX_CLIENTS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(d.max_clients),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind.to_string(), DEFAULT_BIND);
        assert_eq!(cfg.search_rate.capacity, 30.0);
        assert_eq!(cfg.trending_rate.refill_per_sec, 2.0);
        assert!(!cfg.trust_forwarded);
    }
}

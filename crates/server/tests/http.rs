use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use souk_api::{InProcApi, MarketError, MockApi};
use souk_search::SuggestConfig;
use souk_server::{router, AppState, RateLimitConfig, ServerConfig};
use tower::ServiceExt;

fn app_with(cfg: ServerConfig) -> Router {
    let api = InProcApi::builtin(SuggestConfig::default()).unwrap();
    router(AppState::new(Arc::new(api), &cfg))
}

fn app() -> Router { app_with(ServerConfig::default()) }

async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let res = app.clone().oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn search_returns_category_first() {
    let app = app();
    let (status, json) = get(&app, "/api/search?q=car&location=Lagos&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["query"], "car");
    assert_eq!(json["category"], "Vehicles");
    let items = json["suggestions"].as_array().unwrap();
    assert!(!items.is_empty() && items.len() <= 5);
    assert_eq!(items[0]["text"], "Vehicles");
    assert_eq!(items[0]["origin"], "category");
}

#[tokio::test]
async fn unknown_query_has_null_category() {
    let app = app();
    let (status, json) = get(&app, "/api/search?q=xyzzy").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["category"].is_null());
}

#[tokio::test]
async fn served_searches_show_up_in_trending() {
    let app = app();
    get(&app, "/api/search?q=sofa&location=Abuja").await;
    get(&app, "/api/search?q=sofa&location=Abuja").await;
    get(&app, "/api/search?q=laptop&location=Abuja").await;

    let (status, json) = get(&app, "/api/search/trending?city=Abuja&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["trending"], serde_json::json!(["sofa", "laptop"]));

    let (_, json) = get(&app, "/api/search/trending?city=Lagos").await;
    assert_eq!(json["trending"], serde_json::json!([]));
}

#[tokio::test]
async fn ads_are_wrapped() {
    let app = app();
    let (status, json) = get(&app, "/api/search/ads?q=plumber&city=Lagos").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ads"][0]["id"], "ad-4");
}

#[tokio::test]
async fn overlong_query_is_bad_request() {
    let app = app();
    let q = "a".repeat(souk_api::MAX_QUERY_CHARS + 1);
    let (status, json) = get(&app, &format!("/api/search?q={q}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation");
}

#[tokio::test]
async fn search_bucket_drains_to_429_and_trending_is_separate() {
    let cfg = ServerConfig {
        search_rate: RateLimitConfig { capacity: 2.0, refill_per_sec: 0.001 },
        ..ServerConfig::default()
    };
    let app = app_with(cfg);
    assert_eq!(get(&app, "/api/search?q=car").await.0, StatusCode::OK);
    assert_eq!(get(&app, "/api/search/ads?q=car").await.0, StatusCode::OK);

    let (status, json) = get(&app, "/api/search?q=car").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json, serde_json::json!({"error": "rate_limited"}));

    assert_eq!(get(&app, "/api/search/trending").await.0, StatusCode::OK);
    assert_eq!(get(&app, "/api/categories").await.0, StatusCode::OK);
}

#[tokio::test]
async fn rotating_forwarded_header_does_not_reset_the_bucket() {
    let cfg = ServerConfig {
        search_rate: RateLimitConfig { capacity: 1.0, refill_per_sec: 0.001 },
        ..ServerConfig::default()
    };
    let app = app_with(cfg);
    let mut accepted = 0;
    for i in 0..50 {
        let req = Request::builder()
            .uri("/api/search?q=car")
            .header("x-forwarded-for", format!("10.9.0.{i}"))
            .body(Body::empty())
            .unwrap();
        if app.clone().oneshot(req).await.unwrap().status() == StatusCode::OK {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn trusted_proxy_clients_get_their_own_bucket() {
    let cfg = ServerConfig {
        trending_rate: RateLimitConfig { capacity: 1.0, refill_per_sec: 0.001 },
        trust_forwarded: true,
        ..ServerConfig::default()
    };
    let app = app_with(cfg);
    let req = |ip: &str| {
        Request::builder().uri("/api/search/trending").header("x-forwarded-for", ip).body(Body::empty()).unwrap()
    };
    assert_eq!(app.clone().oneshot(req("10.0.0.1")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(app.clone().oneshot(req("10.0.0.1")).await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.clone().oneshot(req("10.0.0.2")).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn categories_list_fields() {
    let app = app();
    let (status, json) = get(&app, "/api/categories").await;
    assert_eq!(status, StatusCode::OK);
    let cats = json["categories"].as_array().unwrap();
    assert_eq!(cats.len(), 6);
    assert_eq!(cats[0]["id"], "Vehicles");
    assert_eq!(cats[0]["fields"][0]["name"], "title");
}

#[tokio::test]
async fn notify_is_accepted() {
    let app = app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/notify/admin-1")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"topic":"listing.reported","payload":{"id":3}}"#))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["delivered"], 0);
}

#[tokio::test]
async fn upstream_errors_map_to_status_codes() {
    let cases = [
        (MarketError::Unavailable("db".into()), StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        (MarketError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    ];
    for (err, code, tag) in cases {
        let mock = MockApi { fail_with: Some(err), ..MockApi::default() };
        let app = router(AppState::new(Arc::new(mock), &ServerConfig::default()));
        let (status, json) = get(&app, "/api/search?q=car").await;
        assert_eq!(status, code);
        assert_eq!(json["error"], tag);
        assert!(json.get("message").is_none(), "internal details are not leaked");
    }
}

#[tokio::test]
async fn healthz_is_ok() {
    let app = app();
    let res = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

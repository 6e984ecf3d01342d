use std::sync::Arc;

use souk_core::catalog::{SERVICES, VEHICLES};
use souk_core::{Ad, CategoryId, CategoryMap, SearchQuery, ServiceListing, SuggestionOrigin, TrendingEntry};
use souk_search::{
    AdBook, AdSource, QueryCategoryResolver, ServiceCatalog, ServiceSource, SourceError, SuggestConfig, SuggestionService,
    TrendingLog, TrendingSource,
};

fn listing(id: &str, title: &str, cat: &str) -> ServiceListing {
    ServiceListing { id: id.into(), title: title.into(), category: CategoryId::from(cat), city: None }
}

fn small_map() -> Arc<CategoryMap> {
    Arc::new(CategoryMap::from_entries([("car", VEHICLES), ("care", SERVICES), ("cars", VEHICLES)]).unwrap())
}

fn service_with(trending: Arc<TrendingLog>, cfg: SuggestConfig) -> SuggestionService {
    let services = ServiceCatalog::new(vec![
        listing("s1", "Car wash", VEHICLES),
        listing("s2", "Child care", SERVICES),
        listing("s3", "Carpet cleaning", SERVICES),
    ]);
    SuggestionService::new(
        QueryCategoryResolver::new(small_map()),
        Arc::new(services),
        trending,
        Arc::new(AdBook::default()),
        cfg,
    )
}

#[tokio::test]
async fn groups_render_in_origin_order() {
    let trending = Arc::new(TrendingLog::default());
    trending.record("cars lagos", None).await.unwrap();
    trending.record("cargo bike", None).await.unwrap();
    let svc = service_with(trending, SuggestConfig::default());

    let res = svc.suggestions(&SearchQuery::new("CA")).await.unwrap();
    assert_eq!(res.category.as_ref().map(|c| c.as_str()), Some(VEHICLES));
    let origins: Vec<SuggestionOrigin> = res.items.iter().map(|s| s.origin).collect();
    let mut sorted = origins.clone();
    sorted.sort();
    assert_eq!(origins, sorted, "categories, then services, then trending");

    let cats: Vec<&str> = res.by_origin(SuggestionOrigin::Category).map(|s| s.text.as_str()).collect();
    assert_eq!(cats, vec![VEHICLES, "car", "cars"]);
    assert!(res.by_origin(SuggestionOrigin::Service).count() >= 1);
    assert_eq!(res.by_origin(SuggestionOrigin::Trending).count(), 2);
}

#[tokio::test]
async fn unmatched_category_falls_back_to_services_and_trending() {
    let trending = Arc::new(TrendingLog::default());
    trending.record("carpet", None).await.unwrap();
    let svc = service_with(trending, SuggestConfig::default());

    let res = svc.suggestions(&SearchQuery::new("carpet")).await.unwrap();
    assert_eq!(res.category, None);
    assert_eq!(res.by_origin(SuggestionOrigin::Category).count(), 0);
    assert_eq!(res.items[0].origin, SuggestionOrigin::Service);
    assert_eq!(res.items[0].text, "Carpet cleaning");
    assert!(res.by_origin(SuggestionOrigin::Trending).any(|s| s.text == "carpet"));
}

#[tokio::test]
async fn non_positive_limit_uses_default_never_unbounded() {
    let trending = Arc::new(TrendingLog::default());
    for i in 0..40 {
        trending.record(&format!("car {i}"), None).await.unwrap();
    }
    let cfg = SuggestConfig { default_limit: 4, max_limit: 8, trending_default_limit: 3 };
    let svc = service_with(trending, cfg);

    for limit in [0, -1, -100] {
        let res = svc.suggestions(&SearchQuery::new("car").with_limit(limit)).await.unwrap();
        assert_eq!(res.len(), 4, "limit {limit}");
    }
    let res = svc.suggestions(&SearchQuery::new("car").with_limit(1_000)).await.unwrap();
    assert_eq!(res.len(), 8);

    let top: Vec<String> = svc.trending_searches(None, Some(0)).await.unwrap().collect();
    assert_eq!(top.len(), 3);
}

#[tokio::test]
async fn blank_query_returns_trending_only() {
    let trending = Arc::new(TrendingLog::default());
    trending.record("sofa", None).await.unwrap();
    let svc = service_with(trending, SuggestConfig::default());
    let res = svc.suggestions(&SearchQuery::new("   ")).await.unwrap();
    assert_eq!(res.category, None);
    assert_eq!(res.len(), 1);
    assert_eq!(res.items[0].origin, SuggestionOrigin::Trending);
}

#[tokio::test]
async fn record_search_feeds_city_scoped_trending() {
    let trending = Arc::new(TrendingLog::default());
    let svc = service_with(trending, SuggestConfig::default());
    for _ in 0..2 {
        svc.record_search(&SearchQuery::new("Car").with_location("Lagos")).await.unwrap();
    }
    svc.record_search(&SearchQuery::new("care").with_location("Abuja")).await.unwrap();
    svc.record_search(&SearchQuery::new("  ")).await.unwrap();

    let lagos: Vec<String> = svc.trending_searches(Some("lagos"), None).await.unwrap().collect();
    assert_eq!(lagos, vec!["car".to_string()]);
    let all: Vec<String> = svc.trending_searches(None, None).await.unwrap().collect();
    assert_eq!(all, vec!["car".to_string(), "care".to_string()]);
}

struct FailingServices;

#[async_trait::async_trait]
impl ServiceSource for FailingServices {
    async fn services(
        &self,
        _text: &str,
        _category: Option<&CategoryId>,
        _location: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<ServiceListing>, SourceError> {
        Err(SourceError::Unavailable("db down".into()))
    }
}

struct FixedTrending;

#[async_trait::async_trait]
impl TrendingSource for FixedTrending {
    async fn trending(&self, _city: Option<&str>, _limit: usize) -> Result<Vec<TrendingEntry>, SourceError> {
        Ok(Vec::new())
    }
    async fn record(&self, _query: &str, _city: Option<&str>) -> Result<(), SourceError> { Ok(()) }
}

struct EchoAds;

#[async_trait::async_trait]
impl AdSource for EchoAds {
    async fn ads(
        &self,
        text: &str,
        category: Option<&CategoryId>,
        _city: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Ad>, SourceError> {
        Ok(vec![Ad {
            id: format!("{limit}"),
            title: text.to_string(),
            category: category.cloned().unwrap_or_else(|| CategoryId::from("none")),
            city: None,
            url: String::new(),
        }])
    }
}

#[tokio::test]
async fn collaborator_failures_propagate_unchanged() {
    let svc = SuggestionService::new(
        QueryCategoryResolver::new(small_map()),
        Arc::new(FailingServices),
        Arc::new(FixedTrending),
        Arc::new(EchoAds),
        SuggestConfig::default(),
    );
    let err = svc.suggestions(&SearchQuery::new("car")).await.unwrap_err();
    assert_eq!(err, SourceError::Unavailable("db down".into()));
}

#[tokio::test]
async fn ads_pass_through_with_resolved_category() {
    let svc = SuggestionService::new(
        QueryCategoryResolver::new(small_map()),
        Arc::new(FailingServices),
        Arc::new(FixedTrending),
        Arc::new(EchoAds),
        SuggestConfig::default(),
    );
    let ads = svc.ads(&SearchQuery::new("Car").with_limit(-2)).await.unwrap();
    assert_eq!(ads.len(), 1);
    assert_eq!(ads[0].category.as_str(), VEHICLES);
    assert_eq!(ads[0].id, "10");
}

//! In-memory sources: service catalogue, trending log and ad book.
//! Keep these small and predictable; a database-backed store implements the same traits.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::{DateTime, Duration, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use rustc_hash::FxHashMap;
use souk_core::catalog::{ELECTRONICS, FURNITURE, JOBS, REAL_ESTATE, SERVICES, VEHICLES};
use souk_core::{normalize, Ad, CategoryId, ServiceListing, TrendingEntry};
use tracing::debug;

use crate::sources::{AdSource, ServiceSource, SourceError, TrendingSource};

/// Score added to listings in the query's resolved category.
const CATEGORY_BOOST: i64 = 50;

fn city_matches(entry: Option<&str>, wanted: Option<&str>) -> bool {
    match (entry, wanted) {
        (_, None) | (None, _) => true,
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

// ----------------- Services -----------------

/// Hot-swappable service catalogue ranked with a fuzzy matcher.
pub struct ServiceCatalog {
    listings: ArcSwap<Vec<ServiceListing>>,
}

impl ServiceCatalog {
    pub fn new(listings: Vec<ServiceListing>) -> Self {
        Self { listings: ArcSwap::from_pointee(listings) }
    }

    /// Replace the catalogue; in-flight searches keep the previous snapshot.
    pub fn replace(&self, listings: Vec<ServiceListing>) {
        debug!(count = listings.len(), "service catalogue swapped");
        self.listings.store(Arc::new(listings));
    }

    pub fn len(&self) -> usize { self.listings.load().len() }
    pub fn is_empty(&self) -> bool { self.listings.load().is_empty() }

    /// Small demo catalogue used by the server and CLI when no store is wired.
    pub fn sample() -> Self {
        let l = |id: &str, title: &str, cat: &str, city: Option<&str>| ServiceListing {
            id: id.to_string(),
            title: title.to_string(),
            category: CategoryId::from(cat),
            city: city.map(|s| s.to_string()),
        };
        Self::new(vec![
            l("svc-1", "Emergency plumber 24/7", SERVICES, Some("Lagos")),
            l("svc-2", "Licensed electrician", SERVICES, Some("Abuja")),
            l("svc-3", "Home cleaning service", SERVICES, None),
            l("svc-4", "Elderly care at home", SERVICES, Some("Lagos")),
            l("svc-5", "Car wash and detailing", VEHICLES, Some("Lagos")),
            l("svc-6", "Car rental with driver", VEHICLES, None),
            l("svc-7", "Phone screen repair", ELECTRONICS, None),
            l("svc-8", "Laptop repair and upgrades", ELECTRONICS, Some("Abuja")),
            l("svc-9", "Property valuation", REAL_ESTATE, None),
            l("svc-10", "CV writing and job coaching", JOBS, None),
            l("svc-11", "Furniture assembly", FURNITURE, None),
        ])
    }
}

#[async_trait::async_trait]
impl ServiceSource for ServiceCatalog {
    async fn services(
        &self,
        text: &str,
        category: Option<&CategoryId>,
        location: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ServiceListing>, SourceError> {
        let q = normalize(text);
        if q.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let matcher = SkimMatcherV2::default().ignore_case();
        let snapshot = self.listings.load();
        let mut scored: Vec<(i64, &ServiceListing)> = Vec::new();
        for listing in snapshot.iter() {
            if !city_matches(listing.city.as_deref(), location) {
                continue;
            }
            let in_category = category.map(|c| *c == listing.category).unwrap_or(false);
            let score = match (matcher.fuzzy_match(&listing.title, &q), in_category) {
                (Some(s), true) => s + CATEGORY_BOOST,
                (Some(s), false) => s,
                (None, true) => 0,
                (None, false) => continue,
            };
            scored.push((score, listing));
        }
        // Stable ranking: score desc, then title, then id
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.title.cmp(&b.1.title)).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(scored.into_iter().take(limit).map(|(_, l)| l.clone()).collect())
    }
}

// ----------------- Trending -----------------

#[derive(Debug, Clone, Copy)]
struct Tally {
    count: u64,
    last_seen: DateTime<Utc>,
}

/// Default ceiling on distinct (query, city) tallies.
pub const DEFAULT_TRENDING_MAX_ENTRIES: usize = 10_000;

/// Counts of recent queries keyed by (normalized query, normalized city).
/// Expired tallies are evicted on write and read; the map never exceeds `max_entries`.
pub struct TrendingLog {
    tallies: Mutex<FxHashMap<(String, Option<String>), Tally>>,
    window: Option<Duration>,
    max_entries: usize,
}

impl Default for TrendingLog {
    fn default() -> Self { Self::new(None) }
}

impl TrendingLog {
    /// `window` drops queries not seen within that span; `None` keeps everything.
    pub fn new(window: Option<Duration>) -> Self {
        Self { tallies: Mutex::new(FxHashMap::default()), window, max_entries: DEFAULT_TRENDING_MAX_ENTRIES }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Number of tallies currently held.
    pub fn len(&self) -> usize { self.tallies.lock().unwrap_or_else(|e| e.into_inner()).len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn evict_expired(&self, tallies: &mut FxHashMap<(String, Option<String>), Tally>, now: DateTime<Utc>) {
        if let Some(cut) = self.window.map(|w| now - w) {
            tallies.retain(|_, t| t.last_seen >= cut);
        }
    }

    pub fn record_at(&self, query: &str, city: Option<&str>, at: DateTime<Utc>) {
        let q = normalize(query);
        if q.is_empty() {
            return;
        }
        let city = city.map(normalize).filter(|c| !c.is_empty());
        let key = (q, city);
        let mut tallies = self.tallies.lock().unwrap_or_else(|e| e.into_inner());
        if !tallies.contains_key(&key) {
            self.evict_expired(&mut tallies, at);
            while tallies.len() >= self.max_entries {
                // Drop the stalest tally; ties go to the lower count.
                let Some(stale) = tallies
                    .iter()
                    .min_by(|a, b| a.1.last_seen.cmp(&b.1.last_seen).then_with(|| a.1.count.cmp(&b.1.count)))
                    .map(|(k, _)| k.clone())
                else {
                    break;
                };
                tallies.remove(&stale);
                debug!(query = %stale.0, "trending tally evicted");
            }
        }
        let t = tallies.entry(key).or_insert(Tally { count: 0, last_seen: at });
        t.count += 1;
        if at > t.last_seen {
            t.last_seen = at;
        }
    }

    pub fn top_at(&self, city: Option<&str>, limit: usize, now: DateTime<Utc>) -> Vec<TrendingEntry> {
        let city = city.map(normalize).filter(|c| !c.is_empty());
        let mut tallies = self.tallies.lock().unwrap_or_else(|e| e.into_inner());
        self.evict_expired(&mut tallies, now);
        // Without a city scope, counts are merged across cities.
        let mut merged: FxHashMap<&str, Tally> = FxHashMap::default();
        for ((q, c), t) in tallies.iter() {
            if city.is_some() && c.as_deref() != city.as_deref() {
                continue;
            }
            let m = merged.entry(q.as_str()).or_insert(Tally { count: 0, last_seen: t.last_seen });
            m.count += t.count;
            if t.last_seen > m.last_seen {
                m.last_seen = t.last_seen;
            }
        }
        let mut out: Vec<TrendingEntry> = merged
            .into_iter()
            .map(|(q, t)| TrendingEntry { query: q.to_string(), city: city.clone(), count: t.count, last_seen: t.last_seen })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| b.last_seen.cmp(&a.last_seen)).then_with(|| a.query.cmp(&b.query)));
        out.truncate(limit);
        out
    }
}

#[async_trait::async_trait]
impl TrendingSource for TrendingLog {
    async fn trending(&self, city: Option<&str>, limit: usize) -> Result<Vec<TrendingEntry>, SourceError> {
        Ok(self.top_at(city, limit, Utc::now()))
    }

    async fn record(&self, query: &str, city: Option<&str>) -> Result<(), SourceError> {
        self.record_at(query, city, Utc::now());
        Ok(())
    }
}

// ----------------- Ads -----------------

/// Static ad inventory. Selection: same category as the query, or title contains the text.
#[derive(Default)]
pub struct AdBook {
    ads: Vec<Ad>,
}

impl AdBook {
    pub fn new(ads: Vec<Ad>) -> Self { Self { ads } }

    pub fn sample() -> Self {
        let a = |id: &str, title: &str, cat: &str, city: Option<&str>| Ad {
            id: id.to_string(),
            title: title.to_string(),
            category: CategoryId::from(cat),
            city: city.map(|s| s.to_string()),
            url: format!("/ads/{id}"),
        };
        Self::new(vec![
            a("ad-1", "Certified used cars with warranty", VEHICLES, None),
            a("ad-2", "New apartments in Lekki", REAL_ESTATE, Some("Lagos")),
            a("ad-3", "Phone deals this week", ELECTRONICS, None),
            a("ad-4", "Hire vetted plumbers", SERVICES, Some("Lagos")),
            a("ad-5", "Hiring drivers now", JOBS, None),
        ])
    }
}

#[async_trait::async_trait]
impl AdSource for AdBook {
    async fn ads(
        &self,
        text: &str,
        category: Option<&CategoryId>,
        city: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Ad>, SourceError> {
        let q = normalize(text);
        Ok(self
            .ads
            .iter()
            .filter(|ad| city_matches(ad.city.as_deref(), city))
            .filter(|ad| {
                category.map(|c| *c == ad.category).unwrap_or(false) || (!q.is_empty() && ad.title.to_lowercase().contains(&q))
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> { DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap() }

    #[tokio::test]
    async fn services_fuzzy_and_category_boost() {
        let cat = ServiceCatalog::sample();
        let cars = cat.services("car", Some(&CategoryId::from(VEHICLES)), None, 10).await.unwrap();
        assert!(!cars.is_empty());
        assert!(cars.iter().take(2).all(|l| l.category.as_str() == VEHICLES));

        // Category members are kept even without a fuzzy hit.
        let svc = cat.services("zzzz", Some(&CategoryId::from(FURNITURE)), None, 10).await.unwrap();
        assert_eq!(svc.len(), 1);
        assert_eq!(svc[0].id, "svc-11");
    }

    #[tokio::test]
    async fn services_respect_location_and_limit() {
        let cat = ServiceCatalog::sample();
        let abuja = cat.services("repair", None, Some("abuja"), 10).await.unwrap();
        assert!(abuja.iter().all(|l| l.city.as_deref().map(|c| c == "Abuja").unwrap_or(true)));
        let one = cat.services("repair", None, None, 1).await.unwrap();
        assert_eq!(one.len(), 1);
        assert!(cat.services("   ", None, None, 5).await.unwrap().is_empty());
    }

    #[test]
    fn catalogue_swap_is_visible() {
        let cat = ServiceCatalog::sample();
        assert_eq!(cat.len(), 11);
        cat.replace(Vec::new());
        assert!(cat.is_empty());
    }

    #[test]
    fn trending_orders_by_count_then_recency() {
        let log = TrendingLog::default();
        log.record_at("iPhone", Some("Lagos"), ts(1));
        log.record_at("iphone ", Some("lagos"), ts(2));
        log.record_at("sofa", Some("Lagos"), ts(3));
        log.record_at("car", Some("Abuja"), ts(4));
        log.record_at("  ", Some("Abuja"), ts(5));

        let all = log.top_at(None, 10, ts(10));
        let qs: Vec<&str> = all.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(qs, vec!["iphone", "car", "sofa"]);
        assert_eq!(all[0].count, 2);

        let lagos = log.top_at(Some("LAGOS"), 10, ts(10));
        let qs: Vec<&str> = lagos.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(qs, vec!["iphone", "sofa"]);
        assert_eq!(lagos[0].city.as_deref(), Some("lagos"));
    }

    #[test]
    fn trending_merges_cities_and_applies_window() {
        let log = TrendingLog::new(Some(Duration::seconds(60)));
        log.record_at("car", Some("Lagos"), ts(0));
        log.record_at("car", Some("Abuja"), ts(100));
        log.record_at("bed", None, ts(100));
        let top = log.top_at(None, 10, ts(120));
        assert_eq!(top.len(), 2);
        let car = top.iter().find(|e| e.query == "car").unwrap();
        // The Lagos tally fell out of the window.
        assert_eq!(car.count, 1);
        assert_eq!(log.top_at(None, 1, ts(120)).len(), 1);
    }

    #[test]
    fn expired_tallies_are_evicted_not_just_hidden() {
        let log = TrendingLog::new(Some(Duration::seconds(60)));
        for i in 0..500 {
            log.record_at(&format!("query {i}"), Some("Lagos"), ts(i % 30));
        }
        assert_eq!(log.len(), 500);

        log.record_at("sofa", Some("Lagos"), ts(100_000));
        assert_eq!(log.len(), 1);
        assert_eq!(log.top_at(None, 10, ts(100_000)).len(), 1);

        // Reads evict too.
        assert!(log.top_at(None, 10, ts(200_000)).is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn tally_count_is_capped() {
        let log = TrendingLog::default().with_max_entries(3);
        log.record_at("car", None, ts(1));
        log.record_at("car", None, ts(5));
        log.record_at("bed", None, ts(2));
        log.record_at("sofa", None, ts(3));
        log.record_at("tv", None, ts(4));
        assert_eq!(log.len(), 3);

        let qs: Vec<String> = log.top_at(None, 10, ts(10)).into_iter().map(|e| e.query).collect();
        // "bed" was the stalest and made room for "tv".
        assert_eq!(qs, vec!["car", "tv", "sofa"]);

        // Existing keys never evict.
        log.record_at("car", None, ts(6));
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn ads_by_category_or_title() {
        let book = AdBook::sample();
        let by_cat = book.ads("", Some(&CategoryId::from(JOBS)), None, 5).await.unwrap();
        assert_eq!(by_cat.len(), 1);
        assert_eq!(by_cat[0].id, "ad-5");
        let by_title = book.ads("Phone", None, None, 5).await.unwrap();
        assert_eq!(by_title[0].id, "ad-3");
        let abuja = book.ads("", Some(&CategoryId::from(SERVICES)), Some("Abuja"), 5).await.unwrap();
        assert!(abuja.is_empty());
    }
}

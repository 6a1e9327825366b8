use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use async_trait::async_trait;
use chrono::{TimeDelta, TimeZone, Utc};
use geo::{MultiPolygon, polygon};
use la_crime_analytics::aggregator::Aggregator;
use la_crime_analytics::clock::ManualClock;
use la_crime_analytics_models::AggregationParams;
use la_crime_cache::cache::AggregationCache;
use la_crime_cache::service::AggregationService;
use la_crime_neighborhood::binder::NeighborhoodBinder;
use la_crime_neighborhood_models::NeighborhoodBoundary;
use la_crime_server::{AppState, configure};
use la_crime_source::{FetchOutcome, IncidentSource, SourceError};
use la_crime_source_models::{DateWindow, IncidentRecord, MAX_WINDOW_DAYS};
use serde_json::Value;

#[derive(Default)]
struct FakeSource {
    calls: AtomicUsize,
    failing: AtomicBool,
}

#[async_trait]
impl IncidentSource for FakeSource {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn fetch(&self, window: &DateWindow) -> Result<FetchOutcome, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::SourceUnavailable {
                attempts: 3,
                message: "HTTP 503".to_string(),
            });
        }
        let records = (0..12)
            .map(|i| IncidentRecord {
                report_id: format!("{}-{i}", window.start()),
                reported_at: None,
                occurred_at: window.end().and_hms_opt(12, 0, 0).unwrap().and_utc(),
                description: if i < 8 { "ROBBERY" } else { "VEHICLE - STOLEN" }.to_string(),
                area_name: String::new(),
                latitude: Some(if i % 2 == 0 { 33.985 } else { 34.105 }),
                longitude: Some(if i % 2 == 0 { -118.465 } else { -118.325 }),
            })
            .collect();
        Ok(FetchOutcome::complete(records))
    }
}

struct Harness {
    state: web::Data<AppState>,
    source: Arc<FakeSource>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let square = |name: &str, west: f64, south: f64| NeighborhoodBoundary {
        name: name.to_string(),
        geometry: MultiPolygon(vec![polygon![
            (x: west, y: south),
            (x: west + 0.03, y: south),
            (x: west + 0.03, y: south + 0.03),
            (x: west, y: south + 0.03),
            (x: west, y: south),
        ]]),
    };
    let binder = NeighborhoodBinder::new(vec![
        square("Venice", -118.48, 33.97),
        square("Hollywood", -118.34, 34.09),
        square("Downtown", -118.26, 34.03),
    ]);

    let source = Arc::new(FakeSource::default());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()));
    let aggregator = Arc::new(Aggregator::new(
        source.clone(),
        Arc::new(binder),
        AggregationParams::default(),
        clock.clone(),
    ));
    let cache = AggregationCache::new(Duration::from_secs(3_600), clock.clone());
    Harness {
        state: web::Data::new(AppState {
            service: AggregationService::new(aggregator, cache, MAX_WINDOW_DAYS),
        }),
        source,
        clock,
    }
}

macro_rules! app {
    ($harness:expr) => {
        test::init_service(App::new().app_data($harness.state.clone()).configure(configure)).await
    };
}

#[actix_web::test]
async fn health_reports_cache_size() {
    let h = harness();
    let app = app!(h);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["healthy"], true);
    assert_eq!(body["cachedAggregations"], 0);
}

#[actix_web::test]
async fn categories_list_weights() {
    let h = harness();
    let app = app!(h);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/categories").to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    let categories = body.as_array().unwrap();
    assert_eq!(categories.len(), 4);
    let violent = categories.iter().find(|c| c["name"] == "violent-crime").unwrap();
    assert_eq!(violent["weight"], 3.0);
}

#[actix_web::test]
async fn aggregation_by_days_is_ranked_and_cached() {
    let h = harness();
    let app = app!(h);

    for _ in 0..2 {
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/aggregation?days=30").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["stale"], false);
        let names: Vec<_> = body["neighborhoods"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Downtown", "Hollywood", "Venice"]);
        assert_eq!(body["metadata"]["totalIncidents"], 12);
    }

    assert_eq!(h.source.calls.load(Ordering::SeqCst), 2);
}

#[actix_web::test]
async fn aggregation_by_range() {
    let h = harness();
    let app = app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/aggregation?start=2024-01-01&end=2024-01-31")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["metadata"]["window"]["start"], "2024-01-01");
    assert_eq!(body["metadata"]["window"]["end"], "2024-01-31");
}

#[actix_web::test]
async fn invalid_windows_are_bad_requests() {
    let h = harness();
    let app = app!(h);

    for uri in [
        "/api/aggregation?days=0",
        "/api/aggregation?days=1826",
        "/api/aggregation?start=2024-02-01&end=2024-01-01",
        "/api/aggregation?days=7&start=2024-01-01&end=2024-01-31",
        "/api/aggregation?start=2024-01-01",
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "invalid_window", "{uri}");
    }
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn upstream_failure_without_history_is_503() {
    let h = harness();
    h.source.failing.store(true, Ordering::SeqCst);
    let app = app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/aggregation?days=30").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "source_unavailable");
}

#[actix_web::test]
async fn upstream_failure_with_history_serves_stale() {
    let h = harness();
    let app = app!(h);
    let request = || test::TestRequest::get().uri("/api/aggregation?days=30").to_request();

    let resp = test::call_service(&app, request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    h.clock.advance(TimeDelta::hours(2));
    h.source.failing.store(true, Ordering::SeqCst);

    let resp = test::call_service(&app, request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["stale"], true);
    assert_eq!(body["metadata"]["totalIncidents"], 12);
}

#[actix_web::test]
async fn refresh_rebuilds_the_window() {
    let h = harness();
    let app = app!(h);

    test::call_service(
        &app,
        test::TestRequest::get().uri("/api/aggregation?days=7").to_request(),
    )
    .await;
    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/api/aggregation/refresh?days=7").to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["stale"], false);
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 4);
}

//! End-to-end tests for the catalog endpoints, run through
//! `Server::test_request` against an in-memory SQLite catalog.

use runshift_core::seed::{normalize_all, ImportRecord};
use runshift_core::server::Bytes;
use runshift_core::{
    parse_json, register_routes, ApiResponse, CorsMiddleware, DatabasePool, LoggingMiddleware,
    Method, PageLimits, PoolSettings, RaceService, RaceStore, SearchSettings, Server,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const CATALOG: &str = r#"[
    {"race_name": "Roma Half Marathon", "race_url": "https://races.example.com/roma-half",
     "date": "2026-11-08", "location_city": "Roma", "location_country": "Italy",
     "distance_km": "21.1 km", "surface": "road", "elevation_profile": "Flat",
     "certified": "true", "geo_lat": "41.9", "geo_lon": "12.5",
     "sources_json": "[{\"name\": \"organizer\"}]", "tags_json": "[\"fast\"]",
     "fee_range_eur": "30-45", "image_thumb_url": "https://img.example.com/roma.jpg"},
    {"race_name": "Maratona di Firenze", "race_url": "https://races.example.com/firenze",
     "date": "2026-11-29", "location_city": "Firenze", "location_country": "Italy",
     "distance_km": "42,2", "surface": "road", "geo_lat": "43.77"},
    {"race_name": "Valencia Marathon", "race_url": "https://races.example.com/valencia",
     "date": "2026-12-06", "location_city": "Valencia", "location_country": "Spain",
     "distance_km": "42.2 km", "surface": "road", "sources_json": "not json"},
    {"race_name": "Madeira Ultra Trail", "race_url": "https://races.example.com/miut",
     "date": "2026-04-24", "location_country": "Portugal",
     "distance_km": "115 km / 85 km / 60 km", "surface": "trail", "elevation_profile": "Mountainous"},
    {"race_name": "Mystery Run", "race_url": "https://races.example.com/mystery",
     "date": "sometime in spring", "location_country": "Italy", "distance_km": "10k"}
]"#;

async fn catalog(pool_settings: PoolSettings, settings: SearchSettings) -> (Server, DatabasePool) {
    let pool = DatabasePool::connect("sqlite::memory:", pool_settings).await.unwrap();
    pool.ensure_schema().await.unwrap();

    let records: Vec<ImportRecord> = parse_json(CATALOG).unwrap();
    let store = RaceStore::new(pool.clone());
    store.replace_all(&normalize_all(records)).await.unwrap();

    let mut server = Server::new();
    server.add_middleware(LoggingMiddleware::new());
    server.add_middleware(CorsMiddleware::new());
    register_routes(&mut server, Arc::new(RaceService::new(store, settings)), false).unwrap();
    (server, pool)
}

fn single_connection() -> PoolSettings {
    PoolSettings {
        max_connections: 1,
        ..PoolSettings::default()
    }
}

async fn server_with(settings: SearchSettings) -> Server {
    catalog(single_connection(), settings).await.0
}

async fn server() -> Server {
    server_with(SearchSettings::default()).await
}

async fn get(server: &Server, path: &str) -> ApiResponse {
    server
        .test_request(Method::Get, path.to_string(), HashMap::new(), None)
        .await
}

async fn post_json(server: &Server, path: &str, body: &str) -> (u16, Value) {
    let resp = server
        .test_request(
            Method::Post,
            path.to_string(),
            HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            Some(Bytes::from(body.to_string())),
        )
        .await;
    let body = tokio_test::assert_ok!(resp.json_body());
    (resp.status, body)
}

async fn get_json(server: &Server, path: &str) -> (u16, Value) {
    let resp = get(server, path).await;
    let body = tokio_test::assert_ok!(resp.json_body());
    (resp.status, body)
}

fn names(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|race| race["race_name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn italian_half_marathon_scenario() {
    let server = server().await;
    let (status, body) =
        get_json(&server, "/api/races?country=Italy&distanceCategory=half&page=1&limit=24").await;

    assert_eq!(status, 200);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 24);
    let race = &body["items"][0];
    assert_eq!(race["race_name"], "Roma Half Marathon");
    assert_eq!(race["location"], "Roma, Italy");
    assert_eq!(race["geo"], serde_json::json!([41.9, 12.5]));
    assert_eq!(race["sources"][0]["name"], "organizer");
    assert_eq!(race["certified"], true);
    assert_eq!(race["fee_range_eur"], "30-45");
    assert_eq!(race["image_thumb_url"], "https://img.example.com/roma.jpg");
}

#[tokio::test]
async fn default_listing_orders_by_date_with_nulls_last() {
    let server = server().await;
    let (status, body) = get_json(&server, "/api/races").await;

    assert_eq!(status, 200);
    assert_eq!(body["total"], 5);
    assert_eq!(
        names(&body),
        vec![
            "Madeira Ultra Trail",
            "Roma Half Marathon",
            "Maratona di Firenze",
            "Valencia Marathon",
            "Mystery Run",
        ]
    );
}

#[tokio::test]
async fn marathon_matches_dot_and_comma_decimals() {
    let server = server().await;
    let (_, body) = get_json(&server, "/api/races?distance=marathon").await;
    assert_eq!(names(&body), vec!["Maratona di Firenze", "Valencia Marathon"]);
}

#[tokio::test]
async fn ultra_matches_any_listed_distance() {
    let server = server().await;
    let (_, body) = get_json(&server, "/api/races?distanceCategory=ultra&surface=trail,mixed").await;
    assert_eq!(names(&body), vec!["Madeira Ultra Trail"]);
}

#[tokio::test]
async fn free_text_and_projection_defaults() {
    let server = server().await;
    let (_, body) = get_json(&server, "/api/races?q=VALENCIA").await;
    assert_eq!(body["total"], 1);
    let race = &body["items"][0];
    assert_eq!(race["sources"], serde_json::json!([]));
    assert_eq!(race["geo"], Value::Null);
    assert_eq!(race["location"], "Valencia, Spain");

    let (_, body) = get_json(&server, "/api/races?city=firenze").await;
    assert_eq!(body["items"][0]["geo"], Value::Null);
}

#[tokio::test]
async fn date_window_excludes_unparseable_dates() {
    let server = server().await;
    let (_, body) = get_json(&server, "/api/races?country=italy&dateFrom=2026-01-01").await;
    assert_eq!(names(&body), vec!["Roma Half Marathon", "Maratona di Firenze"]);

    let (_, body) = get_json(&server, "/api/races?dateFrom=2026-11-01&dateTo=2026-11-30").await;
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn pagination_is_clamped_and_total_covers_items() {
    let server = server().await;

    let (_, body) = get_json(&server, "/api/races?limit=1000&page=-3").await;
    assert_eq!(body["limit"], 100);
    assert_eq!(body["page"], 1);

    let (_, body) = get_json(&server, "/api/races?limit=2&page=2").await;
    assert_eq!(body["total"], 5);
    assert_eq!(
        names(&body),
        vec!["Maratona di Firenze", "Valencia Marathon"]
    );

    let (_, body) = get_json(&server, "/api/races?country=Atlantis").await;
    assert_eq!(body["total"], 0);
    assert_eq!(body["items"], serde_json::json!([]));
}

#[tokio::test]
async fn custom_ordering() {
    let server = server().await;
    let (_, body) = get_json(&server, "/api/races?orderBy=name&orderDir=desc&limit=2").await;
    assert_eq!(names(&body), vec!["Valencia Marathon", "Roma Half Marathon"]);

    let (_, body) = get_json(&server, "/api/races?orderBy=bogus").await;
    assert_eq!(names(&body)[0], "Madeira Ultra Trail");
}

#[tokio::test]
async fn lookups_by_url_and_id() {
    let server = server().await;

    let (status, race) = get_json(
        &server,
        "/api/race?url=https%3A%2F%2Fraces.example.com%2Fvalencia",
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(race["race_name"], "Valencia Marathon");

    let id = race["id"].as_i64().unwrap();
    let (status, race) = get_json(&server, &format!("/api/races/{id}")).await;
    assert_eq!(status, 200);
    assert_eq!(race["race_url"], "https://races.example.com/valencia");
}

#[tokio::test]
async fn missing_keys_are_client_errors() {
    let server = server().await;

    let (status, body) = get_json(&server, "/api/race?url=https://races.example.com/nowhere").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Not found");

    let (status, _) = get_json(&server, "/api/races/424242").await;
    assert_eq!(status, 404);

    let (status, body) = get_json(&server, "/api/races/abc").await;
    assert_eq!(status, 400);
    assert_eq!(body["errors"][0]["field"], "id");

    let (status, _) = get_json(&server, "/api/race").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn required_date_window() {
    let server = server_with(SearchSettings {
        limits: PageLimits::default(),
        require_date_window: true,
    })
    .await;

    let (status, body) = get_json(&server, "/api/races?dateFrom=2026-01-01").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid request");
    assert_eq!(body["errors"][0]["field"], "dateTo");

    let (status, body) =
        get_json(&server, "/api/races?dateFrom=2026-01-01&dateTo=2026-12-31").await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 4);
}

#[tokio::test]
async fn health_ready_stats_countries() {
    let server = server().await;

    let (status, body) = get_json(&server, "/health").await;
    assert_eq!((status, body), (200, serde_json::json!({"ok": true})));

    let (status, body) = get_json(&server, "/ready").await;
    assert_eq!(status, 200);
    assert_eq!(body["db"], true);

    let (_, body) = get_json(&server, "/api/stats").await;
    assert_eq!(body, serde_json::json!({"total": 5, "with_date": 4, "with_image": 1}));

    let (status, body) = get_json(&server, "/api/countries").await;
    assert_eq!(status, 200);
    assert!(body.is_array());
}

#[tokio::test]
async fn cors_preflight_and_headers() {
    let server = server().await;

    let resp = server
        .test_request(Method::Options, "/api/races".to_string(), HashMap::new(), None)
        .await;
    assert_eq!(resp.status, 204);
    assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));

    let resp = get(&server, "/health").await;
    assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
    assert!(resp.header("x-request-id").is_some());
}

#[tokio::test]
async fn head_is_served_by_get_route() {
    let server = server().await;
    let resp = server
        .test_request(Method::Head, "/health".to_string(), HashMap::new(), None)
        .await;
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn body_search_within_window() {
    let server = server().await;
    let (status, body) = post_json(
        &server,
        "/api/search-races",
        r#"{"time_window": {"from": "2026-01-01", "to": "2026-12-31"}, "country": "ITALY"}"#,
    )
    .await;

    assert_eq!(status, 200);
    let races = body.as_array().unwrap();
    let names: Vec<&str> = races.iter().map(|r| r["race_name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Roma Half Marathon", "Maratona di Firenze"]);
    assert_eq!(races[0]["course"]["surface"], "road");
    assert_eq!(races[0]["course"]["certified"], true);
    assert_eq!(races[0]["logistics"]["registration_status"], Value::Null);
    assert_eq!(races[0]["country"], "Italy");

    let (_, body) = post_json(
        &server,
        "/api/search-races",
        r#"{"time_window": {"from": "2026-01-01", "to": "2026-12-31"}, "distance_km": "42.2"}"#,
    )
    .await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["race_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Maratona di Firenze", "Valencia Marathon"]);
}

#[tokio::test]
async fn body_search_requires_window_and_json() {
    let server = server().await;

    let (status, body) =
        post_json(&server, "/api/search-races", r#"{"time_window": {"from": "2026-01-01"}}"#).await;
    assert_eq!(status, 400);
    assert_eq!(body["errors"][0]["field"], "time_window.to");

    let (status, body) = post_json(&server, "/api/search-races", "{not json").await;
    assert_eq!(status, 400);
    assert_eq!(body["errors"][0]["field"], "body");

    let (status, _) = post_json(&server, "/api/races", "{}").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn ready_reports_store_failure_detail() {
    let (server, pool) = catalog(single_connection(), SearchSettings::default()).await;
    pool.close().await;

    let (status, body) = get_json(&server, "/ready").await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "Storage unavailable");
    assert!(body["detail"].as_str().unwrap().contains("closed"));

    let (status, body) = get_json(&server, "/api/stats").await;
    assert_eq!(status, 503);
    assert!(body.get("detail").is_none());
}

#[tokio::test]
async fn exhausted_pool_answers_503_after_timeout() {
    let (server, pool) = catalog(
        PoolSettings {
            max_connections: 1,
            acquire_timeout: Duration::from_millis(100),
        },
        SearchSettings::default(),
    )
    .await;
    let DatabasePool::Sqlite(sqlite) = &pool else {
        panic!("expected a sqlite pool");
    };
    let held = sqlite.acquire().await.unwrap();

    let (status, body) = get_json(&server, "/api/races?country=italy").await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "Storage unavailable");
    drop(held);
}

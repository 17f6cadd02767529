//! HTTP integration tests: the full router over SQLite fixtures.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use catchment_api::{app, config::CacheConfig, state::AppState};
use catchment_engine::{EngineConfig, GeoEngine, TileLayerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

use test_utils::fixtures::{attributes, bbox, catchments, tiles};
use test_utils::{
    assert_approx_eq, assert_bbox_approx_eq, standard_geopackage, standard_mbtiles, standard_tile_payload,
    SqliteFixture,
};

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _gpkg: SqliteFixture,
    _mbtiles: SqliteFixture,
}

async fn test_app() -> TestApp {
    let gpkg = standard_geopackage().await.unwrap();
    let mbtiles = standard_mbtiles().await.unwrap();

    let mut config = EngineConfig::new(gpkg.path());
    config.tiles.push(TileLayerConfig {
        layer: tiles::LAYER.to_string(),
        path: mbtiles.path().to_path_buf(),
    });
    let engine = GeoEngine::load(&config).await.unwrap();
    let state = Arc::new(AppState::from_engine(
        Arc::new(engine),
        CacheConfig::default(),
        None,
    ));

    TestApp {
        router: app(state.clone()),
        state,
        _gpkg: gpkg,
        _mbtiles: mbtiles,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(router: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn choropleth_uri(b: (f64, f64, f64, f64), scenario: &str, column: &str) -> String {
    format!(
        "/api/choropleth?bbox={}&scenario={}&column={}",
        bbox::to_query(b),
        scenario,
        column
    )
}

fn feature_ids(body: &Value) -> Vec<i64> {
    body["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_i64().unwrap())
        .collect()
}

// ============================================================================
// Health and catalog
// ============================================================================

#[tokio::test]
async fn test_health_and_ready() {
    let app = test_app().await;

    let (status, body) = get_json(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = get_json(&app.router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["engine"]["catchments"], 5);
    assert_eq!(body["engine"]["indexed"], 3);
    assert_eq!(body["viewport_limit"], 2000);
}

#[tokio::test]
async fn test_metrics_without_recorder_is_empty_text() {
    let app = test_app().await;
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, headers, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_list_scenarios_and_columns() {
    let app = test_app().await;

    let (status, body) = get_json(&app.router, "/api/scenarios").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"scenarios": ["reference", "current"]}));

    let (status, body) = get_json(&app.router, "/api/columns").await;
    assert_eq!(status, StatusCode::OK);
    let columns = body["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0]["name"], attributes::RAINFALL);
    assert_eq!(columns[0]["domain"]["min"], attributes::RAINFALL_DOMAIN.0);
    assert_eq!(columns[0]["domain"]["max"], attributes::RAINFALL_DOMAIN.1);
    assert_eq!(columns[1]["name"], attributes::RUNOFF);
}

// ============================================================================
// Choropleth
// ============================================================================

#[tokio::test]
async fn test_choropleth_feature_collection() {
    let app = test_app().await;
    let uri = choropleth_uri(bbox::STANDARD_ALL, "current", attributes::RAINFALL);
    let (status, body) = get_json(&app.router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "FeatureCollection");
    assert_eq!(body["truncated"], false);
    assert_eq!(body["scenario"], "current");
    assert_eq!(body["column"], attributes::RAINFALL);
    assert_eq!(feature_ids(&body), catchments::SQUARE_IDS.to_vec());

    let first = &body["features"][0];
    assert_eq!(first["type"], "Feature");
    assert_eq!(first["geometry"]["type"], "Polygon");
    assert_eq!(first["properties"]["catchment_id"], 1);
    assert_eq!(
        first["properties"]["value"],
        attributes::RAINFALL_CURRENT[0]
    );
}

#[tokio::test]
async fn test_choropleth_no_data_is_null() {
    let app = test_app().await;
    let uri = choropleth_uri(bbox::STANDARD_ALL, "current", attributes::RUNOFF);
    let (status, body) = get_json(&app.router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["features"][1]["properties"]["value"].is_null());
    assert_approx_eq!(
        body["features"][0]["properties"]["value"].as_f64().unwrap(),
        0.4,
        1e-12
    );
}

#[tokio::test]
async fn test_choropleth_limit_truncates_ascending() {
    let app = test_app().await;
    let uri = format!(
        "{}&limit=2",
        choropleth_uri(bbox::STANDARD_ALL, "reference", attributes::RAINFALL)
    );
    let (status, body) = get_json(&app.router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["truncated"], true);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["total_matches"], 3);
    assert_eq!(feature_ids(&body), vec![1, 2]);
}

#[tokio::test]
async fn test_choropleth_limit_is_clamped() {
    let app = test_app().await;
    let base = choropleth_uri(bbox::STANDARD_ALL, "current", attributes::RAINFALL);

    let (_, body) = get_json(&app.router, &format!("{}&limit=0", base)).await;
    assert_eq!(body["limit"], 1);
    assert_eq!(feature_ids(&body), vec![1]);

    let (_, body) = get_json(&app.router, &format!("{}&limit=100000", base)).await;
    assert_eq!(body["limit"], 2000);
    assert_eq!(body["truncated"], false);
}

#[tokio::test]
async fn test_choropleth_empty_and_inverted_viewports() {
    let app = test_app().await;

    for b in [bbox::EMPTY_AREA, bbox::INVERTED] {
        let uri = choropleth_uri(b, "current", attributes::RAINFALL);
        let (status, body) = get_json(&app.router, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert!(feature_ids(&body).is_empty());
        assert_eq!(body["truncated"], false);
    }
}

#[tokio::test]
async fn test_choropleth_rejects_unknown_column() {
    let app = test_app().await;

    for column in [attributes::LABEL, "rainfall%27%3B%20DROP%20TABLE%20current%3B%20--"] {
        let uri = choropleth_uri(bbox::STANDARD_ALL, "current", column);
        let (status, body) = get_json(&app.router, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid column"));
    }
}

#[tokio::test]
async fn test_choropleth_validation_errors() {
    let app = test_app().await;

    let uri = choropleth_uri(bbox::STANDARD_ALL, "future", attributes::RAINFALL);
    let (status, body) = get_json(&app.router, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid scenario"));

    let uri = "/api/choropleth?bbox=1,2,3&scenario=current&column=rainfall";
    let (status, body) = get_json(&app.router, uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid bbox"));

    let uri = "/api/choropleth?scenario=current&column=rainfall";
    let (status, _) = get_json(&app.router, uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!(
        "{}&limit=many",
        choropleth_uri(bbox::STANDARD_ALL, "current", attributes::RAINFALL)
    );
    let (status, _) = get_json(&app.router, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_repeated_viewport_served_from_cache() {
    let app = test_app().await;
    let uri = choropleth_uri(bbox::STANDARD_ALL, "current", attributes::RAINFALL);

    let (_, first) = get_json(&app.router, &uri).await;
    let (_, second) = get_json(&app.router, &uri).await;

    assert_eq!(first, second);
    let stats = app.state.viewport_cache.stats();
    assert_eq!(stats.hits.load(std::sync::atomic::Ordering::Relaxed), 1);
    assert_eq!(stats.misses.load(std::sync::atomic::Ordering::Relaxed), 1);
}

// ============================================================================
// Catchment detail
// ============================================================================

#[tokio::test]
async fn test_catchment_detail() {
    let app = test_app().await;
    let (status, body) = get_json(&app.router, "/api/catchments/2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["catchment_id"], 2);
    assert_eq!(body["bbox"], json!([1.0, 0.0, 2.0, 1.0]));
    assert_approx_eq!(body["area"].as_f64().unwrap(), 1.0, 1e-9);
    assert_eq!(body["attributes"]["current"]["rainfall"], 20.0);
    assert_eq!(body["attributes"]["reference"]["rainfall"], 25.0);
    assert!(body["attributes"]["current"]["runoff"].is_null());
}

#[tokio::test]
async fn test_catchment_detail_errors() {
    let app = test_app().await;

    let uri = format!("/api/catchments/{}", catchments::UNKNOWN_ID);
    let (status, body) = get_json(&app.router, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = get_json(&app.router, "/api/catchments/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_catchment_detail_malformed_geometry_degrades() {
    let app = test_app().await;
    let uri = format!("/api/catchments/{}", catchments::MALFORMED_ID);
    let (status, body) = get_json(&app.router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["geometry"].is_null());
    assert!(body["area"].is_null());
}

// ============================================================================
// Dissolve
// ============================================================================

#[tokio::test]
async fn test_dissolve_adjacent_catchments() {
    let app = test_app().await;
    let (status, body) = post_json(&app.router, "/api/dissolve", r#"{"catchment_ids":[2,1,2]}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["catchment_ids"], json!([1, 2]));
    assert_eq!(body["geometry"]["type"], "Polygon");
    let bbox: [f64; 4] = serde_json::from_value(body["bbox"].clone()).unwrap();
    assert_bbox_approx_eq!(bbox, [0.0, 0.0, 2.0, 1.0], 1e-12);
    assert_approx_eq!(body["area"].as_f64().unwrap(), 2.0, 1e-9);
    assert!(body["area_km2"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_dissolve_errors() {
    let app = test_app().await;

    let (status, body) = post_json(&app.router, "/api/dissolve", r#"{"catchment_ids":[]}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Empty selection"));

    let (status, _) = post_json(&app.router, "/api/dissolve", r#"{"catchment_ids":[1,999]}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(&app.router, "/api/dissolve", "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Tiles
// ============================================================================

#[tokio::test]
async fn test_get_tile() {
    let app = test_app().await;
    let (z, x, y) = tiles::POPULATED[2];
    let uri = format!("/tiles/{}/{}/{}/{}.pbf", tiles::LAYER, z, x, y);
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, headers, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/x-protobuf");
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body, standard_tile_payload(z, x, y));
}

#[tokio::test]
async fn test_gzipped_tile_sets_content_encoding() {
    let app = test_app().await;
    let (z, x, y) = tiles::GZIPPED;
    let uri = format!("/tiles/{}/{}/{}/{}", tiles::LAYER, z, x, y);
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, headers, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_ENCODING], "gzip");
    assert_eq!(body, standard_tile_payload(z, x, y));
}

#[tokio::test]
async fn test_missing_tiles_are_not_found() {
    let app = test_app().await;

    for uri in [
        format!("/tiles/{}/3/0/0", tiles::LAYER),
        format!("/tiles/{}/12/0/0", tiles::LAYER),
        format!("/tiles/{}/1/5/0", tiles::LAYER),
        "/tiles/unknown/0/0/0".to_string(),
    ] {
        let (status, body) = get_json(&app.router, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert!(body["error"].is_string());
    }

    for uri in [
        format!("/tiles/{}/a/0/0", tiles::LAYER),
        format!("/tiles/{}/1.foo/1.bar/0", tiles::LAYER),
    ] {
        let (status, _) = get_json(&app.router, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn test_tilejson() {
    let app = test_app().await;
    let (status, body) = get_json(&app.router, &format!("/tiles/{}", tiles::LAYER)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tilejson"], "3.0.0");
    assert_eq!(body["name"], "Catchments");
    assert_eq!(body["minzoom"], tiles::MIN_ZOOM);
    assert_eq!(body["maxzoom"], tiles::MAX_ZOOM);
    assert_eq!(body["format"], "pbf");
    assert_eq!(body["tiles"][0], "/tiles/catchments/{z}/{x}/{y}");
    assert_eq!(body["vector_layers"][0]["id"], "catchments");

    let (status, _) = get_json(&app.router, "/tiles/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

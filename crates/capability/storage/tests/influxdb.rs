use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use bridge_storage::{InfluxDbConfig, InfluxDbWriter, PointWriter, WriteError};
use chrono::{TimeZone, Utc};
use domain::{ConnectionError, Point};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TOKEN: &str = "secret-token";

#[derive(Clone, Default)]
struct MockInflux {
    bodies: Arc<Mutex<Vec<String>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    write_status: Arc<AtomicU16>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Token {}", TOKEN))
        .unwrap_or(false)
}

async fn buckets(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "code": "unauthorized" })),
        );
    }
    let buckets = if query.get("name").map(String::as_str) == Some("weather_data") {
        serde_json::json!([{ "name": "weather_data" }])
    } else {
        serde_json::json!([])
    };
    (StatusCode::OK, Json(serde_json::json!({ "buckets": buckets })))
}

async fn write(
    State(mock): State<MockInflux>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, String) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "unauthorized".to_string());
    }
    let status = mock.write_status.load(Ordering::SeqCst);
    if status != 0 {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "forced failure".to_string());
    }
    mock.bodies.lock().unwrap().push(body);
    mock.queries.lock().unwrap().push(query);
    (StatusCode::NO_CONTENT, String::new())
}

async fn spawn_mock() -> (MockInflux, String) {
    let mock = MockInflux::default();
    let app = Router::new()
        .route("/api/v2/buckets", get(buckets))
        .route("/api/v2/write", post(write))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (mock, format!("http://{}", addr))
}

fn writer(base: &str, token: &str, bucket: &str) -> InfluxDbWriter {
    InfluxDbWriter::new(InfluxDbConfig {
        url: base.parse().expect("url"),
        token: token.to_string(),
        org: "myorg".to_string(),
        bucket: bucket.to_string(),
        timeout: Duration::from_secs(5),
    })
    .expect("writer")
}

fn sample_point() -> Point {
    Point {
        measurement: "temperature".to_string(),
        fields: [("temperature".to_string(), 23.5)].into_iter().collect(),
        tags: [("location".to_string(), "A".to_string())]
            .into_iter()
            .collect(),
        time: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn influxdb_writer_posts_line_protocol() {
    let (mock, base) = spawn_mock().await;
    let mut writer = writer(&base, TOKEN, "weather_data");
    writer.connect().await.expect("connect");
    writer.write(&sample_point()).await.expect("write");

    let bodies = mock.bodies.lock().unwrap().clone();
    assert_eq!(
        bodies,
        vec!["temperature,location=A temperature=23.5 1717236000000000000".to_string()]
    );
    let query = mock.queries.lock().unwrap()[0].clone();
    assert_eq!(query.get("org").map(String::as_str), Some("myorg"));
    assert_eq!(query.get("bucket").map(String::as_str), Some("weather_data"));
    assert_eq!(query.get("precision").map(String::as_str), Some("ns"));
}

#[tokio::test]
async fn influxdb_writer_batches_in_one_request() {
    let (mock, base) = spawn_mock().await;
    let mut writer = writer(&base, TOKEN, "weather_data");
    writer
        .write_batch(&[sample_point(), sample_point()])
        .await
        .expect("batch");
    let bodies = mock.bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].lines().count(), 2);
}

#[tokio::test]
async fn influxdb_connect_rejects_bad_token() {
    let (_mock, base) = spawn_mock().await;
    let mut writer = writer(&base, "wrong", "weather_data");
    let err = writer.connect().await.expect_err("unauthorized");
    assert!(matches!(err, ConnectionError::RefusedByStorage(ref msg) if msg.contains("credential")));
}

#[tokio::test]
async fn influxdb_connect_rejects_missing_bucket() {
    let (_mock, base) = spawn_mock().await;
    let mut writer = writer(&base, TOKEN, "other_bucket");
    let err = writer.connect().await.expect_err("missing bucket");
    assert_eq!(
        err,
        ConnectionError::RefusedByStorage("bucket not found: other_bucket".to_string())
    );
}

#[tokio::test]
async fn influxdb_status_codes_map_to_write_errors() {
    let (mock, base) = spawn_mock().await;
    let mut writer = writer(&base, TOKEN, "weather_data");

    mock.write_status.store(400, Ordering::SeqCst);
    let err = writer.write(&sample_point()).await.expect_err("rejected");
    assert!(matches!(err, WriteError::Rejected(ref msg) if msg.contains("forced failure")));

    mock.write_status.store(503, Ordering::SeqCst);
    let err = writer.write(&sample_point()).await.expect_err("unreachable");
    assert!(matches!(err, WriteError::Unreachable(_)));

    mock.write_status.store(0, Ordering::SeqCst);
    writer.write(&sample_point()).await.expect("recovered");
}

#[tokio::test]
async fn influxdb_unreachable_endpoint() {
    // 绑定后立即释放端口，确保无人监听
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let base = format!("http://{}", addr);

    let mut writer = writer(&base, TOKEN, "weather_data");
    let err = writer.connect().await.expect_err("refused");
    assert!(matches!(err, ConnectionError::RefusedByStorage(_)));
    let err = writer.write(&sample_point()).await.expect_err("unreachable");
    assert!(matches!(err, WriteError::Unreachable(_)));
}

#[tokio::test]
async fn influxdb_writer_is_unusable_after_close() {
    let (mock, base) = spawn_mock().await;
    let mut writer = writer(&base, TOKEN, "weather_data");
    writer.close().await;
    let err = writer.write(&sample_point()).await.expect_err("closed");
    assert_eq!(err, WriteError::Unreachable("writer closed".to_string()));
    assert!(mock.bodies.lock().unwrap().is_empty());
}

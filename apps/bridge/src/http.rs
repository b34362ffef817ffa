//! 状态接口：GET /health、GET /metrics。
//!
//! 只持有计数器只读句柄与状态订阅，不接触总线和写入器。

use api_contract::{ApiResponse, HealthDto, SessionStatusDto};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use bridge_pipeline::{CountersHandle, SessionState};
use bridge_telemetry::{new_request_ids, targets};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

#[derive(Clone)]
pub struct StatusState {
    pub counters: CountersHandle,
    pub state: watch::Receiver<SessionState>,
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}

async fn health() -> impl IntoResponse {
    Json(HealthDto { ok: true })
}

async fn metrics(State(state): State<StatusState>) -> Response {
    let session_state = *state.state.borrow();
    let snapshot = state.counters.snapshot();
    let dto = SessionStatusDto {
        state: session_state.to_string(),
        written: snapshot
            .written
            .iter()
            .map(|(kind, count)| (kind.name().to_string(), *count))
            .collect(),
        rejected: snapshot.rejected.clone(),
        write_failures: snapshot.write_failures,
        total_written: snapshot.total_written(),
        total_rejected: snapshot.total_rejected(),
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("HTTP.NOT_FOUND", "route not found")),
    )
        .into_response()
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        target: targets::HTTP,
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_ingest::channel;
    use bridge_pipeline::{IngestionSession, SessionConfig};
    use bridge_storage::InMemoryPointWriter;
    use chrono::Utc;
    use domain::{BrokerAddress, RawMessage, default_routes};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn session() -> IngestionSession {
        let (bus, _handle) = channel();
        IngestionSession::new(
            SessionConfig {
                broker: BrokerAddress::new("localhost", 1883),
                connect_timeout: Duration::from_secs(1),
                routes: default_routes(),
                tag_keys: vec!["location".to_string()],
                max_consecutive_unreachable: 0,
            },
            Box::new(bus),
            Box::new(InMemoryPointWriter::new()),
        )
    }

    fn app(session: &IngestionSession) -> Router {
        router(StatusState {
            counters: session.counters(),
            state: session.watch_state(),
        })
    }

    async fn get_json(app: Router, uri: &str) -> (Response, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.expect("body").to_bytes();
        let value = serde_json::from_slice(&bytes).expect("json");
        (Response::from_parts(parts, Body::empty()), value)
    }

    #[tokio::test]
    async fn health_reports_ok_with_request_ids() {
        let session = session();
        let (response, body) = get_json(app(&session), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "ok": true }));
        assert!(response.headers().contains_key("x-request-id"));
        assert!(response.headers().contains_key("x-trace-id"));
    }

    #[tokio::test]
    async fn metrics_reflects_session_counters_and_state() {
        let mut session = session();
        let app = app(&session);

        let (_, body) = get_json(app.clone(), "/metrics").await;
        assert_eq!(body["data"]["state"], "idle");

        session.start().await.expect("start");
        session
            .process(RawMessage::new(
                "data/temperature",
                br#"{"temperature": 21.5}"#.to_vec(),
                Utc::now(),
            ))
            .await
            .expect("process");
        session
            .process(RawMessage::new("data/humidity", b"oops".to_vec(), Utc::now()))
            .await
            .expect("process");

        let (response, body) = get_json(app.clone(), "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["state"], "running");
        assert_eq!(body["data"]["written"]["temperature"], 1);
        assert_eq!(body["data"]["written"]["humidity"], 0);
        assert_eq!(body["data"]["rejected"]["malformed"], 1);
        assert_eq!(body["data"]["totalWritten"], 1);
        assert_eq!(body["data"]["writeFailures"], 0);

        session.shutdown().await;
        let (_, body) = get_json(app, "/metrics").await;
        assert_eq!(body["data"]["state"], "closed");
    }

    #[tokio::test]
    async fn unknown_route_returns_error_envelope() {
        let session = session();
        let (response, body) = get_json(app(&session), "/api/unknown").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "HTTP.NOT_FOUND");
        assert!(response.headers().contains_key("x-request-id"));
    }
}

//! Cloud client tests against an in-process mock backend.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use sitelink_cloud::{
    CloudClient, CloudConfig, CloudError, CloudMetric, CommandResultReport, DiagnosisRequest,
    StationRegistration, StatusUpdate,
};

/// Scripted answer for the next data request.
#[derive(Clone, Copy)]
enum Reply {
    Status(u16),
    Raw(&'static str),
}

struct Backend {
    login_ok: AtomicBool,
    logins: AtomicUsize,
    hits: AtomicUsize,
    script: Mutex<VecDeque<Reply>>,
    stations: Mutex<Vec<(i64, String)>>,
}

impl Backend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            login_ok: AtomicBool::new(true),
            logins: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            stations: Mutex::new(Vec::new()),
        })
    }

    fn script(&self, replies: &[Reply]) {
        self.script.lock().extend(replies.iter().cloned());
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Count the hit and return the scripted reply, if any.
    fn next(&self, headers: &HeaderMap) -> Option<Response> {
        self.hits.fetch_add(1, Ordering::SeqCst);

        let authorized = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Bearer tok-"));
        if !authorized {
            return Some(StatusCode::UNAUTHORIZED.into_response());
        }

        match self.script.lock().pop_front()? {
            Reply::Status(code) => {
                let status = StatusCode::from_u16(code).unwrap();
                Some((status, Json(json!({ "message": format!("scripted {}", code) }))).into_response())
            }
            Reply::Raw(body) => Some((StatusCode::OK, body).into_response()),
        }
    }
}

async fn login(State(backend): State<Arc<Backend>>) -> Response {
    let n = backend.logins.fetch_add(1, Ordering::SeqCst) + 1;
    if backend.login_ok.load(Ordering::SeqCst) {
        Json(json!({ "token": format!("tok-{}", n), "expiresIn": 3600 })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "bad credentials" }))).into_response()
    }
}

async fn metrics_batch(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if let Some(reply) = backend.next(&headers) {
        return reply;
    }
    let count = body["metrics"].as_array().map(Vec::len).unwrap_or(0);
    Json(json!({ "received": count, "status": "ok" })).into_response()
}

async fn device_status(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(_station): Path<String>,
) -> Response {
    backend
        .next(&headers)
        .unwrap_or_else(|| StatusCode::OK.into_response())
}

async fn pending_commands(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(station): Path<String>,
) -> Response {
    if let Some(reply) = backend.next(&headers) {
        return reply;
    }
    Json(json!([
        { "id": 11, "commandType": "reboot", "params": {}, "station": station },
        { "id": 12, "type": "ping" },
    ]))
    .into_response()
}

async fn command_result(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path((_station, _id)): Path<(String, i64)>,
) -> Response {
    backend
        .next(&headers)
        .unwrap_or_else(|| Json(json!({ "accepted": true })).into_response())
}

#[derive(Deserialize)]
struct NameQuery {
    name: Option<String>,
}

async fn list_stations(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(query): Query<NameQuery>,
) -> Response {
    if let Some(reply) = backend.next(&headers) {
        return reply;
    }
    let stations: Vec<_> = backend
        .stations
        .lock()
        .iter()
        .filter(|(_, name)| query.name.as_deref().is_none_or(|q| q == name.as_str()))
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();
    Json(stations).into_response()
}

async fn create_station(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if let Some(reply) = backend.next(&headers) {
        return reply;
    }
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let mut stations = backend.stations.lock();
    if stations.iter().any(|(_, n)| *n == name) {
        return (StatusCode::CONFLICT, Json(json!({ "message": "station exists" }))).into_response();
    }
    let id = 100 + stations.len() as i64;
    stations.push((id, name.clone()));
    (StatusCode::CREATED, Json(json!({ "id": id, "name": name }))).into_response()
}

async fn diagnose(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if let Some(reply) = backend.next(&headers) {
        return reply;
    }
    let metrics = body["metrics"].as_array().map(Vec::len).unwrap_or(0);
    Json(json!({
        "diagnosis": format!("{} metrics nominal", metrics),
        "confidence": 0.9,
        "recommendations": ["check battery string"],
    }))
    .into_response()
}

async fn health() -> Response {
    Json(json!({ "status": "UP" })).into_response()
}

async fn spawn_backend(backend: Arc<Backend>) -> SocketAddr {
    let router = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/v1/metrics/batch", post(metrics_batch))
        .route("/api/base-stations/:id/status", put(device_status))
        .route("/api/base-stations/:id/commands/pending", get(pending_commands))
        .route(
            "/api/base-stations/:id/commands/:cmd/result",
            post(command_result),
        )
        .route("/api/v1/stations", get(list_stations).post(create_station))
        .route("/api/ai/diagnose", post(diagnose))
        .route("/actuator/health", get(health))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Read one HTTP request, headers and body.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);

        if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

async fn write_json(stream: &mut TcpStream, body: serde_json::Value) {
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
}

/// Backend that closes the connection without answering the first
/// `drops` data requests. Returns the address and the data request counter.
async fn spawn_flaky_backend(drops: usize) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;

            if request.starts_with("POST /api/auth/login") {
                write_json(&mut stream, json!({ "token": "tok-1", "expiresIn": 3600 })).await;
                continue;
            }

            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= drops {
                drop(stream);
                continue;
            }
            write_json(&mut stream, json!({ "received": 2, "status": "ok" })).await;
        }
    });

    (addr, hits)
}

fn client_for(addr: SocketAddr, retry_attempts: u32) -> CloudClient {
    let mut config = CloudConfig::new(format!("http://{}", addr), "gateway", "secret");
    config.retry_attempts = retry_attempts;
    config.retry_delay_ms = 10;
    config.timeout_secs = 5;
    CloudClient::new(config).unwrap()
}

fn sample_metrics() -> Vec<CloudMetric> {
    vec![
        CloudMetric::new("TEMPERATURE", 24.5).with_unit("°C"),
        CloudMetric::new("BATTERY_VOLTAGE", 53.6).with_unit("V"),
    ]
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 3);
    client.login().await.unwrap();

    backend.script(&[Reply::Status(503), Reply::Status(503), Reply::Status(503)]);

    let response = client.upload_metrics("BS-001", &sample_metrics()).await.unwrap();
    assert_eq!(response.received, 2);
    assert_eq!(backend.hits(), 4);
}

#[tokio::test]
async fn test_dropped_connections_then_success() {
    let (addr, hits) = spawn_flaky_backend(3).await;
    let client = client_for(addr, 3);
    client.login().await.unwrap();

    let response = client.upload_metrics("BS-001", &sample_metrics()).await.unwrap();
    assert_eq!(response.received, 2);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_dropped_connections_exhaust_retries() {
    let (addr, hits) = spawn_flaky_backend(usize::MAX).await;
    let client = client_for(addr, 1);
    client.login().await.unwrap();

    let err = client
        .upload_metrics("BS-001", &sample_metrics())
        .await
        .unwrap_err();
    match err {
        CloudError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, CloudError::Transport(_)));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_every_attempt_failing_names_attempt_count() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 2);
    client.login().await.unwrap();

    backend.script(&[Reply::Status(500); 5]);

    let err = client
        .upload_metrics("BS-001", &sample_metrics())
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::RetriesExhausted { attempts: 3, .. }));
    assert!(err.to_string().contains("3 attempts"));
    assert!(err.to_string().contains("scripted 500"));
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn test_error_without_structured_body_uses_status() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 0);
    client.login().await.unwrap();

    backend.script(&[Reply::Status(502)]);

    match client.get_pending_commands("BS-001").await.unwrap_err() {
        CloudError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 1);
            assert!(matches!(*last, CloudError::Http { status: 502, .. }));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_no_token_fails_without_request() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 3);

    let err = client
        .upload_metrics("BS-001", &sample_metrics())
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::NoToken));
    assert!(err.is_auth_error());
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_401_relogin_then_success() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 3);
    client.login().await.unwrap();

    backend.script(&[Reply::Status(401)]);

    let commands = client.get_pending_commands("BS-001").await.unwrap();
    assert_eq!(commands.len(), 2);
    assert_eq!(backend.logins(), 2);
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_401_with_failing_login_stops_immediately() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 3);
    client.login().await.unwrap();

    backend.login_ok.store(false, Ordering::SeqCst);
    backend.script(&[Reply::Status(401)]);

    let err = client.get_pending_commands("BS-001").await.unwrap_err();
    assert!(matches!(err, CloudError::AuthFailed(_)));
    assert_eq!(backend.hits(), 1);
    assert_eq!(backend.logins(), 2);
}

#[tokio::test]
async fn test_second_401_after_relogin_aborts() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 3);
    client.login().await.unwrap();

    backend.script(&[Reply::Status(401), Reply::Status(401)]);

    let err = client.get_pending_commands("BS-001").await.unwrap_err();
    assert!(matches!(err, CloudError::AuthFailed(_)));
    assert_eq!(backend.hits(), 2);
    assert_eq!(backend.logins(), 2);
}

#[tokio::test]
async fn test_empty_body_is_success() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 0);
    client.login().await.unwrap();

    let status = StatusUpdate {
        status: "ONLINE".into(),
        message: None,
        firmware_version: Some("2.1.0".into()),
        uptime_secs: Some(3600),
        timestamp: chrono::Utc::now(),
    };
    client.update_device_status("7", &status).await.unwrap();

    backend.script(&[Reply::Raw("")]);
    assert!(client.get_pending_commands("7").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_not_retried() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 3);
    client.login().await.unwrap();

    backend.script(&[Reply::Raw("{\"id\": 1, \"type\"")]);

    let err = client.get_pending_commands("BS-001").await.unwrap_err();
    assert!(matches!(err, CloudError::Decode(_)));
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_empty_upload_makes_no_call() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 3);

    let response = client.upload_metrics("BS-001", &[]).await.unwrap();
    assert_eq!(response.received, 0);
    assert_eq!(backend.hits(), 0);
    assert_eq!(backend.logins(), 0);
}

#[tokio::test]
async fn test_report_command_result() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 0);
    client.login().await.unwrap();

    let report = CommandResultReport {
        success: true,
        output: "done".into(),
        return_code: 0,
        error: None,
        executed_at: chrono::Utc::now(),
    };
    client.report_command_result("BS-001", 11, &report).await.unwrap();
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_request_diagnosis() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 0);
    client.login().await.unwrap();

    let request = DiagnosisRequest {
        station_id: "BS-001".into(),
        metrics: sample_metrics(),
        symptoms: Some("intermittent alarms".into()),
    };
    let response = client.request_diagnosis(&request).await.unwrap();
    assert_eq!(response.diagnosis, "2 metrics nominal");
    assert_eq!(response.recommendations.len(), 1);
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_station_lookup_and_registration() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 0);
    client.login().await.unwrap();

    assert!(client.get_base_station_by_name("BS-001").await.unwrap().is_none());

    let created = client
        .register_station(&StationRegistration {
            name: "BS-001".into(),
            location: Some("Hilltop".into()),
            latitude: None,
            longitude: None,
            description: None,
        })
        .await
        .unwrap();

    let found = client
        .get_base_station_by_name("BS-001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);
}

#[tokio::test]
async fn test_station_lookup_encodes_reserved_characters() {
    let backend = Backend::new();
    backend.stations.lock().push((7, "Site A/1 & B#2".into()));
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 0);
    client.login().await.unwrap();

    let found = client
        .get_base_station_by_name("Site A/1 & B#2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, 7);
    assert!(client.get_base_station_by_name("Site A").await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_rejected() {
    let backend = Backend::new();
    backend.login_ok.store(false, Ordering::SeqCst);
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 3);

    let err = client.login().await.unwrap_err();
    match err {
        CloudError::AuthFailed(message) => assert_eq!(message, "bad credentials"),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!client.is_authenticated());
    assert_eq!(backend.logins(), 1);
}

#[tokio::test]
async fn test_health_check_needs_no_token() {
    let backend = Backend::new();
    let addr = spawn_backend(backend.clone()).await;
    let client = client_for(addr, 3);

    client.health_check().await.unwrap();
    assert_eq!(backend.logins(), 0);
}

#[tokio::test]
async fn test_unreachable_backend() {
    // Bind and drop to get a port nobody listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = client_for(addr, 3);

    assert!(matches!(
        client.health_check().await,
        Err(CloudError::Transport(_))
    ));
    assert!(matches!(client.login().await, Err(CloudError::Transport(_))));
}

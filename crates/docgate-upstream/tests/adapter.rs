use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use docgate_upstream::auth::{
    AUTH_FAILED_MESSAGE, AUTH_SERVICE_ERROR_MESSAGE, INVALID_API_KEY_MESSAGE, NO_TOKEN_MESSAGE,
};
use docgate_upstream::{
    AuthGuard, UploadFile, UpstreamClient, UpstreamClientConfig, UpstreamRequest, routes,
};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Clone, Default)]
struct StubState {
    hits: Arc<Mutex<Vec<Value>>>,
}

impl StubState {
    async fn record(&self, route: &str, headers: &HeaderMap) {
        let authorization = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.hits.lock().await.push(json!({
            "route": route,
            "authorization": authorization,
        }));
    }

    async fn hits_for(&self, route: &str) -> usize {
        self.hits
            .lock()
            .await
            .iter()
            .filter(|hit| hit["route"] == route)
            .count()
    }

    async fn last_authorization(&self) -> Option<String> {
        self.hits
            .lock()
            .await
            .last()
            .and_then(|hit| hit["authorization"].as_str().map(ToString::to_string))
    }
}

const DRIBBLE_LINES: usize = 6;
const DRIBBLE_INTERVAL: Duration = Duration::from_millis(100);
const SLOW_REPLY: Duration = Duration::from_millis(1_500);

/// A body that yields one line every `DRIBBLE_INTERVAL`, so the whole reply
/// takes longer than a 250 ms client timeout.
fn dribbled_lines() -> Body {
    Body::from_stream(futures::stream::unfold(0, |line| async move {
        if line == DRIBBLE_LINES {
            return None;
        }
        tokio::time::sleep(DRIBBLE_INTERVAL).await;
        Some((Ok::<_, Infallible>(format!("data: {line}\n")), line + 1))
    }))
}

async fn start_upstream_stub(
    state: StubState,
) -> Result<(SocketAddr, JoinHandle<std::io::Result<()>>)> {
    let app = Router::new()
        .route(
            "/api/v1/auth",
            get(
                |State(state): State<StubState>, headers: HeaderMap| async move {
                    state.record("auth", &headers).await;
                    let token = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default();
                    match token {
                        "Bearer good" => (StatusCode::OK, Json(json!({"authenticated": true}))),
                        "Bearer broken" => (
                            StatusCode::BAD_GATEWAY,
                            Json(json!({"message": "auth backend down"})),
                        ),
                        _ => (
                            StatusCode::FORBIDDEN,
                            Json(json!({"message": "Invalid API Key"})),
                        ),
                    }
                },
            ),
        )
        .route(
            "/api/v1/admin/users/new",
            post(
                |State(state): State<StubState>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    state.record("create_user", &headers).await;
                    (StatusCode::CREATED, Json(json!({"user": body})))
                },
            ),
        )
        .route(
            "/api/v1/admin/users",
            get(
                |State(state): State<StubState>, headers: HeaderMap| async move {
                    state.record("list_users", &headers).await;
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        Json(json!({"message": "multi-user mode is disabled"})),
                    )
                },
            ),
        )
        .route(
            "/api/v1/system",
            get(
                |State(state): State<StubState>, headers: HeaderMap| async move {
                    state.record("system", &headers).await;
                    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
                },
            ),
        )
        .route(
            "/api/v1/system/export-chats",
            get(
                |State(state): State<StubState>,
                 headers: HeaderMap,
                 Query(query): Query<HashMap<String, String>>| async move {
                    state.record("export_chats", &headers).await;
                    Json(json!({"query": query}))
                },
            ),
        )
        .route(
            "/api/v1/document/upload",
            post(
                |State(state): State<StubState>,
                 headers: HeaderMap,
                 mut multipart: Multipart| async move {
                    state.record("upload", &headers).await;
                    let mut fields = Vec::new();
                    while let Ok(Some(field)) = multipart.next_field().await {
                        let name = field.name().unwrap_or_default().to_string();
                        let file_name = field.file_name().unwrap_or_default().to_string();
                        let size = field.bytes().await.map(|bytes| bytes.len()).unwrap_or(0);
                        fields.push(json!({"name": name, "fileName": file_name, "size": size}));
                    }
                    Json(json!({"success": true, "fields": fields}))
                },
            ),
        )
        .route(
            "/api/v1/workspace/docs/stream-chat",
            post(
                |State(state): State<StubState>, headers: HeaderMap| async move {
                    state.record("stream", &headers).await;
                    "data: {\"textResponse\":\"Hel\"}\n\ndata: {\"textResponse\":\"lo\"}\n"
                },
            ),
        )
        .route(
            "/api/v1/workspace/slow/stream-chat",
            post(|| async { dribbled_lines() }),
        )
        .route(
            "/api/v1/workspace/stalled/stream-chat",
            post(|| async {
                tokio::time::sleep(SLOW_REPLY).await;
                "data: too late\n"
            }),
        )
        .route(
            "/api/v1/workspaces",
            get(|| async {
                tokio::time::sleep(SLOW_REPLY).await;
                Json(json!({"workspaces": []}))
            }),
        )
        .route(
            "/api/v1/workspace/missing/stream-chat",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"message": "workspace not found"})),
                )
            }),
        )
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move { axum::serve(listener, app.into_make_service()).await });
    Ok((addr, handle))
}

fn client_for(addr: SocketAddr) -> Result<UpstreamClient> {
    Ok(UpstreamClient::new(UpstreamClientConfig::new(format!(
        "http://{addr}/api/"
    )))?)
}

fn impatient_client_for(addr: SocketAddr) -> Result<UpstreamClient> {
    Ok(UpstreamClient::new(UpstreamClientConfig {
        timeout_ms: 250,
        ..UpstreamClientConfig::new(format!("http://{addr}/api"))
    })?)
}

async fn unused_local_addr() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

#[tokio::test]
async fn success_payload_and_status_pass_through() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state.clone()).await?;
    let client = client_for(addr)?;

    let result = client
        .request(
            UpstreamRequest::post(routes::admin_user_new_path())
                .json(json!({"username": "x", "password": "y", "role": "default"})),
            "t1",
        )
        .await;

    assert_eq!(result.status, StatusCode::CREATED);
    assert_eq!(result.payload["user"]["username"], "x");
    assert_eq!(state.last_authorization().await.as_deref(), Some("Bearer t1"));
    Ok(())
}

#[tokio::test]
async fn upstream_errors_keep_status_and_extract_message() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state.clone()).await?;
    let client = client_for(addr)?;

    let with_message = client
        .request(UpstreamRequest::get(routes::admin_users_path()), "t1")
        .await;
    assert_eq!(with_message.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        with_message.payload,
        json!({"error": "HTTP Error: multi-user mode is disabled"})
    );

    let raw_text = client
        .request(UpstreamRequest::get(routes::system_path()), "t1")
        .await;
    assert_eq!(raw_text.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        raw_text.error_message(),
        Some("HTTP Error: upstream exploded")
    );
    Ok(())
}

#[tokio::test]
async fn transport_failures_normalize_to_500() -> Result<()> {
    let addr = unused_local_addr().await?;
    let client = client_for(addr)?;

    let result = client
        .request(UpstreamRequest::get(routes::documents_path()), "t1")
        .await;

    assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        result
            .error_message()
            .is_some_and(|message| message.starts_with("Request failed: "))
    );
    Ok(())
}

#[tokio::test]
async fn query_pairs_are_encoded() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state.clone()).await?;
    let client = client_for(addr)?;

    let result = client
        .request(
            UpstreamRequest::get(routes::system_export_chats_path()).query("type", "jsonl"),
            "t1",
        )
        .await;

    assert_eq!(result.status, StatusCode::OK);
    assert_eq!(result.payload["query"]["type"], "jsonl");
    Ok(())
}

#[tokio::test]
async fn multipart_upload_sends_file_field() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state.clone()).await?;
    let client = client_for(addr)?;

    let result = client
        .request(
            UpstreamRequest::post(routes::document_upload_path()).multipart(UploadFile {
                file_name: "notes.txt".to_string(),
                bytes: b"hello upstream".to_vec(),
            }),
            "t1",
        )
        .await;

    assert_eq!(result.status, StatusCode::OK);
    assert_eq!(
        result.payload["fields"],
        json!([{"name": "file", "fileName": "notes.txt", "size": 14}])
    );
    Ok(())
}

#[tokio::test]
async fn auth_guard_without_token_never_reaches_upstream() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state.clone()).await?;
    let guard = AuthGuard::new(client_for(addr)?);

    let missing = guard.authenticate(None).await;
    assert_eq!(missing.status, StatusCode::FORBIDDEN);
    assert_eq!(missing.payload, json!({"error": NO_TOKEN_MESSAGE}));

    let blank = guard.authenticate(Some("  Bearer  ")).await;
    assert_eq!(blank.status, StatusCode::FORBIDDEN);

    assert_eq!(state.hits_for("auth").await, 0);
    Ok(())
}

#[tokio::test]
async fn auth_guard_maps_upstream_outcomes() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state.clone()).await?;
    let guard = AuthGuard::new(client_for(addr)?);

    let accepted = guard.authenticate(Some("Bearer good")).await;
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(accepted.payload, json!({"authenticated": true}));
    assert_eq!(state.last_authorization().await.as_deref(), Some("Bearer good"));

    let rejected = guard.authenticate(Some("bad")).await;
    assert_eq!(rejected.status, StatusCode::FORBIDDEN);
    assert_eq!(rejected.payload, json!({"error": INVALID_API_KEY_MESSAGE}));

    let broken = guard.authenticate(Some("broken")).await;
    assert_eq!(broken.status, StatusCode::BAD_GATEWAY);
    assert_eq!(broken.payload, json!({"error": AUTH_SERVICE_ERROR_MESSAGE}));

    assert_eq!(state.hits_for("auth").await, 3);
    Ok(())
}

#[tokio::test]
async fn auth_guard_reports_unreachable_upstream_as_500() -> Result<()> {
    let guard = AuthGuard::new(client_for(unused_local_addr().await?)?);

    let outcome = guard.authenticate(Some("good")).await;
    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        outcome
            .error_message()
            .is_some_and(|message| message.starts_with("Failed to connect to the authentication service"))
    );
    Ok(())
}

#[tokio::test]
async fn require_wraps_auth_failure_details() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state.clone()).await?;
    let guard = AuthGuard::new(client_for(addr)?);

    let token = guard.require(Some("Bearer good")).await;
    assert_eq!(token, Ok("good".to_string()));

    let failure = guard
        .require(Some("bad"))
        .await
        .expect_err("invalid key must fail");
    assert_eq!(failure.status, StatusCode::FORBIDDEN);
    assert_eq!(
        failure.payload,
        json!({
            "error": AUTH_FAILED_MESSAGE,
            "details": {"error": INVALID_API_KEY_MESSAGE},
        })
    );
    Ok(())
}

#[tokio::test]
async fn stream_lines_reads_body_lazily_and_once() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state.clone()).await?;
    let client = client_for(addr)?;

    let mut lines = client
        .stream_lines(
            UpstreamRequest::post(routes::workspace_action_path("docs", "stream-chat"))
                .json(json!({"message": "hi", "mode": "chat"})),
            "t1",
        )
        .await
        .expect("stream opens");
    assert_eq!(lines.status(), StatusCode::OK);

    let mut seen = Vec::new();
    while let Some(line) = lines.next_line().await {
        seen.push(line);
    }
    assert_eq!(
        seen,
        vec![
            "data: {\"textResponse\":\"Hel\"}".to_string(),
            String::new(),
            "data: {\"textResponse\":\"lo\"}".to_string(),
        ]
    );
    assert_eq!(lines.next_line().await, None);

    let missing = client
        .stream_lines(
            UpstreamRequest::post(routes::workspace_action_path("missing", "stream-chat")),
            "t1",
        )
        .await
        .expect_err("404 must be normalized");
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(
        missing.error_message(),
        Some("HTTP Error: workspace not found")
    );
    Ok(())
}

#[tokio::test]
async fn stream_outlives_the_request_timeout() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state).await?;
    let client = impatient_client_for(addr)?;

    let lines = client
        .stream_lines(
            UpstreamRequest::post(routes::workspace_action_path("slow", "stream-chat"))
                .json(json!({"message": "tell me a long story", "mode": "chat"})),
            "t1",
        )
        .await
        .expect("stream opens before the timeout");
    let seen: Vec<String> = lines.into_stream().collect().await;

    let expected: Vec<String> = (0..DRIBBLE_LINES).map(|line| format!("data: {line}")).collect();
    assert_eq!(seen, expected);
    Ok(())
}

#[tokio::test]
async fn stream_that_never_answers_times_out() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state).await?;
    let client = impatient_client_for(addr)?;

    let failure = client
        .stream_lines(
            UpstreamRequest::post(routes::workspace_action_path("stalled", "stream-chat")),
            "t1",
        )
        .await
        .expect_err("no response head within the timeout");
    assert_eq!(failure.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        failure
            .error_message()
            .is_some_and(|message| message.starts_with("Request failed: timed out")),
        "unexpected failure: {:?}",
        failure.payload
    );
    Ok(())
}

#[tokio::test]
async fn slow_json_reply_reports_the_timeout() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state).await?;
    let client = impatient_client_for(addr)?;

    let result = client
        .request(UpstreamRequest::get(routes::workspaces_path()), "t1")
        .await;

    assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = result.error_message().unwrap_or_default();
    assert!(message.starts_with("Request failed: "), "{message}");
    assert!(message.contains("timed out"), "{message}");
    Ok(())
}

#[tokio::test]
async fn refused_connection_names_the_cause() -> Result<()> {
    let client = client_for(unused_local_addr().await?)?;

    let result = client
        .request(UpstreamRequest::get(routes::documents_path()), "t1")
        .await;

    let message = result.error_message().unwrap_or_default();
    assert!(
        message.matches(": ").count() >= 2,
        "source chain missing from {message}"
    );
    Ok(())
}

#[tokio::test]
async fn dot_segment_path_is_refused_before_sending() -> Result<()> {
    let state = StubState::default();
    let (addr, _server) = start_upstream_stub(state.clone()).await?;
    let client = client_for(addr)?;

    let result = client
        .request(UpstreamRequest::get(routes::workspace_path("..")), "t1")
        .await;

    assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        result
            .error_message()
            .is_some_and(|message| message.contains("invalid upstream path"))
    );
    assert!(state.hits.lock().await.is_empty());
    Ok(())
}

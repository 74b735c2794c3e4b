//! Upstream HTTP adapter for the docgate gateway.
//!
//! Every call made on behalf of a gateway client goes through
//! [`UpstreamClient`], which attaches the bearer credential, applies a bounded
//! timeout and folds the outcome into an [`UpstreamResult`]. Failures are data:
//! an upstream 4xx/5xx keeps its status code, a transport failure becomes 500.

use std::time::Duration;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod auth;
pub mod routes;
pub mod stream;

pub use auth::AuthGuard;
pub use reqwest::StatusCode;
pub use stream::LineStream;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MIN_TIMEOUT_MS: u64 = 250;

const TRANSPORT_FAILURE_STATUS: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;

/// What the client timeout bounds for one outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deadline {
    /// Connect, send and read the whole reply.
    Exchange,
    /// Connect and receive the response head. The body may take as long as
    /// the upstream keeps producing it.
    ResponseHead,
}

#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub verify_tls: bool,
}

impl UpstreamClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            verify_tls: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamClientError {
    #[error("upstream_base_url_missing")]
    BaseUrlMissing,
    #[error("upstream_client_build_failed:{message}")]
    Build { message: String },
}

/// Normalized outcome of one upstream call: the decoded body (or a
/// `{error, details?}` object) paired with the status code to report.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResult {
    pub payload: Value,
    pub status: StatusCode,
}

impl UpstreamResult {
    #[must_use]
    pub fn new(payload: Value, status: StatusCode) -> Self {
        Self { payload, status }
    }

    #[must_use]
    pub fn error(message: impl Into<String>, status: StatusCode) -> Self {
        Self::new(json!({ "error": message.into() }), status)
    }

    #[must_use]
    pub fn error_with_details(message: impl Into<String>, details: Value, status: StatusCode) -> Self {
        Self::new(
            json!({ "error": message.into(), "details": details }),
            status,
        )
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The `error` string carried by a normalized failure payload.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.payload.get("error").and_then(Value::as_str)
    }

    #[must_use]
    pub fn into_parts(self) -> (Value, StatusCode) {
        (self.payload, self.status)
    }
}

/// A file attached as the multipart `file` field.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub enum UpstreamBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(UploadFile),
}

/// One outbound call: verb, route path relative to the base URL, query pairs
/// and body shape.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: UpstreamBody,
}

impl UpstreamRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: UpstreamBody::Empty,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = UpstreamBody::Json(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn multipart(mut self, file: UploadFile) -> Self {
        self.body = UpstreamBody::Multipart(file);
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Result<Self, UpstreamClientError> {
        let base_url = normalize_base_url(&config.base_url)?;
        let timeout = Duration::from_millis(config.timeout_ms.max(MIN_TIMEOUT_MS));
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .connect_timeout(timeout)
            .build()
            .map_err(|error| UpstreamClientError::Build {
                message: error.to_string(),
            })?;
        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins a route path onto the base URL. Paths with `.` or `..` segments
    /// are refused so a route can never climb out of the API prefix.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed
            .split('/')
            .any(|segment| segment == "." || segment == "..")
        {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    /// Sends one request and normalizes the reply.
    ///
    /// 2xx bodies are decoded as JSON (an empty body decodes to `null`).
    /// 4xx/5xx become `{"error": "HTTP Error: <message>"}` with the upstream
    /// status untouched. Anything that prevents a usable reply, including a
    /// timeout or an undecodable 2xx body, becomes
    /// `{"error": "Request failed: <details>"}` with status 500.
    pub async fn request(&self, request: UpstreamRequest, token: &str) -> UpstreamResult {
        match self.send(request, token, Deadline::Exchange).await {
            Ok(response) => normalize_response(response).await,
            Err(message) => transport_failure(&message),
        }
    }

    /// Sends one request and, on a 2xx reply, hands back the body as a lazy
    /// line sequence instead of decoding it. Non-2xx and transport failures are
    /// normalized exactly as [`UpstreamClient::request`] does.
    ///
    /// The configured timeout bounds only the wait for the response head, so
    /// a long generation is not cut off mid-stream.
    pub async fn stream_lines(
        &self,
        request: UpstreamRequest,
        token: &str,
    ) -> Result<LineStream, UpstreamResult> {
        let response = self
            .send(request, token, Deadline::ResponseHead)
            .await
            .map_err(|message| transport_failure(&message))?;
        let status = response.status();
        if !status.is_success() {
            return Err(normalize_response(response).await);
        }
        Ok(LineStream::from_response(response))
    }

    pub(crate) async fn send(
        &self,
        request: UpstreamRequest,
        token: &str,
        deadline: Deadline,
    ) -> Result<reqwest::Response, String> {
        let url = self
            .endpoint(&request.path)
            .ok_or_else(|| format!("invalid upstream path '{}'", request.path))?;

        let mut builder = self
            .http
            .request(request.method.clone(), url.as_str())
            .bearer_auth(token)
            .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()));
        if deadline == Deadline::Exchange {
            builder = builder.timeout(self.timeout);
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            UpstreamBody::Empty => builder,
            UpstreamBody::Json(body) => builder.json(&body),
            UpstreamBody::Multipart(file) => {
                let part = Part::bytes(file.bytes).file_name(file.file_name);
                builder.multipart(Form::new().part("file", part))
            }
        };

        debug!(method = %request.method, url = %url, ?deadline, "sending upstream request");
        let sent = match deadline {
            Deadline::Exchange => builder
                .send()
                .await
                .map_err(|error| describe_transport_error(&error)),
            Deadline::ResponseHead => {
                match tokio::time::timeout(self.timeout, builder.send()).await {
                    Ok(sent) => sent.map_err(|error| describe_transport_error(&error)),
                    Err(_) => Err(format!(
                        "timed out after {} ms waiting for the upstream response",
                        self.timeout.as_millis()
                    )),
                }
            }
        };
        sent.map_err(|message| {
            warn!(method = %request.method, url = %url, error = %message, "upstream transport failure");
            message
        })
    }
}

/// Strips an optional `Bearer ` scheme and surrounding whitespace. The bare
/// credential is the only form forwarded upstream; empty input is no token.
#[must_use]
pub fn normalize_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let bare = match trimmed.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim(),
        _ => trimmed,
    };
    if bare.is_empty() || bare.eq_ignore_ascii_case("bearer") {
        None
    } else {
        Some(bare.to_string())
    }
}

/// Human-readable message for a failed upstream reply: the `message` field of
/// a JSON object body, the whole object when it has none, or the raw text.
#[must_use]
pub fn http_error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("message") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => Value::Object(map).to_string(),
        },
        _ => String::from_utf8_lossy(body).to_string(),
    }
}

#[must_use]
pub fn format_http_error(status: StatusCode, body: &[u8]) -> UpstreamResult {
    UpstreamResult::error(format!("HTTP Error: {}", http_error_message(body)), status)
}

#[must_use]
pub fn transport_failure(details: &str) -> UpstreamResult {
    UpstreamResult::error(
        format!("Request failed: {details}"),
        TRANSPORT_FAILURE_STATUS,
    )
}

/// Renders a reqwest error with its whole source chain. reqwest's own
/// `Display` stops at "error sending request", which hides timeouts and
/// connection refusals.
pub(crate) fn describe_transport_error(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    if error.is_timeout() && !message.contains("timed out") {
        message.push_str(": timed out");
    }
    message
}

fn normalize_base_url(base_url: &str) -> Result<String, UpstreamClientError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(UpstreamClientError::BaseUrlMissing);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

async fn normalize_response(response: reqwest::Response) -> UpstreamResult {
    let status = response.status();
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(error) => return transport_failure(&describe_transport_error(&error)),
    };

    if !status.is_success() {
        return format_http_error(status, &bytes);
    }

    decode_success_body(status, &bytes)
}

fn decode_success_body(status: StatusCode, body: &[u8]) -> UpstreamResult {
    if body.iter().all(u8::is_ascii_whitespace) {
        return UpstreamResult::new(Value::Null, status);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(payload) => UpstreamResult::new(payload, status),
        Err(error) => transport_failure(&format!("invalid JSON in upstream response: {error}")),
    }
}

use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use docgate_upstream::{LineStream, UpstreamResult};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;

use crate::dispatcher::{DispatchError, MethodOutcome};

pub const METHOD_REQUIRED_MESSAGE: &str = "The 'method' field is required";
pub const METHOD_FORMAT_MESSAGE: &str = "The 'method' field must be in the form 'service.method'";
pub const NOT_FOUND_MESSAGE: &str = "The requested service or method was not found";

pub const STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub type ApiErrorTuple = (StatusCode, Json<ApiErrorResponse>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    InvalidRequest,
    NotFound,
    InvalidParams,
}

impl ApiErrorCode {
    pub const fn default_status(self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidParams => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResultEnvelope {
    pub result: Value,
}

pub fn error_response(code: ApiErrorCode, message: impl Into<String>) -> ApiErrorTuple {
    (
        code.default_status(),
        Json(ApiErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn dispatch_error_response(error: &DispatchError) -> ApiErrorTuple {
    match error {
        DispatchError::ServiceNotFound(_) | DispatchError::MethodNotFound { .. } => {
            error_response(ApiErrorCode::NotFound, NOT_FOUND_MESSAGE)
        }
        DispatchError::InvalidParams(message) => {
            error_response(ApiErrorCode::InvalidParams, message.clone())
        }
    }
}

/// 2xx payloads are wrapped as `{"result": ...}`; failures go out as the
/// normalized error object. The upstream status is kept either way.
pub fn result_response(result: UpstreamResult) -> Response {
    let (payload, status) = result.into_parts();
    if status.is_success() {
        (status, Json(ApiResultEnvelope { result: payload })).into_response()
    } else {
        (status, Json(payload)).into_response()
    }
}

/// Forwards upstream lines as they arrive, each terminated by `\n`.
pub fn stream_response(lines: LineStream) -> Response {
    let status = lines.status();
    let body = Body::from_stream(
        lines
            .into_stream()
            .map(|line| Ok::<_, Infallible>(format!("{line}\n"))),
    );
    (status, [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)], body).into_response()
}

pub fn outcome_response(outcome: MethodOutcome) -> Response {
    match outcome {
        MethodOutcome::Json(result) => result_response(result),
        MethodOutcome::Stream(lines) => stream_response(lines),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn dispatch_errors_map_to_statuses() {
        let (status, Json(body)) =
            dispatch_error_response(&DispatchError::ServiceNotFound("ghost".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, NOT_FOUND_MESSAGE);

        let (status, _) = dispatch_error_response(&DispatchError::MethodNotFound {
            service: "admin".to_string(),
            method: "nope".to_string(),
        });
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, Json(body)) = dispatch_error_response(&DispatchError::InvalidParams(
            "missing field `file_path`".to_string(),
        ));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "missing field `file_path`");
    }

    #[test]
    fn result_status_is_preserved() {
        let created = result_response(UpstreamResult::new(json!({"id": 1}), StatusCode::CREATED));
        assert_eq!(created.status(), StatusCode::CREATED);

        let failed = result_response(UpstreamResult::error("HTTP Error: nope", StatusCode::CONFLICT));
        assert_eq!(failed.status(), StatusCode::CONFLICT);
    }
}

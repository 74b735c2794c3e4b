//! JSON-RPC style gateway in front of a document/LLM REST API.
//!
//! Clients POST `{"method": "service.method", ...params}` to `/execute`; the
//! dispatcher resolves the named service from the registry and runs the
//! method against the upstream on the caller's behalf.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use docgate_upstream::UpstreamClientError;
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod api_envelope;
pub mod config;
pub mod dispatcher;
pub mod registry;
pub mod services;

use crate::api_envelope::{
    ApiErrorCode, ApiErrorTuple, METHOD_FORMAT_MESSAGE, METHOD_REQUIRED_MESSAGE,
    dispatch_error_response, error_response, outcome_response,
};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::registry::ServiceRegistry;
use crate::services::{Params, ServiceContext};

const SERVICE_NAME: &str = "docgate-service";

pub const ROUTE_EXECUTE: &str = "/execute";
pub const ROUTE_HEALTHZ: &str = "/healthz";
pub const ROUTE_SERVICES: &str = "/services";

#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
    started_at: SystemTime,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    loaded_services: Vec<String>,
}

/// A parsed `/execute` body: the two halves of `method` and every other field.
#[derive(Debug, PartialEq)]
pub struct Envelope {
    pub service: String,
    pub method: String,
    pub params: Params,
}

pub fn build_router(config: Config) -> Result<Router, UpstreamClientError> {
    let context = ServiceContext::from_config(&config)?;
    let registry = Arc::new(ServiceRegistry::with_builtin_services(context));
    Ok(build_router_with_registry(registry))
}

pub fn build_router_with_registry(registry: Arc<ServiceRegistry>) -> Router {
    let state = AppState {
        dispatcher: Dispatcher::new(registry),
        started_at: SystemTime::now(),
    };

    Router::new()
        .route(ROUTE_EXECUTE, post(execute))
        .route(ROUTE_HEALTHZ, get(health))
        .route(ROUTE_SERVICES, get(list_services))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        )
}

/// Validates an `/execute` body before anything is dispatched.
pub fn parse_envelope(body: &[u8]) -> Result<Envelope, ApiErrorTuple> {
    let Ok(Value::Object(mut params)) = serde_json::from_slice::<Value>(body) else {
        return Err(error_response(
            ApiErrorCode::InvalidRequest,
            METHOD_REQUIRED_MESSAGE,
        ));
    };

    let method = match params.remove("method") {
        None | Some(Value::Null) => {
            return Err(error_response(
                ApiErrorCode::InvalidRequest,
                METHOD_REQUIRED_MESSAGE,
            ));
        }
        Some(Value::String(method)) => method,
        Some(_) => {
            return Err(error_response(
                ApiErrorCode::InvalidRequest,
                METHOD_FORMAT_MESSAGE,
            ));
        }
    };

    let (service, method) = split_method(&method)
        .ok_or_else(|| error_response(ApiErrorCode::InvalidRequest, METHOD_FORMAT_MESSAGE))?;

    Ok(Envelope {
        service: service.to_string(),
        method: method.to_string(),
        params,
    })
}

/// `"service.method"` splits on its only dot; anything else is rejected.
pub fn split_method(raw: &str) -> Option<(&str, &str)> {
    let (service, method) = raw.split_once('.')?;
    if method.contains('.') {
        return None;
    }
    Some((service, method))
}

async fn execute(State(state): State<AppState>, body: Bytes) -> Response {
    let envelope = match parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(rejection) => return rejection.into_response(),
    };

    match state
        .dispatcher
        .invoke(&envelope.service, &envelope.method, envelope.params)
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(error) => dispatch_error_response(&error).into_response(),
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = match state.started_at.elapsed() {
        Ok(duration) => duration.as_secs(),
        Err(_) => 0,
    };

    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        loaded_services: state.dispatcher.registry().loaded_services().await,
    })
}

async fn list_services(
    State(state): State<AppState>,
) -> Json<BTreeMap<&'static str, Vec<&'static str>>> {
    Json(state.dispatcher.registry().catalogue())
}

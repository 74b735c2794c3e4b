//! Service bundles exposed through `POST /execute`.
//!
//! Each bundle owns a [`ServiceContext`] and maps method names onto one
//! upstream route apiece: parse the parameters, run the auth guard, build the
//! request, hand it to the adapter and return whatever comes back.

use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;

use async_trait::async_trait;
use docgate_upstream::{
    AuthGuard, UpstreamClient, UpstreamClientConfig, UpstreamClientError, UpstreamRequest,
    UpstreamResult,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::dispatcher::{DispatchError, MethodOutcome};

pub mod admin;
pub mod auth;
pub mod documents;
pub mod embed;
pub mod openai;
pub mod system_settings;
pub mod user_management;
pub mod workspace;
pub mod workspace_thread;

/// Keyword parameters of one call: every envelope field except `method`.
pub type Params = Map<String, Value>;

#[async_trait]
pub trait GatewayService: Send + Sync {
    fn name(&self) -> &'static str;

    fn methods(&self) -> &'static [&'static str];

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError>;
}

/// Shared wiring handed to every service instance at construction.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub upstream: UpstreamClient,
    pub auth: AuthGuard,
    pub upload_root: Option<PathBuf>,
}

impl ServiceContext {
    pub fn from_config(config: &Config) -> Result<Self, UpstreamClientError> {
        let upstream = UpstreamClient::new(UpstreamClientConfig {
            base_url: config.upstream_base_url.clone(),
            timeout_ms: config.upstream_timeout_ms,
            verify_tls: config.upstream_verify_tls,
        })?;
        Ok(Self {
            auth: AuthGuard::new(upstream.clone()),
            upstream,
            upload_root: config.upload_root.clone(),
        })
    }

    pub async fn authorize(&self, token: Option<&str>) -> Result<String, UpstreamResult> {
        self.auth.require(token).await
    }

    /// Auth check followed by exactly one upstream call.
    pub async fn execute(&self, token: Option<&str>, request: UpstreamRequest) -> MethodOutcome {
        match self.authorize(token).await {
            Ok(token) => MethodOutcome::Json(self.upstream.request(request, &token).await),
            Err(failure) => MethodOutcome::Json(failure),
        }
    }

    pub async fn execute_stream(
        &self,
        token: Option<&str>,
        request: UpstreamRequest,
    ) -> MethodOutcome {
        let token = match self.authorize(token).await {
            Ok(token) => token,
            Err(failure) => return MethodOutcome::Json(failure),
        };
        match self.upstream.stream_lines(request, &token).await {
            Ok(lines) => MethodOutcome::Stream(lines),
            Err(failure) => MethodOutcome::Json(failure),
        }
    }
}

/// Parameters of methods that take nothing but the credential.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenOnly {
    #[serde(default)]
    pub token: Option<String>,
}

pub fn parse_params<T: DeserializeOwned>(params: Params) -> Result<T, DispatchError> {
    serde_json::from_value(Value::Object(params))
        .map_err(|error| DispatchError::InvalidParams(error.to_string()))
}

/// Builds a JSON object from `(key, value)` pairs, dropping unset values.
pub fn compact<I>(fields: I) -> Value
where
    I: IntoIterator<Item = (&'static str, Option<Value>)>,
{
    Value::Object(
        fields
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
            .collect(),
    )
}

/// A caller-supplied string that lands in an upstream URL path. Empty
/// values and the `.`/`..` dot segments are refused at parse time.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct PathSegment(String);

impl PathSegment {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PathSegment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim() {
            "" => Err("path identifier must not be empty".to_string()),
            "." | ".." => Err(format!("path identifier '{value}' is not allowed")),
            _ => Ok(Self(value)),
        }
    }
}

impl Deref for PathSegment {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A path identifier callers may send as a number or a string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PathId {
    Number(i64),
    Text(PathSegment),
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

pub(crate) fn unknown_method(service: &'static str, method: &str) -> DispatchError {
    DispatchError::MethodNotFound {
        service: service.to_string(),
        method: method.to_string(),
    }
}

use std::sync::Arc;

use docgate_upstream::{LineStream, UpstreamResult};
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::ServiceRegistry;
use crate::services::Params;

/// What a service method hands back: a decoded `(payload, status)` pair or an
/// open line stream.
#[derive(Debug)]
pub enum MethodOutcome {
    Json(UpstreamResult),
    Stream(LineStream),
}

impl MethodOutcome {
    pub fn status(&self) -> docgate_upstream::StatusCode {
        match self {
            Self::Json(result) => result.status,
            Self::Stream(lines) => lines.status(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("service '{0}' not found")]
    ServiceNotFound(String),
    #[error("method '{method}' not found on service '{service}'")]
    MethodNotFound { service: String, method: String },
    #[error("{0}")]
    InvalidParams(String),
}

impl DispatchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound(_) | Self::MethodNotFound { .. })
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub async fn invoke(
        &self,
        service_name: &str,
        method_name: &str,
        params: Params,
    ) -> Result<MethodOutcome, DispatchError> {
        let service = self.registry.resolve(service_name).await?;

        if !service.methods().contains(&method_name) {
            warn!(
                service = service_name,
                method = method_name,
                "unknown gateway method"
            );
            return Err(DispatchError::MethodNotFound {
                service: service_name.to_string(),
                method: method_name.to_string(),
            });
        }

        match service.call(method_name, params).await {
            Ok(outcome) => {
                debug!(
                    service = service_name,
                    method = method_name,
                    status = outcome.status().as_u16(),
                    "gateway method completed"
                );
                Ok(outcome)
            }
            Err(error) => {
                warn!(
                    service = service_name,
                    method = method_name,
                    error = %error,
                    "gateway method rejected"
                );
                Err(error)
            }
        }
    }
}

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::routes;
use crate::{
    Deadline, UpstreamClient, UpstreamRequest, UpstreamResult, normalize_response, normalize_token,
};

pub const NO_TOKEN_MESSAGE: &str = "No authorization token provided.";
pub const INVALID_API_KEY_MESSAGE: &str = "Invalid API Key";
pub const AUTH_SERVICE_ERROR_MESSAGE: &str = "Authentication service error";
pub const AUTH_UNREACHABLE_MESSAGE: &str = "Failed to connect to the authentication service";
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";

/// Checks a caller's credential against the upstream `/v1/auth` route before
/// any business call is made with it.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    client: UpstreamClient,
}

impl AuthGuard {
    #[must_use]
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    /// Raw auth outcome. A missing token never reaches the network.
    pub async fn authenticate(&self, token: Option<&str>) -> UpstreamResult {
        let Some(token) = token.and_then(normalize_token) else {
            return UpstreamResult::error(NO_TOKEN_MESSAGE, StatusCode::FORBIDDEN);
        };

        let response = match self
            .client
            .send(
                UpstreamRequest::get(routes::auth_path()),
                &token,
                Deadline::Exchange,
            )
            .await
        {
            Ok(response) => response,
            Err(details) => {
                return UpstreamResult::error(
                    format!("{AUTH_UNREACHABLE_MESSAGE}: {details}"),
                    StatusCode::INTERNAL_SERVER_ERROR,
                );
            }
        };

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            debug!("upstream rejected api key");
            return UpstreamResult::error(INVALID_API_KEY_MESSAGE, status);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "upstream auth service error");
            return UpstreamResult::error(AUTH_SERVICE_ERROR_MESSAGE, status);
        }

        normalize_response(response).await
    }

    /// Auth pre-check used by every business method. On success returns the
    /// bare credential to forward; otherwise the ready-to-return failure,
    /// `{"error": "Authentication failed", "details": <auth payload>}` with the
    /// auth call's status.
    pub async fn require(&self, token: Option<&str>) -> Result<String, UpstreamResult> {
        let outcome = self.authenticate(token).await;
        if outcome.status != StatusCode::OK {
            let (details, status) = outcome.into_parts();
            return Err(UpstreamResult::error_with_details(
                AUTH_FAILED_MESSAGE,
                details,
                status,
            ));
        }

        token
            .and_then(normalize_token)
            .ok_or_else(|| UpstreamResult::error(NO_TOKEN_MESSAGE, StatusCode::FORBIDDEN))
    }
}

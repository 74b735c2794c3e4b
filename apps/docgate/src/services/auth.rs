use async_trait::async_trait;

use super::{GatewayService, Params, ServiceContext, TokenOnly, parse_params, unknown_method};
use crate::dispatcher::{DispatchError, MethodOutcome};

pub const SERVICE_NAME: &str = "auth";

pub const METHODS: &[&str] = &["check"];

/// Exposes the auth guard on its own so callers can validate a key.
pub struct AuthService {
    context: ServiceContext,
}

impl AuthService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl GatewayService for AuthService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError> {
        match method {
            "check" => {
                let params: TokenOnly = parse_params(params)?;
                let outcome = self.context.auth.authenticate(params.token.as_deref()).await;
                Ok(MethodOutcome::Json(outcome))
            }
            other => Err(unknown_method(SERVICE_NAME, other)),
        }
    }
}

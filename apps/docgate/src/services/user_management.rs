use async_trait::async_trait;
use docgate_upstream::{UpstreamRequest, routes};

use super::{GatewayService, Params, ServiceContext, TokenOnly, parse_params, unknown_method};
use crate::dispatcher::{DispatchError, MethodOutcome};

pub const SERVICE_NAME: &str = "usermanagement";

pub const METHODS: &[&str] = &["list_users"];

pub struct UserManagementService {
    context: ServiceContext,
}

impl UserManagementService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl GatewayService for UserManagementService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError> {
        match method {
            "list_users" => {
                let params: TokenOnly = parse_params(params)?;
                Ok(self
                    .context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::users_path()),
                    )
                    .await)
            }
            other => Err(unknown_method(SERVICE_NAME, other)),
        }
    }
}

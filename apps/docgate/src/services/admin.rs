use async_trait::async_trait;
use docgate_upstream::{UpstreamRequest, routes};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    GatewayService, Params, PathId, ServiceContext, TokenOnly, compact, parse_params,
    unknown_method,
};
use crate::dispatcher::{DispatchError, MethodOutcome};

pub const SERVICE_NAME: &str = "admin";

pub const METHODS: &[&str] = &[
    "is_multi_user_mode",
    "list_users",
    "create_user",
    "update_user",
    "delete_user",
    "list_invites",
    "create_invite",
    "deactivate_invite",
];

/// Multi-user administration: users and invitations.
pub struct AdminService {
    context: ServiceContext,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateUserParams {
    #[serde(default)]
    token: Option<String>,
    username: String,
    password: String,
    role: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateUserParams {
    #[serde(default)]
    token: Option<String>,
    user_id: PathId,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    suspended: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserIdParams {
    #[serde(default)]
    token: Option<String>,
    user_id: PathId,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateInviteParams {
    #[serde(default)]
    token: Option<String>,
    workspace_ids: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InviteIdParams {
    #[serde(default)]
    token: Option<String>,
    invite_id: PathId,
}

impl AdminService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl GatewayService for AdminService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError> {
        let outcome = match method {
            "is_multi_user_mode" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::admin_multi_user_mode_path()),
                    )
                    .await
            }
            "list_users" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::admin_users_path()),
                    )
                    .await
            }
            "create_user" => {
                let params: CreateUserParams = parse_params(params)?;
                let body = json!({
                    "username": params.username,
                    "password": params.password,
                    "role": params.role,
                });
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::post(routes::admin_user_new_path()).json(body),
                    )
                    .await
            }
            "update_user" => {
                let params: UpdateUserParams = parse_params(params)?;
                let body = compact([
                    ("username", params.username.map(Value::String)),
                    ("password", params.password.map(Value::String)),
                    ("role", params.role.map(Value::String)),
                    ("suspended", params.suspended),
                ]);
                let path = routes::admin_user_path(&params.user_id.to_string());
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::post(path).json(body),
                    )
                    .await
            }
            "delete_user" => {
                let params: UserIdParams = parse_params(params)?;
                let path = routes::admin_user_path(&params.user_id.to_string());
                self.context
                    .execute(params.token.as_deref(), UpstreamRequest::delete(path))
                    .await
            }
            "list_invites" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::admin_invites_path()),
                    )
                    .await
            }
            "create_invite" => {
                let params: CreateInviteParams = parse_params(params)?;
                let body = json!({ "workspaceIds": params.workspace_ids });
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::post(routes::admin_invite_new_path()).json(body),
                    )
                    .await
            }
            "deactivate_invite" => {
                let params: InviteIdParams = parse_params(params)?;
                let path = routes::admin_invite_path(&params.invite_id.to_string());
                self.context
                    .execute(params.token.as_deref(), UpstreamRequest::delete(path))
                    .await
            }
            other => return Err(unknown_method(SERVICE_NAME, other)),
        };
        Ok(outcome)
    }
}

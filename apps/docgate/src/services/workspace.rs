use async_trait::async_trait;
use docgate_upstream::{UpstreamRequest, UpstreamResult, routes};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    GatewayService, Params, PathSegment, ServiceContext, TokenOnly, parse_params, unknown_method,
};
use crate::dispatcher::{DispatchError, MethodOutcome};

pub const SERVICE_NAME: &str = "workspace";

pub const METHODS: &[&str] = &[
    "create_workspace",
    "list_workspaces",
    "get_workspace_by_slug",
    "delete_workspace",
    "update_workspace",
    "get_workspace_chats",
    "update_workspace_embeddings",
    "update_workspace_pin",
    "chat_with_workspace",
    "stream_chat_with_workspace",
];

pub const WORKSPACE_DELETED_MESSAGE: &str = "Workspace deleted successfully";

/// Workspace lifecycle, settings and chat.
pub struct WorkspaceService {
    context: ServiceContext,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateWorkspaceParams {
    #[serde(default)]
    token: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SlugParams {
    #[serde(default)]
    token: Option<String>,
    slug: PathSegment,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateWorkspaceParams {
    #[serde(default)]
    token: Option<String>,
    slug: PathSegment,
    update_data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbeddingsParams {
    #[serde(default)]
    token: Option<String>,
    slug: PathSegment,
    embeddings_data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PinParams {
    #[serde(default)]
    token: Option<String>,
    slug: PathSegment,
    pin_data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChatParams {
    #[serde(default)]
    token: Option<String>,
    slug: PathSegment,
    chat_data: Value,
}

impl WorkspaceService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }

    async fn delete_workspace(&self, params: SlugParams) -> MethodOutcome {
        let request = UpstreamRequest::delete(routes::workspace_path(&params.slug));
        match self.context.execute(params.token.as_deref(), request).await {
            MethodOutcome::Json(result) if result.is_success() => MethodOutcome::Json(
                UpstreamResult::new(json!({ "message": WORKSPACE_DELETED_MESSAGE }), result.status),
            ),
            other => other,
        }
    }
}

#[async_trait]
impl GatewayService for WorkspaceService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError> {
        let outcome = match method {
            "create_workspace" => {
                let params: CreateWorkspaceParams = parse_params(params)?;
                let request = UpstreamRequest::post(routes::workspace_new_path())
                    .json(json!({ "name": params.name }));
                self.context.execute(params.token.as_deref(), request).await
            }
            "list_workspaces" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::workspaces_path()),
                    )
                    .await
            }
            "get_workspace_by_slug" => {
                let params: SlugParams = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::workspace_path(&params.slug)),
                    )
                    .await
            }
            "delete_workspace" => self.delete_workspace(parse_params(params)?).await,
            "update_workspace" => {
                let params: UpdateWorkspaceParams = parse_params(params)?;
                let request =
                    UpstreamRequest::post(routes::workspace_action_path(&params.slug, "update"))
                        .json(params.update_data);
                self.context.execute(params.token.as_deref(), request).await
            }
            "get_workspace_chats" => {
                let params: SlugParams = parse_params(params)?;
                let path = routes::workspace_action_path(&params.slug, "chats");
                self.context
                    .execute(params.token.as_deref(), UpstreamRequest::get(path))
                    .await
            }
            "update_workspace_embeddings" => {
                let params: EmbeddingsParams = parse_params(params)?;
                let request = UpstreamRequest::post(routes::workspace_action_path(
                    &params.slug,
                    "update-embeddings",
                ))
                .json(params.embeddings_data);
                self.context.execute(params.token.as_deref(), request).await
            }
            "update_workspace_pin" => {
                let params: PinParams = parse_params(params)?;
                let request =
                    UpstreamRequest::post(routes::workspace_action_path(&params.slug, "update-pin"))
                        .json(params.pin_data);
                self.context.execute(params.token.as_deref(), request).await
            }
            "chat_with_workspace" => {
                let params: ChatParams = parse_params(params)?;
                let request =
                    UpstreamRequest::post(routes::workspace_action_path(&params.slug, "chat"))
                        .json(params.chat_data);
                self.context.execute(params.token.as_deref(), request).await
            }
            "stream_chat_with_workspace" => {
                let params: ChatParams = parse_params(params)?;
                let request = UpstreamRequest::post(routes::workspace_action_path(
                    &params.slug,
                    "stream-chat",
                ))
                .json(params.chat_data);
                self.context
                    .execute_stream(params.token.as_deref(), request)
                    .await
            }
            other => return Err(unknown_method(SERVICE_NAME, other)),
        };
        Ok(outcome)
    }
}

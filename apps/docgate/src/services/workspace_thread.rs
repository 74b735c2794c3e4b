use async_trait::async_trait;
use docgate_upstream::{UpstreamRequest, routes};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    GatewayService, Params, PathId, PathSegment, ServiceContext, compact, parse_params,
    unknown_method,
};
use crate::dispatcher::{DispatchError, MethodOutcome};

pub const SERVICE_NAME: &str = "workspacethread";

pub const METHODS: &[&str] = &[
    "create_thread",
    "update_thread",
    "delete_thread",
    "get_thread_chats",
    "chat_with_thread",
    "stream_chat_with_thread",
];

/// Threads inside a workspace, including the streaming chat variant.
pub struct WorkspaceThreadService {
    context: ServiceContext,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateThreadParams {
    #[serde(default)]
    token: Option<String>,
    slug: PathSegment,
    #[serde(default)]
    user_id: Option<PathId>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateThreadParams {
    #[serde(default)]
    token: Option<String>,
    slug: PathSegment,
    thread_slug: PathSegment,
    new_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ThreadParams {
    #[serde(default)]
    token: Option<String>,
    slug: PathSegment,
    thread_slug: PathSegment,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ThreadChatParams {
    #[serde(default)]
    token: Option<String>,
    slug: PathSegment,
    thread_slug: PathSegment,
    message: String,
    mode: String,
    #[serde(default)]
    user_id: Option<PathId>,
}

impl ThreadChatParams {
    fn body(&self) -> Value {
        compact([
            ("message", Some(json!(self.message))),
            ("mode", Some(json!(self.mode))),
            ("userId", self.user_id.as_ref().map(path_id_value)),
        ])
    }
}

fn path_id_value(id: &PathId) -> Value {
    match id {
        PathId::Number(value) => json!(value),
        PathId::Text(value) => json!(value.as_str()),
    }
}

impl WorkspaceThreadService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl GatewayService for WorkspaceThreadService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError> {
        let outcome = match method {
            "create_thread" => {
                let params: CreateThreadParams = parse_params(params)?;
                let body = compact([("userId", params.user_id.as_ref().map(path_id_value))]);
                let request = UpstreamRequest::post(routes::thread_new_path(&params.slug)).json(body);
                self.context.execute(params.token.as_deref(), request).await
            }
            "update_thread" => {
                let params: UpdateThreadParams = parse_params(params)?;
                let request = UpstreamRequest::post(routes::thread_action_path(
                    &params.slug,
                    &params.thread_slug,
                    "update",
                ))
                .json(json!({ "name": params.new_name }));
                self.context.execute(params.token.as_deref(), request).await
            }
            "delete_thread" => {
                let params: ThreadParams = parse_params(params)?;
                let request =
                    UpstreamRequest::delete(routes::thread_path(&params.slug, &params.thread_slug));
                self.context.execute(params.token.as_deref(), request).await
            }
            "get_thread_chats" => {
                let params: ThreadParams = parse_params(params)?;
                let request = UpstreamRequest::get(routes::thread_action_path(
                    &params.slug,
                    &params.thread_slug,
                    "chats",
                ));
                self.context.execute(params.token.as_deref(), request).await
            }
            "chat_with_thread" => {
                let params: ThreadChatParams = parse_params(params)?;
                let request = UpstreamRequest::post(routes::thread_action_path(
                    &params.slug,
                    &params.thread_slug,
                    "chat",
                ))
                .json(params.body());
                self.context.execute(params.token.as_deref(), request).await
            }
            "stream_chat_with_thread" => {
                let params: ThreadChatParams = parse_params(params)?;
                let request = UpstreamRequest::post(routes::thread_action_path(
                    &params.slug,
                    &params.thread_slug,
                    "stream-chat",
                ))
                .json(params.body());
                self.context
                    .execute_stream(params.token.as_deref(), request)
                    .await
            }
            other => return Err(unknown_method(SERVICE_NAME, other)),
        };
        Ok(outcome)
    }
}

use async_trait::async_trait;
use docgate_upstream::{UpstreamRequest, routes};
use serde::Deserialize;

use super::{
    GatewayService, Params, PathSegment, ServiceContext, TokenOnly, parse_params, unknown_method,
};
use crate::dispatcher::{DispatchError, MethodOutcome};

pub const SERVICE_NAME: &str = "embed";

pub const METHODS: &[&str] = &[
    "list_embeds",
    "get_chats_for_embed",
    "get_chats_for_embed_session",
];

pub struct EmbedService {
    context: ServiceContext,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbedParams {
    #[serde(default)]
    token: Option<String>,
    embed_uuid: PathSegment,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbedSessionParams {
    #[serde(default)]
    token: Option<String>,
    embed_uuid: PathSegment,
    session_uuid: PathSegment,
}

impl EmbedService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl GatewayService for EmbedService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError> {
        let outcome = match method {
            "list_embeds" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::embeds_path()),
                    )
                    .await
            }
            "get_chats_for_embed" => {
                let params: EmbedParams = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::embed_chats_path(&params.embed_uuid)),
                    )
                    .await
            }
            "get_chats_for_embed_session" => {
                let params: EmbedSessionParams = parse_params(params)?;
                let path = routes::embed_session_chats_path(&params.embed_uuid, &params.session_uuid);
                self.context
                    .execute(params.token.as_deref(), UpstreamRequest::get(path))
                    .await
            }
            other => return Err(unknown_method(SERVICE_NAME, other)),
        };
        Ok(outcome)
    }
}

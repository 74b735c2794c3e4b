use async_trait::async_trait;
use docgate_upstream::{UpstreamRequest, routes};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    GatewayService, Params, ServiceContext, TokenOnly, compact, parse_params, unknown_method,
};
use crate::dispatcher::{DispatchError, MethodOutcome};

pub const SERVICE_NAME: &str = "openai";

pub const METHODS: &[&str] = &[
    "list_models",
    "chat_completions",
    "get_embeddings",
    "list_vector_stores",
];

const DEFAULT_TEMPERATURE: f64 = 0.7;

/// OpenAI-compatible endpoints of the upstream.
pub struct OpenAiService {
    context: ServiceContext,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChatCompletionsParams {
    #[serde(default)]
    token: Option<String>,
    model_slug: String,
    messages: Vec<Value>,
    #[serde(default)]
    stream: bool,
    #[serde(default = "default_temperature")]
    temperature: f64,
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbeddingsParams {
    #[serde(default)]
    token: Option<String>,
    input_texts: Value,
    #[serde(default)]
    model: Option<String>,
}

impl OpenAiService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl GatewayService for OpenAiService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError> {
        let outcome = match method {
            "list_models" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::openai_models_path()),
                    )
                    .await
            }
            "chat_completions" => {
                let params: ChatCompletionsParams = parse_params(params)?;
                let body = json!({
                    "model": params.model_slug,
                    "messages": params.messages,
                    "stream": params.stream,
                    "temperature": params.temperature,
                });
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::post(routes::openai_chat_completions_path()).json(body),
                    )
                    .await
            }
            "get_embeddings" => {
                let params: EmbeddingsParams = parse_params(params)?;
                let body = compact([
                    ("input", Some(params.input_texts)),
                    ("model", params.model.map(Value::String)),
                ]);
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::post(routes::openai_embeddings_path()).json(body),
                    )
                    .await
            }
            "list_vector_stores" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::openai_vector_stores_path()),
                    )
                    .await
            }
            other => return Err(unknown_method(SERVICE_NAME, other)),
        };
        Ok(outcome)
    }
}

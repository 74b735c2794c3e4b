use async_trait::async_trait;
use docgate_upstream::{UpstreamRequest, routes};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{GatewayService, Params, ServiceContext, TokenOnly, parse_params, unknown_method};
use crate::dispatcher::{DispatchError, MethodOutcome};

pub const SERVICE_NAME: &str = "systemsettings";

pub const METHODS: &[&str] = &[
    "dump_settings",
    "get_system_settings",
    "get_vector_count",
    "update_system_setting",
    "export_chats",
    "remove_documents",
];

/// Instance-wide settings, exports and document removal.
pub struct SystemSettingsService {
    context: ServiceContext,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateSettingParams {
    #[serde(default)]
    token: Option<String>,
    update_data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExportChatsParams {
    #[serde(default)]
    token: Option<String>,
    export_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoveDocumentsParams {
    #[serde(default)]
    token: Option<String>,
    document_names: Vec<String>,
}

impl SystemSettingsService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }

    async fn get(&self, params: Params, path: &str) -> Result<MethodOutcome, DispatchError> {
        let params: TokenOnly = parse_params(params)?;
        Ok(self
            .context
            .execute(params.token.as_deref(), UpstreamRequest::get(path))
            .await)
    }
}

#[async_trait]
impl GatewayService for SystemSettingsService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError> {
        match method {
            "dump_settings" => self.get(params, routes::system_env_dump_path()).await,
            "get_system_settings" => self.get(params, routes::system_path()).await,
            "get_vector_count" => self.get(params, routes::system_vector_count_path()).await,
            "update_system_setting" => {
                let params: UpdateSettingParams = parse_params(params)?;
                let request =
                    UpstreamRequest::post(routes::system_update_env_path()).json(params.update_data);
                Ok(self.context.execute(params.token.as_deref(), request).await)
            }
            "export_chats" => {
                let params: ExportChatsParams = parse_params(params)?;
                let request = UpstreamRequest::get(routes::system_export_chats_path())
                    .query("type", params.export_type);
                Ok(self.context.execute(params.token.as_deref(), request).await)
            }
            "remove_documents" => {
                let params: RemoveDocumentsParams = parse_params(params)?;
                let request = UpstreamRequest::delete(routes::system_remove_documents_path())
                    .json(json!({ "names": params.document_names }));
                Ok(self.context.execute(params.token.as_deref(), request).await)
            }
            other => Err(unknown_method(SERVICE_NAME, other)),
        }
    }
}

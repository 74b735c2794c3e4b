use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docgate_upstream::{UploadFile, UpstreamRequest, routes};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    GatewayService, Params, PathSegment, ServiceContext, TokenOnly, parse_params, unknown_method,
};
use crate::dispatcher::{DispatchError, MethodOutcome};

pub const SERVICE_NAME: &str = "documents";

pub const METHODS: &[&str] = &[
    "upload_file",
    "upload_link",
    "upload_raw_text",
    "list_documents",
    "get_accepted_file_types",
    "get_metadata_schema",
    "get_document_by_name",
    "create_folder",
    "move_files",
];

/// Document ingestion and storage management.
pub struct DocumentsService {
    context: ServiceContext,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UploadFileParams {
    #[serde(default)]
    token: Option<String>,
    file_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UploadLinkParams {
    #[serde(default)]
    token: Option<String>,
    link: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UploadRawTextParams {
    #[serde(default)]
    token: Option<String>,
    text_content: String,
    metadata: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DocNameParams {
    #[serde(default)]
    token: Option<String>,
    doc_name: PathSegment,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateFolderParams {
    #[serde(default)]
    token: Option<String>,
    folder_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MoveFilesParams {
    #[serde(default)]
    token: Option<String>,
    files_to_move: Vec<Value>,
}

impl DocumentsService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }

    async fn upload_file(&self, params: UploadFileParams) -> Result<MethodOutcome, DispatchError> {
        let token = match self.context.authorize(params.token.as_deref()).await {
            Ok(token) => token,
            Err(failure) => return Ok(MethodOutcome::Json(failure)),
        };

        let file = read_upload(&params.file_path, self.context.upload_root.as_deref()).await?;
        let request = UpstreamRequest::post(routes::document_upload_path()).multipart(file);
        Ok(MethodOutcome::Json(
            self.context.upstream.request(request, &token).await,
        ))
    }
}

/// Loads the file to upload, refusing paths outside `upload_root` when one is
/// configured.
async fn read_upload(path: &Path, upload_root: Option<&Path>) -> Result<UploadFile, DispatchError> {
    let resolved = tokio::fs::canonicalize(path).await.map_err(|error| {
        DispatchError::InvalidParams(format!(
            "cannot read file '{}': {error}",
            path.display()
        ))
    })?;

    if let Some(root) = upload_root {
        let root = tokio::fs::canonicalize(root).await.map_err(|error| {
            DispatchError::InvalidParams(format!(
                "upload root '{}' is unavailable: {error}",
                root.display()
            ))
        })?;
        if !resolved.starts_with(&root) {
            return Err(DispatchError::InvalidParams(format!(
                "file '{}' is outside the upload root",
                path.display()
            )));
        }
    }

    let bytes = tokio::fs::read(&resolved).await.map_err(|error| {
        DispatchError::InvalidParams(format!(
            "cannot read file '{}': {error}",
            path.display()
        ))
    })?;
    let file_name = resolved
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());

    Ok(UploadFile { file_name, bytes })
}

#[async_trait]
impl GatewayService for DocumentsService {
    fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    async fn call(&self, method: &str, params: Params) -> Result<MethodOutcome, DispatchError> {
        let outcome = match method {
            "upload_file" => return self.upload_file(parse_params(params)?).await,
            "upload_link" => {
                let params: UploadLinkParams = parse_params(params)?;
                let body = json!({ "link": params.link });
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::post(routes::document_upload_link_path()).json(body),
                    )
                    .await
            }
            "upload_raw_text" => {
                let params: UploadRawTextParams = parse_params(params)?;
                let body = json!({
                    "textContent": params.text_content,
                    "metadata": params.metadata,
                });
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::post(routes::document_raw_text_path()).json(body),
                    )
                    .await
            }
            "list_documents" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::documents_path()),
                    )
                    .await
            }
            "get_accepted_file_types" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::document_accepted_file_types_path()),
                    )
                    .await
            }
            "get_metadata_schema" => {
                let params: TokenOnly = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::document_metadata_schema_path()),
                    )
                    .await
            }
            "get_document_by_name" => {
                let params: DocNameParams = parse_params(params)?;
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::get(routes::document_path(&params.doc_name)),
                    )
                    .await
            }
            "create_folder" => {
                let params: CreateFolderParams = parse_params(params)?;
                let body = json!({ "name": params.folder_name });
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::post(routes::document_create_folder_path()).json(body),
                    )
                    .await
            }
            "move_files" => {
                let params: MoveFilesParams = parse_params(params)?;
                let body = json!({ "files": params.files_to_move });
                self.context
                    .execute(
                        params.token.as_deref(),
                        UpstreamRequest::post(routes::document_move_files_path()).json(body),
                    )
                    .await
            }
            other => return Err(unknown_method(SERVICE_NAME, other)),
        };
        Ok(outcome)
    }
}

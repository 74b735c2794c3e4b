//! Route templates of the upstream API, relative to the configured base URL.
//!
//! Caller-supplied identifiers are percent-encoded into a single path
//! segment, so `/`, `?` and `#` inside an id cannot change the route.

use std::borrow::Cow;

/// One caller-supplied path segment, trimmed and percent-encoded.
#[must_use]
pub fn segment(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw.trim())
}

#[must_use]
pub fn auth_path() -> &'static str {
    "/v1/auth"
}

#[must_use]
pub fn admin_multi_user_mode_path() -> &'static str {
    "/v1/admin/is-multi-user-mode"
}

#[must_use]
pub fn admin_users_path() -> &'static str {
    "/v1/admin/users"
}

#[must_use]
pub fn admin_user_new_path() -> &'static str {
    "/v1/admin/users/new"
}

#[must_use]
pub fn admin_user_path(user_id: &str) -> String {
    format!("/v1/admin/users/{}", segment(user_id))
}

#[must_use]
pub fn admin_invites_path() -> &'static str {
    "/v1/admin/invites"
}

#[must_use]
pub fn admin_invite_new_path() -> &'static str {
    "/v1/admin/invite/new"
}

#[must_use]
pub fn admin_invite_path(invite_id: &str) -> String {
    format!("/v1/admin/invite/{}", segment(invite_id))
}

#[must_use]
pub fn document_upload_path() -> &'static str {
    "/v1/document/upload"
}

#[must_use]
pub fn document_upload_link_path() -> &'static str {
    "/v1/document/upload-link"
}

#[must_use]
pub fn document_raw_text_path() -> &'static str {
    "/v1/document/raw-text"
}

#[must_use]
pub fn documents_path() -> &'static str {
    "/v1/documents"
}

#[must_use]
pub fn document_accepted_file_types_path() -> &'static str {
    "/v1/document/accepted-file-types"
}

#[must_use]
pub fn document_metadata_schema_path() -> &'static str {
    "/v1/document/metadata-schema"
}

#[must_use]
pub fn document_path(doc_name: &str) -> String {
    format!("/v1/document/{}", segment(doc_name))
}

#[must_use]
pub fn document_create_folder_path() -> &'static str {
    "/v1/document/create-folder"
}

#[must_use]
pub fn document_move_files_path() -> &'static str {
    "/v1/document/move-files"
}

#[must_use]
pub fn embeds_path() -> &'static str {
    "/v1/embed"
}

#[must_use]
pub fn embed_chats_path(embed_uuid: &str) -> String {
    format!("/v1/embed/{}/chats", segment(embed_uuid))
}

#[must_use]
pub fn embed_session_chats_path(embed_uuid: &str, session_uuid: &str) -> String {
    format!(
        "/v1/embed/{}/chats/{}",
        segment(embed_uuid),
        segment(session_uuid)
    )
}

#[must_use]
pub fn openai_models_path() -> &'static str {
    "/v1/openai/models"
}

#[must_use]
pub fn openai_chat_completions_path() -> &'static str {
    "/v1/openai/chat/completions"
}

#[must_use]
pub fn openai_embeddings_path() -> &'static str {
    "/v1/openai/embeddings"
}

#[must_use]
pub fn openai_vector_stores_path() -> &'static str {
    "/v1/openai/vector_stores"
}

#[must_use]
pub fn system_env_dump_path() -> &'static str {
    "/v1/system/env-dump"
}

#[must_use]
pub fn system_path() -> &'static str {
    "/v1/system"
}

#[must_use]
pub fn system_vector_count_path() -> &'static str {
    "/v1/system/vector-count"
}

#[must_use]
pub fn system_update_env_path() -> &'static str {
    "/v1/system/update-env"
}

#[must_use]
pub fn system_export_chats_path() -> &'static str {
    "/v1/system/export-chats"
}

#[must_use]
pub fn system_remove_documents_path() -> &'static str {
    "/v1/system/remove-documents"
}

#[must_use]
pub fn users_path() -> &'static str {
    "/v1/users"
}

#[must_use]
pub fn workspace_new_path() -> &'static str {
    "/v1/workspace/new"
}

#[must_use]
pub fn workspaces_path() -> &'static str {
    "/v1/workspaces"
}

#[must_use]
pub fn workspace_path(slug: &str) -> String {
    format!("/v1/workspace/{}", segment(slug))
}

#[must_use]
pub fn workspace_action_path(slug: &str, action: &str) -> String {
    format!("/v1/workspace/{}/{}", segment(slug), action)
}

#[must_use]
pub fn thread_new_path(slug: &str) -> String {
    format!("/v1/workspace/{}/thread/new", segment(slug))
}

#[must_use]
pub fn thread_path(slug: &str, thread_slug: &str) -> String {
    format!(
        "/v1/workspace/{}/thread/{}",
        segment(slug),
        segment(thread_slug)
    )
}

#[must_use]
pub fn thread_action_path(slug: &str, thread_slug: &str, action: &str) -> String {
    format!("{}/{}", thread_path(slug, thread_slug), action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers_are_deterministic() {
        assert_eq!(auth_path(), "/v1/auth");
        assert_eq!(admin_user_path(" 42 "), "/v1/admin/users/42");
        assert_eq!(admin_invite_path("7"), "/v1/admin/invite/7");
        assert_eq!(document_path("a.json"), "/v1/document/a.json");
        assert_eq!(
            embed_session_chats_path("emb-1", "sess-2"),
            "/v1/embed/emb-1/chats/sess-2"
        );
        assert_eq!(workspace_path("docs"), "/v1/workspace/docs");
        assert_eq!(
            workspace_action_path("docs", "update-embeddings"),
            "/v1/workspace/docs/update-embeddings"
        );
        assert_eq!(thread_new_path("docs"), "/v1/workspace/docs/thread/new");
        assert_eq!(
            thread_action_path("docs", "t-1", "stream-chat"),
            "/v1/workspace/docs/thread/t-1/stream-chat"
        );
    }

    #[test]
    fn identifiers_cannot_escape_their_segment() {
        assert_eq!(
            document_path("custom-documents/a.json"),
            "/v1/document/custom-documents%2Fa.json"
        );
        assert_eq!(
            workspace_path("x/../../admin/users/5"),
            "/v1/workspace/x%2F..%2F..%2Fadmin%2Fusers%2F5"
        );
        assert_eq!(
            thread_path("docs", "t?delete=1#frag"),
            "/v1/workspace/docs/thread/t%3Fdelete%3D1%23frag"
        );
        assert_eq!(admin_user_path("7 8"), "/v1/admin/users/7%208");
        assert_eq!(
            embed_session_chats_path("emb/1", " s "),
            "/v1/embed/emb%2F1/chats/s"
        );
    }
}

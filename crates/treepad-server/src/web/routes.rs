//! Route handlers.

use serde_json::{json, Map, Value};
use tiny_http::Method;
use tracing::error;
use treepad_fs::{FsError, FsErrorKind};

use super::{ApiReply, ApiRequest, AppContext};
use crate::ai::{AiError, ChatMessage};

pub(super) fn dispatch(ctx: &AppContext, request: &ApiRequest) -> ApiReply {
    match (&request.method, request.path.as_str()) {
        (Method::Get, "/") => {
            ApiReply::json(200, &json!({ "status": "ok", "message": "File server running" }))
        }
        (Method::Get, "/api/list") => list(ctx, request),
        (Method::Get, "/api/file") => file(ctx, request),
        (Method::Get, "/api/raw") => raw(ctx, request),
        (Method::Post, "/api/save") => with_body(request, |body| save(ctx, body)),
        (Method::Post, "/api/create-file") => with_body(request, |body| create_file(ctx, body)),
        (Method::Post, "/api/create-folder") => {
            with_body(request, |body| create_folder(ctx, body))
        }
        (Method::Post, "/api/rename") => with_body(request, |body| rename(ctx, body)),
        (Method::Post, "/api/delete") => with_body(request, |body| delete(ctx, body)),
        (Method::Post, "/api/set-base-dir") => with_body(request, |body| set_base_dir(ctx, body)),
        (Method::Get, "/api/workspaces") => ApiReply::json(
            200,
            &json!({
                "workspaces": ctx.workspaces.list_workspaces(),
                "active": ctx.workspaces.active_workspace(),
            }),
        ),
        (Method::Post, "/api/workspaces") => with_body(request, |body| add_workspace(ctx, body)),
        (Method::Delete, "/api/workspaces") => {
            with_body(request, |body| remove_workspace(ctx, body))
        }
        (Method::Post, "/api/ai/chat") => with_body(request, |body| ai_chat(ctx, body)),
        _ => error_reply(404, "Not found"),
    }
}

fn error_reply(status: u16, message: &str) -> ApiReply {
    ApiReply::json(status, &json!({ "error": message }))
}

/// Maps a file-service failure; 500s carry only `generic`.
fn fs_failure(err: &FsError, generic: &str) -> ApiReply {
    match err.kind() {
        FsErrorKind::AccessDenied => error_reply(403, err.message()),
        FsErrorKind::NotFound | FsErrorKind::AlreadyExists | FsErrorKind::InvalidInput => {
            error_reply(400, err.message())
        }
        FsErrorKind::NotADirectory | FsErrorKind::Upstream | FsErrorKind::Internal => {
            error!("{generic}: {}", err.message());
            error_reply(err.status_code(), generic)
        }
    }
}

fn with_body(
    request: &ApiRequest,
    route: impl FnOnce(&Map<String, Value>) -> ApiReply,
) -> ApiReply {
    match serde_json::from_slice::<Value>(&request.body) {
        Ok(Value::Object(body)) => route(&body),
        Ok(_) | Err(_) => error_reply(400, "invalid json"),
    }
}

/// A non-empty string field.
fn field<'a>(body: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    body.get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn list(ctx: &AppContext, request: &ApiRequest) -> ApiReply {
    let dir = request
        .query_param("dir")
        .filter(|dir| !dir.is_empty())
        .unwrap_or("/");
    match ctx.files().list(dir) {
        Ok(listing) => ApiReply::json(
            200,
            &json!({
                "files": listing.files,
                "basePath": listing.base_path,
                "currentBaseDir": listing.current_base_dir,
                "workspaces": ctx.workspaces.list_workspaces(),
                "active": ctx.workspaces.active_workspace(),
            }),
        ),
        Err(err) => fs_failure(&err, "Failed to list directory"),
    }
}

fn file(ctx: &AppContext, request: &ApiRequest) -> ApiReply {
    let Some(path) = request.query_param("path").filter(|path| !path.is_empty()) else {
        return error_reply(400, "File path required");
    };
    match ctx.files().read_text(path) {
        Ok(file) => ApiReply::json(200, &json!({ "content": file.content, "path": file.path })),
        Err(err) => fs_failure(&err, "Failed to read file"),
    }
}

fn raw(ctx: &AppContext, request: &ApiRequest) -> ApiReply {
    let Some(path) = request.query_param("path").filter(|path| !path.is_empty()) else {
        return ApiReply::text(400, "Path required");
    };
    match ctx.files().read_raw(path) {
        Ok(raw) => ApiReply::bytes(200, raw.mime, raw.bytes),
        Err(err) if err.kind() == FsErrorKind::AccessDenied => error_reply(403, err.message()),
        Err(err) => {
            error!("Failed to read file {path}: {}", err.message());
            ApiReply::text(err.status_code(), "Failed to read file")
        }
    }
}

fn save(ctx: &AppContext, body: &Map<String, Value>) -> ApiReply {
    let content = body.get("content").and_then(Value::as_str);
    let (Some(path), Some(content)) = (field(body, "path"), content) else {
        return error_reply(400, "File path and content required");
    };
    match ctx.files().save(path, content) {
        Ok(path) => ApiReply::json(200, &json!({ "success": true, "path": path })),
        Err(err) => fs_failure(&err, "Failed to save file"),
    }
}

fn create_file(ctx: &AppContext, body: &Map<String, Value>) -> ApiReply {
    let Some(path) = field(body, "filePath") else {
        return error_reply(400, "File path required");
    };
    let content = body.get("content").and_then(Value::as_str).unwrap_or("");
    match ctx.files().create_file(path, content) {
        Ok(path) => ApiReply::json(200, &json!({ "success": true, "path": path })),
        Err(err) => fs_failure(&err, "Failed to create file"),
    }
}

fn create_folder(ctx: &AppContext, body: &Map<String, Value>) -> ApiReply {
    let Some(path) = field(body, "folderPath") else {
        return error_reply(400, "Folder path required");
    };
    match ctx.files().create_folder(path) {
        Ok(path) => ApiReply::json(200, &json!({ "success": true, "path": path })),
        Err(err) => fs_failure(&err, "Failed to create folder"),
    }
}

fn rename(ctx: &AppContext, body: &Map<String, Value>) -> ApiReply {
    let (Some(old_path), Some(new_path)) = (field(body, "oldPath"), field(body, "newPath")) else {
        return error_reply(400, "oldPath and newPath required");
    };
    match ctx.files().rename(old_path, new_path) {
        Ok(result) => ApiReply::json(
            200,
            &json!({ "success": true, "oldPath": result.old_path, "newPath": result.new_path }),
        ),
        Err(err) => fs_failure(&err, "Failed to rename"),
    }
}

fn delete(ctx: &AppContext, body: &Map<String, Value>) -> ApiReply {
    let Some(path) = field(body, "path") else {
        return error_reply(400, "Path required");
    };
    match ctx.files().delete(path) {
        Ok(()) => ApiReply::json(200, &json!({ "success": true })),
        Err(err) => fs_failure(&err, "Failed to delete"),
    }
}

fn set_base_dir(ctx: &AppContext, body: &Map<String, Value>) -> ApiReply {
    let Some(base_dir) = field(body, "baseDir") else {
        return error_reply(400, "Base directory required");
    };
    match ctx.workspaces.set_active_base_dir(base_dir) {
        Ok(base_dir) => ApiReply::json(200, &json!({ "success": true, "baseDir": base_dir })),
        Err(err) => {
            error!("Failed to set base directory: {}", err.message());
            error_reply(500, "Failed to set base directory")
        }
    }
}

fn add_workspace(ctx: &AppContext, body: &Map<String, Value>) -> ApiReply {
    let Some(path) = field(body, "path") else {
        return error_reply(400, "Path required");
    };
    match ctx.workspaces.add_workspace(path) {
        Ok(workspaces) => ApiReply::json(200, &json!({ "workspaces": workspaces })),
        Err(err) => fs_failure(&err, err.message()),
    }
}

fn remove_workspace(ctx: &AppContext, body: &Map<String, Value>) -> ApiReply {
    let Some(path) = field(body, "path") else {
        return error_reply(400, "Path required");
    };
    match ctx.workspaces.remove_workspace(path) {
        Ok(workspaces) => ApiReply::json(200, &json!({ "workspaces": workspaces })),
        Err(err) => fs_failure(&err, err.message()),
    }
}

fn ai_chat(ctx: &AppContext, body: &Map<String, Value>) -> ApiReply {
    let path = field(body, "path");
    let messages = body
        .get("messages")
        .filter(|messages| messages.is_array())
        .and_then(|messages| serde_json::from_value::<Vec<ChatMessage>>(messages.clone()).ok());
    let (Some(path), Some(messages)) = (path, messages) else {
        return error_reply(400, "Bad request");
    };
    let resolved = match ctx.files().resolve(path) {
        Ok(resolved) => resolved,
        Err(err) => return fs_failure(&err, "Server error"),
    };
    let content = std::fs::read_to_string(&resolved.full).unwrap_or_default();
    let relative = resolved.client.trim_start_matches('/');

    match ctx.ai.chat(relative, &content, &messages) {
        Ok(reply) => match serde_json::to_value(&reply) {
            Ok(body) => ApiReply::json(200, &body),
            Err(err) => {
                error!("failed to encode llm reply: {err}");
                error_reply(500, "Server error")
            }
        },
        Err(AiError::Upstream { details }) => {
            error!("llm upstream failed: {details}");
            ApiReply::json(500, &json!({ "error": "LLM error", "details": details }))
        }
        Err(err) => error_reply(500, &err.to_string()),
    }
}

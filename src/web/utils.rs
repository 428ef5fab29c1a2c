//! Shared utility functions for the web handlers.

use axum::extract::rejection::{FormRejection, PathRejection};
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::de::DeserializeOwned;

use crate::storage::{CommentRow, PostThread, ProfileRow, StorageError};

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

/// Map a storage failure onto an HTTP status.
pub fn storage_error_response(e: StorageError) -> Response {
    match e {
        StorageError::NotFound(what) => api_error(StatusCode::NOT_FOUND, format!("{what} not found")),
        StorageError::AlreadyExists(what) => {
            api_error(StatusCode::CONFLICT, format!("{what} already exists"))
        }
        StorageError::MissingParent(detail) => api_error(StatusCode::NOT_FOUND, detail),
        other => {
            crate::plog!("storage failure: {}", other);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// A urlencoded body as it arrived, repeated keys included.
pub type RawForm = Result<Form<Vec<(String, String)>>, FormRejection>;

/// The `{id}` segment of a route, or a 400 if it is not an integer.
pub fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, Response> {
    path.map(|Path(id)| id)
        .map_err(|rejection| api_error(StatusCode::BAD_REQUEST, rejection.body_text()))
}

/// Decode a form body into `T`. When a key repeats, its first value wins.
pub fn parse_form<T: DeserializeOwned>(form: RawForm) -> Result<T, Response> {
    let Form(pairs) =
        form.map_err(|rejection| api_error(StatusCode::BAD_REQUEST, rejection.body_text()))?;
    serde_json::from_value(first_values(pairs))
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid form: {e}")))
}

fn first_values(pairs: Vec<(String, String)>) -> serde_json::Value {
    let mut fields = serde_json::Map::new();
    for (key, value) in pairs {
        fields
            .entry(key)
            .or_insert(serde_json::Value::String(value));
    }
    serde_json::Value::Object(fields)
}

/// Unwrap a form field or produce a 400 naming it.
pub fn required(value: Option<String>, field: &str) -> Result<String, Response> {
    value.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("missing field: {field}")))
}

/// JSON view of a profile. The password hash is never exposed.
pub fn profile_to_json(p: &ProfileRow) -> serde_json::Value {
    serde_json::json!({
        "id": p.id,
        "firstname": p.firstname,
        "lastname": p.lastname,
        "username": p.username,
    })
}

fn comment_to_json(c: &CommentRow) -> serde_json::Value {
    serde_json::json!({
        "id": c.id,
        "post_id": c.post_id,
        "content": c.content,
    })
}

pub fn thread_to_json(t: &PostThread) -> serde_json::Value {
    let comments: Vec<serde_json::Value> = t.comments.iter().map(comment_to_json).collect();
    serde_json::json!({
        "id": t.post.id,
        "profile_id": t.post.profile_id,
        "title": t.post.title,
        "content": t.post.content,
        "comments": comments,
    })
}

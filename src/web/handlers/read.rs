//! Viewing a profile and adding posts or comments to it.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::logging::{post_ref, profile_ref};
use crate::storage::{CommentRow, PostRow, Storage, StorageError};
use crate::web::flash::take_flashes;
use crate::web::state::SharedState;
use crate::web::utils::{
    api_error, parse_form, path_id, profile_to_json, storage_error_response, thread_to_json,
    RawForm,
};

#[derive(Debug, Default, Deserialize)]
pub struct ReadForm {
    post_content: Option<String>,
    comment_content: Option<String>,
    post_id: Option<String>,
}

/// What a `POST /read/{id}` asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadAction {
    AddPost { content: String },
    AddComment { post_id: i64, content: String },
}

impl ReadForm {
    /// A post submission wins over a comment if both are present.
    pub fn into_action(self) -> Result<ReadAction, String> {
        if let Some(content) = self.post_content {
            return Ok(ReadAction::AddPost { content });
        }
        if let Some(content) = self.comment_content {
            let raw = self.post_id.ok_or("missing field: post_id")?;
            let post_id = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid post_id: {raw}"))?;
            return Ok(ReadAction::AddComment { post_id, content });
        }
        Err("expected post_content or comment_content".to_string())
    }
}

pub fn post_title(username: &str) -> String {
    format!("Posted by: {username}")
}

/// The profile page payload: the profile, its posts with comments, and flashes.
fn profile_page(
    storage: &Storage,
    id: i64,
    flashes: &[String],
) -> Result<serde_json::Value, StorageError> {
    let (profile, threads) = storage.get_profile_with_posts(id)?;
    let posts: Vec<serde_json::Value> = threads.iter().map(thread_to_json).collect();
    Ok(serde_json::json!({
        "profile": profile_to_json(&profile),
        "posts": posts,
        "flashes": flashes,
    }))
}

/// Body for a committed add. If the page cannot be re-read the row still
/// exists, so the client gets the created id instead of an error.
fn created_body(
    page: Result<serde_json::Value, StorageError>,
    created: serde_json::Value,
    flashes: &[String],
) -> serde_json::Value {
    match page {
        Ok(mut body) => {
            body["created"] = created;
            body
        }
        Err(e) => {
            crate::plog!("read: page reload failed after commit: {}", e);
            serde_json::json!({
                "created": created,
                "flashes": flashes,
            })
        }
    }
}

pub async fn read_profile_handler(
    State(state): State<SharedState>,
    path: Result<Path<i64>, PathRejection>,
    jar: CookieJar,
) -> Response {
    let id = match path_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let st = state.lock().await;
    let (jar, flashes) = take_flashes(jar);
    match profile_page(&st.storage, id, &flashes) {
        Ok(body) => (StatusCode::OK, jar, axum::Json(body)).into_response(),
        Err(e) => storage_error_response(e),
    }
}

pub async fn add_to_profile_handler(
    State(state): State<SharedState>,
    path: Result<Path<i64>, PathRejection>,
    jar: CookieJar,
    form: RawForm,
) -> Response {
    let id = match path_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let form: ReadForm = match parse_form(form) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let profile = match st.storage.require_profile(id) {
        Ok(p) => p,
        Err(e) => return storage_error_response(e),
    };

    let action = match form.into_action() {
        Ok(a) => a,
        Err(msg) => return api_error(StatusCode::BAD_REQUEST, msg),
    };

    let (flash, created) = match action {
        ReadAction::AddPost { content } => {
            let row = PostRow {
                id: 0,
                profile_id: profile.id,
                title: post_title(&profile.username),
                content,
            };
            match st.storage.insert_post(&row) {
                Ok(post_id) => {
                    crate::plog!(
                        "read: {} added {}",
                        profile_ref(profile.id, &profile.username),
                        post_ref(post_id)
                    );
                    ("Posted!", serde_json::json!({ "kind": "post", "id": post_id }))
                }
                Err(e) => return storage_error_response(e),
            }
        }
        ReadAction::AddComment { post_id, content } => {
            if let Err(e) = st.storage.require_post(post_id) {
                return storage_error_response(e);
            }
            let row = CommentRow {
                id: 0,
                post_id,
                content,
            };
            match st.storage.insert_comment(&row) {
                Ok(comment_id) => {
                    crate::plog!(
                        "read: comment #{} on {} via {}",
                        comment_id,
                        post_ref(post_id),
                        profile_ref(profile.id, &profile.username)
                    );
                    (
                        "Commented!",
                        serde_json::json!({ "kind": "comment", "id": comment_id }),
                    )
                }
                Err(e) => return storage_error_response(e),
            }
        }
    };

    let (jar, mut flashes) = take_flashes(jar);
    flashes.push(flash.to_string());
    let page = profile_page(&st.storage, id, &flashes);
    let body = created_body(page, created, &flashes);
    (StatusCode::CREATED, jar, axum::Json(body)).into_response()
}

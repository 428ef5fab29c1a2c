//! Profile listing, creation, update and deletion.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::logging::profile_ref;
use crate::storage::{ProfileRow, StorageError};
use crate::web::flash::{push_flash, take_flashes};
use crate::web::state::SharedState;
use crate::web::utils::{
    parse_form, path_id, profile_to_json, required, storage_error_response, RawForm,
};

const CREATE_FIELDS: [&str; 4] = ["firstname", "lastname", "username", "password"];

#[derive(Debug, Default, Deserialize)]
pub struct CreateProfileForm {
    firstname: Option<String>,
    lastname: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileForm {
    firstname: Option<String>,
    lastname: Option<String>,
}

pub async fn list_profiles_handler(State(state): State<SharedState>, jar: CookieJar) -> Response {
    let st = state.lock().await;
    match st.storage.list_profiles() {
        Ok(profiles) => {
            let (jar, flashes) = take_flashes(jar);
            let json: Vec<serde_json::Value> = profiles.iter().map(profile_to_json).collect();
            let body = serde_json::json!({
                "profiles": json,
                "flashes": flashes,
            });
            (StatusCode::OK, jar, axum::Json(body)).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

pub async fn new_profile_form_handler(jar: CookieJar) -> Response {
    let (jar, flashes) = take_flashes(jar);
    let body = serde_json::json!({
        "fields": CREATE_FIELDS,
        "flashes": flashes,
    });
    (StatusCode::OK, jar, axum::Json(body)).into_response()
}

pub async fn create_profile_handler(
    State(state): State<SharedState>,
    jar: CookieJar,
    form: RawForm,
) -> Response {
    let form: CreateProfileForm = match parse_form(form) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let fields = required(form.firstname, "firstname").and_then(|firstname| {
        Ok((
            firstname,
            required(form.lastname, "lastname")?,
            required(form.username, "username")?,
            required(form.password, "password")?,
        ))
    });
    let (firstname, lastname, username, password) = match fields {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let mut row = ProfileRow {
        id: 0,
        firstname,
        lastname,
        username,
        password: st.hasher.hash(&password),
    };

    let id = match st.storage.insert_profile(&row) {
        Ok(id) => id,
        Err(e) => {
            crate::plog!("create: rejected username {}: {}", row.username, e);
            return storage_error_response(e);
        }
    };
    row.id = id;
    crate::plog!("create: profile {}", profile_ref(row.id, &row.username));

    let (jar, mut flashes) = take_flashes(jar);
    flashes.push(format!("{} added successfully", row.username));
    let body = serde_json::json!({
        "profile": profile_to_json(&row),
        "flashes": flashes,
    });
    (StatusCode::CREATED, jar, axum::Json(body)).into_response()
}

pub async fn edit_profile_handler(
    State(state): State<SharedState>,
    path: Result<Path<i64>, PathRejection>,
    jar: CookieJar,
) -> Response {
    let id = match path_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let st = state.lock().await;
    match st.storage.require_profile(id) {
        Ok(profile) => {
            let (jar, flashes) = take_flashes(jar);
            let body = serde_json::json!({
                "profile": profile_to_json(&profile),
                "flashes": flashes,
            });
            (StatusCode::OK, jar, axum::Json(body)).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

pub async fn update_profile_handler(
    State(state): State<SharedState>,
    path: Result<Path<i64>, PathRejection>,
    jar: CookieJar,
    form: RawForm,
) -> Response {
    let id = match path_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let form: UpdateProfileForm = match parse_form(form) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let st = state.lock().await;
    let profile = match st.storage.require_profile(id) {
        Ok(p) => p,
        Err(e) => return storage_error_response(e),
    };

    let (firstname, lastname) = match required(form.firstname, "firstname")
        .and_then(|f| Ok((f, required(form.lastname, "lastname")?)))
    {
        Ok(names) => names,
        Err(resp) => return resp,
    };

    if let Err(e) = st.storage.update_profile_names(id, &firstname, &lastname) {
        return storage_error_response(e);
    }
    crate::plog!("update: profile {}", profile_ref(id, &profile.username));

    let jar = push_flash(jar, format!("{} updated successfully", profile.username));
    (jar, Redirect::to("/")).into_response()
}

pub async fn delete_profile_handler(
    State(state): State<SharedState>,
    path: Result<Path<i64>, PathRejection>,
    jar: CookieJar,
) -> Response {
    let id = match path_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let st = state.lock().await;
    let profile = match st.storage.require_profile(id) {
        Ok(p) => p,
        Err(e) => return storage_error_response(e),
    };

    match st.storage.delete_profile(id) {
        Ok(Some(removed)) => {
            crate::plog!(
                "delete: profile {} with {} post(s) and {} comment(s)",
                profile_ref(id, &profile.username),
                removed.posts,
                removed.comments
            );
            let jar = push_flash(jar, "Deleted successfully");
            (jar, Redirect::to("/")).into_response()
        }
        Ok(None) => storage_error_response(StorageError::NotFound(format!("profile {id}"))),
        Err(e) => storage_error_response(e),
    }
}

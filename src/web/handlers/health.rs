//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::web::state::SharedState;
use crate::web::utils::storage_error_response;

pub async fn health_handler(State(state): State<SharedState>) -> Response {
    let st = state.lock().await;
    match st.storage.count_profiles() {
        Ok(profiles) => {
            let body = serde_json::json!({
                "status": "ok",
                "profiles": profiles,
            });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

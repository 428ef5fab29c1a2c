//! Axum router construction.

use axum::routing::get;
use axum::Router;

use crate::web::handlers;
use crate::web::state::SharedState;

/// Build the complete router with every page route.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::profiles::list_profiles_handler))
        .route("/health", get(handlers::health::health_handler))
        .route(
            "/read/:id",
            get(handlers::read::read_profile_handler).post(handlers::read::add_to_profile_handler),
        )
        .route(
            "/new",
            get(handlers::profiles::new_profile_form_handler)
                .post(handlers::profiles::create_profile_handler),
        )
        .route(
            "/update/:id",
            get(handlers::profiles::edit_profile_handler)
                .post(handlers::profiles::update_profile_handler),
        )
        .route(
            "/delete/:id",
            get(handlers::profiles::delete_profile_handler),
        )
        .with_state(state)
}

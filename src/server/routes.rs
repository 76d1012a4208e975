//! HTTP route definitions.

use axum::routing::get;
use axum::Router;

use super::handlers::{self, AppState};

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/api/book",
            get(handlers::hello).post(handlers::upsert_books),
        )
        .with_state(app_state)
}

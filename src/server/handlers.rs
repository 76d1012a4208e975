//! HTTP request handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use crate::app::{BookrateError, Result};
use crate::domain::BookPostBody;
use crate::store::BookStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookStore + Send + Sync>,
}

#[derive(Debug, Serialize)]
struct UpsertReply {
    status: &'static str,
    #[serde(flatten)]
    body: BookPostBody,
}

#[derive(Debug, Serialize)]
struct UpsertFailure {
    error: &'static str,
    message: String,
    #[serde(flatten)]
    body: BookPostBody,
}

pub async fn hello() -> impl IntoResponse {
    Json(json!({ "Hello World": "api/book/GET" }))
}

/// Upsert every record in the body into its table
pub fn persist(store: &dyn BookStore, body: &BookPostBody) -> Result<()> {
    if let Some(goodreads) = body.goodreads.as_ref() {
        let id = store.upsert_goodreads_book(goodreads)?;
        debug!("goodreads_book {:?} -> {:?}", goodreads.title, id);
    }
    for (retailer, book) in body.listings() {
        let id = store.upsert_book(retailer, book)?;
        debug!("{} {:?} -> {:?}", retailer.table(), book.title, id);
    }
    Ok(())
}

pub async fn upsert_books(
    State(state): State<AppState>,
    Json(body): Json<BookPostBody>,
) -> impl IntoResponse {
    let store = state.store.clone();
    let echo = body.clone();
    let result = tokio::task::spawn_blocking(move || persist(store.as_ref(), &body))
        .await
        .map_err(|e| BookrateError::Other(e.to_string()))
        .and_then(|r| r);

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(UpsertReply {
                status: "OK",
                body: echo,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Error executing query: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(UpsertFailure {
                    error: "Internal Server Error",
                    message: e.to_string(),
                    body: echo,
                }),
            )
                .into_response()
        }
    }
}

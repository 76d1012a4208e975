//! Companion HTTP server.
//!
//! Receives book records posted by the rating service and upserts them into
//! the relational store.

pub mod handlers;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::{BookrateError, Result};
use crate::store::BookStore;

pub use handlers::AppState;
pub use routes::create_router;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,

    /// Book database file; defaults to the data directory
    pub database: Option<PathBuf>,

    /// Allow cross-origin requests
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            database: None,
            cors_enabled: true,
        }
    }
}

pub struct BookServer {
    config: ServerConfig,
    store: Arc<dyn BookStore + Send + Sync>,
}

impl BookServer {
    pub fn new(config: ServerConfig, store: Arc<dyn BookStore + Send + Sync>) -> Self {
        Self { config, store }
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self.config.listen_addr.parse().map_err(|e| {
            BookrateError::Config(format!(
                "Invalid listen address {}: {}",
                self.config.listen_addr, e
            ))
        })?;

        let mut app = create_router(AppState {
            store: self.store.clone(),
        });

        if self.config.cors_enabled {
            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any)
                .allow_origin(Any);
            app = app.layer(cors);
        }

        app = app.layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(&addr).await?;
        info!("Book server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Book server shutting down");
            })
            .await?;

        Ok(())
    }
}

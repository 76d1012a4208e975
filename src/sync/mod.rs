//! Server sync.
//!
//! Observed listings and Goodreads results are posted to the companion
//! server (`POST /api/book`). Sync is best effort: failures are logged and
//! never reach the caller of a rating lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::Result;
use crate::domain::BookPostBody;
use crate::fetcher::DEFAULT_USER_AGENT;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000/api/book";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Post observed books to the server (default: true)
    pub enabled: bool,

    /// Full URL of the book endpoint
    pub server_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: DEFAULT_SERVER_URL.to_string(),
        }
    }
}

/// Destination for book records
#[async_trait]
pub trait BookSink: Send + Sync {
    async fn send(&self, body: &BookPostBody) -> Result<()>;
}

pub struct ServerSync {
    client: Client,
    server_url: String,
}

impl ServerSync {
    pub fn new(server_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            server_url: server_url.into(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

#[async_trait]
impl BookSink for ServerSync {
    async fn send(&self, body: &BookPostBody) -> Result<()> {
        let response = self.client.post(&self.server_url).json(body).send().await?;
        response.error_for_status_ref()?;
        info!(
            "Synced {} to server",
            body.first_title().unwrap_or("<untitled>")
        );
        Ok(())
    }
}

/// Sink used when sync is turned off
pub struct DisabledSync;

#[async_trait]
impl BookSink for DisabledSync {
    async fn send(&self, body: &BookPostBody) -> Result<()> {
        debug!(
            "Sync disabled, dropping {}",
            body.first_title().unwrap_or("<untitled>")
        );
        Ok(())
    }
}

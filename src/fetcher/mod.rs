//! Page fetching.
//!
//! ```text
//! URL → Fetcher → HTML string → dom::Page
//! ```
//!
//! [`HttpFetcher`] issues a plain GET and is what the Goodreads client uses.
//! [`ChromeFetcher`] drives headless Chrome so retailer pages that render
//! their listings with JavaScript can be snapshotted after they settle.

mod chrome;
mod config;
mod http_fetcher;

pub use chrome::ChromeFetcher;
pub use config::BrowserConfig;
pub use http_fetcher::{HttpFetcher, DEFAULT_USER_AGENT};

use async_trait::async_trait;

use crate::app::Result;

#[async_trait]
pub trait Fetcher {
    /// Fetch `url` and return the response body as text
    async fn fetch(&self, url: &str) -> Result<String>;
}

//! Goodreads search client.
//!
//! Looks a book up through the public search page and reads the first result
//! row. There is no API involved, so a layout change on Goodreads shows up as
//! `found: false` rather than an error.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::app::Result;
use crate::dom::{element_text, parse_selector};
use crate::domain::RatingResponse;
use crate::fetcher::Fetcher;
use crate::text;

pub const DEFAULT_BASE_URL: &str = "https://www.goodreads.com";

const RESULT_ROW: &str = r#"table.tableList tr[itemtype="http://schema.org/Book"]"#;

static MINIRATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.\d{2}) avg rating — ([\d,]+) rating").expect("hardcoded regex pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoodreadsConfig {
    /// Site root, without a trailing slash
    pub base_url: String,

    /// Request timeout in seconds (default: 10)
    pub timeout_secs: u64,
}

impl Default for GoodreadsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl GoodreadsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The term sent to Goodreads: the title unless it is Chinese and a
/// non-Chinese subtitle (usually the original title) is available
pub fn search_term<'a>(title: &'a str, subtitle: Option<&'a str>) -> &'a str {
    if !text::contains_chinese(title) {
        return title;
    }
    match subtitle {
        Some(sub) if !sub.is_empty() && !text::contains_chinese(sub) => {
            info!("Using original title {} to search instead of {}", sub, title);
            sub
        }
        _ => title,
    }
}

pub fn search_url(base_url: &str, term: &str) -> Result<String> {
    let mut url = Url::parse(&format!("{}/search", base_url.trim_end_matches('/')))?;
    url.query_pairs_mut().append_pair("q", term);
    Ok(url.to_string())
}

/// Read the first book row of a search result page
pub fn parse_search_results(html: &str, base_url: &str) -> Result<RatingResponse> {
    let document = Html::parse_document(html);
    let row_selector = parse_selector(RESULT_ROW)?;

    let Some(row) = document.select(&row_selector).next() else {
        return Ok(RatingResponse::not_found());
    };

    let mut response = RatingResponse {
        found: true,
        ..Default::default()
    };

    // later matches win when a row carries several links or rating lines
    for link in select(row, "a.bookTitle")? {
        if let Some(href) = link.value().attr("href") {
            response.url = Some(format!("{}{}", base_url.trim_end_matches('/'), href));
        }
        response.title = Some(element_text(link));
    }

    for minirating in select(row, ".minirating")? {
        let line = minirating.text().collect::<String>();
        match MINIRATING.captures(&line) {
            Some(caps) => {
                response.rating = caps.get(1).and_then(|m| m.as_str().parse().ok());
                response.num_ratings = caps
                    .get(2)
                    .and_then(|m| m.as_str().replace(',', "").parse().ok());
            }
            None => warn!("No rating found in: {}", line.trim()),
        }
    }

    Ok(response)
}

fn select<'a>(scope: ElementRef<'a>, selector: &str) -> Result<Vec<ElementRef<'a>>> {
    let selector = parse_selector(selector)?;
    Ok(scope.select(&selector).collect())
}

pub struct GoodreadsClient {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    base_url: String,
}

impl GoodreadsClient {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search Goodreads for the book; network failures are returned as errors
    pub async fn search(&self, title: &str, subtitle: Option<&str>) -> Result<RatingResponse> {
        let term = search_term(title, subtitle);
        let url = search_url(&self.base_url, term)?;
        debug!("Searching Goodreads: {}", url);

        let html = self.fetcher.fetch(&url).await?;
        let response = parse_search_results(&html, &self.base_url)?;
        if !response.found {
            warn!("Cannot find book with name {}", title);
        }
        Ok(response)
    }
}

//! Page pipeline: route, extract, look up, render.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::background::RatingBridge;
use crate::dom::Page;
use crate::router::ContentRouter;

/// What one pass over a page did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageReport {
    pub handler: Option<String>,
    pub listings: usize,
    pub found: usize,
    pub inserted: usize,
}

/// Process every unprocessed listing on `page`.
///
/// Failures for a single listing are logged and skipped; a page no handler
/// accepts yields an empty report.
pub async fn process_page(router: &ContentRouter, page: &mut Page, bridge: &RatingBridge) -> PageReport {
    let url = page.url().to_string();
    let Some(handler) = router.route(&url) else {
        return PageReport::default();
    };

    let listings = handler.extract(page);
    let mut report = PageReport {
        handler: Some(handler.name().to_string()),
        listings: listings.len(),
        ..Default::default()
    };

    for listing in &listings {
        debug!("{}: looking up {}", handler.name(), listing.book.display_title());
        let rating = match bridge.fetch_rating(&listing.book).await {
            Ok(rating) => rating,
            Err(e) => {
                warn!("{}: rating request for {} failed: {}", handler.name(), listing.book.title, e);
                continue;
            }
        };

        if !rating.found {
            debug!("{}: no Goodreads match for {}", handler.name(), listing.book.title);
            continue;
        }
        report.found += 1;

        match handler.render(page, listing, &rating) {
            Ok(true) => report.inserted += 1,
            Ok(false) => {}
            Err(e) => warn!("{}: failed to insert rating for {}: {}", handler.name(), listing.book.title, e),
        }
    }

    info!(
        "{}: {} listings, {} ratings found, {} widgets inserted",
        handler.name(),
        report.listings,
        report.found,
        report.inserted
    );
    report
}

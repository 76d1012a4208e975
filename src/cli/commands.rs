use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;
use url::Url;

use crate::app::{AppContext, BookrateError, Result};
use crate::content::{process_page, PageReport};
use crate::dom::Page;
use crate::domain::{BookData, Retailer};
use crate::fetcher::{ChromeFetcher, Fetcher};
use crate::router::ContentRouter;
use crate::server::BookServer;
use crate::store::BookStore;

/// Where the HTML of a scanned page comes from
pub enum PageSource<'a> {
    File(&'a Path),
    Browser,
    Http,
}

pub async fn scan(
    ctx: &AppContext,
    url: &str,
    source: PageSource<'_>,
    output: Option<&Path>,
) -> Result<PageReport> {
    let page_url = Url::parse(url)?;
    let router = ContentRouter::with_default_handlers();
    if router.route(url).is_none() {
        return Err(BookrateError::NoHandler(url.to_string()));
    }

    let html = match source {
        PageSource::File(path) => std::fs::read_to_string(path)?,
        PageSource::Browser => {
            let chrome = ChromeFetcher::new(ctx.config.browser.clone()).await?;
            let html = chrome.fetch(url).await;
            chrome.close().await;
            html?
        }
        PageSource::Http => ctx.fetcher.fetch(url).await?,
    };

    let (bridge, handle) = ctx.start_rating_service()?;
    let mut page = Page::parse(page_url, &html);
    let report = process_page(&router, &mut page, &bridge).await;
    bridge.shutdown().await;
    let _ = handle.await;

    println!(
        "{}: {} listings, {} ratings found, {} widgets inserted",
        report.handler.as_deref().unwrap_or("-"),
        report.listings,
        report.found,
        report.inserted
    );

    if let Some(path) = output {
        std::fs::write(path, page.to_html())?;
        println!("Wrote annotated page to {}", path.display());
    }

    Ok(report)
}

pub async fn lookup(ctx: &AppContext, title: &str, subtitle: Option<&str>) -> Result<()> {
    let (bridge, handle) = ctx.start_rating_service()?;

    let mut book = BookData {
        title: title.to_string(),
        ..Default::default()
    };
    book.subtitle = subtitle.map(str::to_string);
    let rating = bridge.fetch_rating(&book).await;
    bridge.shutdown().await;
    let _ = handle.await;
    let rating = rating?;

    if !rating.found {
        println!("No Goodreads match for {}", book.display_title());
        return Ok(());
    }

    println!(
        "{}\n  {} avg rating, {} ratings\n  {}",
        rating.title.as_deref().unwrap_or(title),
        rating.display_rating(),
        rating.num_ratings.unwrap_or_default(),
        rating.url.as_deref().unwrap_or_default()
    );
    Ok(())
}

pub async fn serve(ctx: &AppContext, listen: Option<String>) -> Result<()> {
    let mut config = ctx.config.server.clone();
    if let Some(listen) = listen {
        config.listen_addr = listen;
    }

    let server = BookServer::new(config, ctx.store.clone());
    server
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

pub fn clean_cache(ctx: &AppContext) -> Result<()> {
    let removed = ctx.cache.clean()?;
    let remaining = ctx.cache.len()?;
    println!(
        "Removed {} of {} cached ratings",
        removed.len(),
        removed.len() + remaining
    );
    Ok(())
}

pub fn list_cache(ctx: &AppContext) -> Result<()> {
    let entries = ctx.cache.entries()?;

    if entries.is_empty() {
        println!("Cache is empty");
        return Ok(());
    }

    for (key, rating) in entries {
        let cached = rating
            .timestamp
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "          ".to_string());

        if rating.found {
            println!(
                "{} {} {} ({} ratings)",
                cached,
                key,
                rating.display_rating(),
                rating.num_ratings.unwrap_or_default()
            );
        } else {
            println!("{} {} not found", cached, key);
        }
    }

    Ok(())
}

pub fn clear_cache(ctx: &AppContext) -> Result<()> {
    let removed = ctx.cache.clear()?;
    info!("Cleared rating cache");
    println!("Removed {} cached ratings", removed);
    Ok(())
}

pub fn list_books(ctx: &AppContext, source: Option<&str>) -> Result<()> {
    let store = ctx.store.as_ref();

    match source {
        None => {
            let books = store.list_goodreads_books()?;
            if books.is_empty() {
                println!("No Goodreads books");
            }
            for record in books {
                let rating = &record.rating;
                println!(
                    "{} {} {}",
                    record.updated_at.format("%Y-%m-%d"),
                    rating.title.as_deref().unwrap_or_default(),
                    if rating.found {
                        format!(
                            "{} ({} ratings)",
                            rating.display_rating(),
                            rating.num_ratings.unwrap_or_default()
                        )
                    } else {
                        "not found".to_string()
                    }
                );
            }
        }
        Some(source) => {
            let retailer: Retailer = source.parse().map_err(BookrateError::Other)?;
            let books = store.list_books(retailer)?;
            if books.is_empty() {
                println!("No {} books", retailer);
            }
            for record in books {
                let book = &record.book;
                let price = match (book.price, book.currency.as_deref()) {
                    (Some(price), Some(currency)) => format!("{} {}", currency, price),
                    (Some(price), None) => price.to_string(),
                    _ => String::new(),
                };
                println!(
                    "{} {} [{}] {}\n  {}",
                    record.updated_at.format("%Y-%m-%d"),
                    book.display_title(),
                    book.format.as_deref().unwrap_or("-"),
                    price,
                    book.url
                );
            }
        }
    }

    Ok(())
}

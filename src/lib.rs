//! # bookrate
//!
//! Goodreads ratings for books listed on Taiwanese retailers (Kobo, PChome,
//! 博客來 and 讀冊), plus the small server that records what was seen.
//!
//! ## Architecture
//!
//! ```text
//! URL → router → retailer handler → rating service → cache / Goodreads → widget
//!                                         ↓
//!                                   server sync → store
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Annotate a saved Kobo page
//! bookrate scan https://www.kobo.com/tw/zh/ebook/atomic-habits --file page.html -o out.html
//!
//! # Look a title up directly
//! bookrate lookup 原子習慣 --subtitle "Atomic Habits"
//!
//! # Run the book server
//! bookrate serve
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store, the
/// rating cache, the HTTP fetcher and the rating service.
pub mod app;

/// Background rating service and the [`RatingBridge`](background::RatingBridge) used to reach it.
pub mod background;

/// SQLite rating cache with probabilistic eviction.
pub mod cache;

/// Command-line interface using clap.
///
/// - `scan <url>` - Annotate a retailer page with ratings
/// - `lookup <title>` - Look up one title
/// - `serve` - Run the book server
/// - `cache clean|list|clear` - Manage the rating cache
/// - `books [--source S]` - List stored books
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/bookrate/config.toml`.
pub mod config;

/// Page pipeline tying router, handlers and rating service together.
pub mod content;

/// HTML document model with adjacent-HTML insertion.
pub mod dom;

/// Core domain models.
///
/// - [`BookData`](domain::BookData): A listing scraped from a retailer
/// - [`GoodreadsRating`](domain::GoodreadsRating): A Goodreads lookup result
/// - [`Message`](domain::Message): Requests understood by the rating service
pub mod domain;

/// Page fetching over HTTP or headless Chrome.
pub mod fetcher;

/// Goodreads search client.
pub mod goodreads;

/// Rating widget markup.
pub mod render;

/// Per-retailer URL matching, extraction and widget placement.
pub mod retailers;

/// URL → retailer handler dispatch.
pub mod router;

/// Axum server persisting posted book records.
pub mod server;

/// SQLite persistence layer for the server.
///
/// - [`BookStore`](store::BookStore): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Best-effort posting of book records to the server.
pub mod sync;

/// String extraction helpers shared by the retailer handlers.
pub mod text;

pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{BookData, GoodreadsRating, Retailer};

pub use sqlite::SqliteStore;

/// A persisted Goodreads row
#[derive(Debug, Clone, PartialEq)]
pub struct GoodreadsRecord {
    pub id: i64,
    pub rating: GoodreadsRating,
    pub fetched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted retailer listing row
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub id: i64,
    pub book: BookData,
    pub fetched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub trait BookStore {
    // Goodreads operations
    fn upsert_goodreads_book(&self, book: &GoodreadsRating) -> Result<Option<i64>>;
    fn get_goodreads_book(&self, title: &str) -> Result<Option<GoodreadsRecord>>;
    fn list_goodreads_books(&self) -> Result<Vec<GoodreadsRecord>>;

    // Retailer listing operations
    fn upsert_book(&self, retailer: Retailer, book: &BookData) -> Result<Option<i64>>;
    fn get_book(&self, retailer: Retailer, title: &str, format: &str) -> Result<Option<BookRecord>>;
    fn list_books(&self, retailer: Retailer) -> Result<Vec<BookRecord>>;
}

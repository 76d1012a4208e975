use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};
use tracing::{debug, error};

use crate::app::{BookrateError, Result};
use crate::domain::{BookData, GoodreadsRating, Retailer};
use crate::store::{BookRecord, BookStore, GoodreadsRecord};

const GOODREADS_COLUMNS: &str =
    "id, found, title, subtitle, url, rating, num_ratings, fetched_at, updated_at";

const BOOK_COLUMNS: &str = "id, title, subtitle, author, url, format, rating, num_ratings, \
     price, currency, thumbnail_url, isbn, fetched_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations.to_latest(&mut conn).map_err(|e| {
            error!("Store migration failed: {}", e);
            BookrateError::Database(rusqlite::Error::InvalidQuery)
        })?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BookrateError::lock_poisoned(e.to_string()))
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn datetime_at(row: &Row<'_>, idx: usize) -> DateTime<Utc> {
        row.get::<_, String>(idx)
            .ok()
            .and_then(|s| Self::parse_datetime(&s))
            .unwrap_or_else(Utc::now)
    }

    fn goodreads_from_row(row: &Row<'_>) -> rusqlite::Result<GoodreadsRecord> {
        Ok(GoodreadsRecord {
            id: row.get(0)?,
            rating: GoodreadsRating {
                found: row.get(1)?,
                title: row.get(2)?,
                subtitle: row.get(3)?,
                url: row.get(4)?,
                rating: row.get(5)?,
                num_ratings: row.get::<_, Option<i64>>(6)?.map(|n| n.max(0) as u64),
                timestamp: None,
            },
            fetched_at: Self::datetime_at(row, 7),
            updated_at: Self::datetime_at(row, 8),
        })
    }

    fn book_from_row(retailer: Retailer, row: &Row<'_>) -> rusqlite::Result<BookRecord> {
        let format: String = row.get(5)?;
        Ok(BookRecord {
            id: row.get(0)?,
            book: BookData {
                source: Some(retailer),
                title: row.get(1)?,
                subtitle: row.get(2)?,
                author: row.get(3)?,
                url: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                format: (!format.is_empty()).then_some(format),
                rating: row.get(6)?,
                num_ratings: row.get::<_, Option<i64>>(7)?.map(|n| n.max(0) as u64),
                price: row.get(8)?,
                currency: row.get(9)?,
                thumbnail_url: row.get(10)?,
                isbn: row.get(11)?,
            },
            fetched_at: Self::datetime_at(row, 12),
            updated_at: Self::datetime_at(row, 13),
        })
    }
}

impl BookStore for SqliteStore {
    fn upsert_goodreads_book(&self, book: &GoodreadsRating) -> Result<Option<i64>> {
        let title = match book.title.as_deref() {
            Some(title) if !title.is_empty() => title,
            _ => return Ok(None),
        };

        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        // A found row is never overwritten by a later miss
        let id = conn
            .query_row(
                "INSERT INTO goodreads_book (found, title, subtitle, url, rating, num_ratings, fetched_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (title) DO UPDATE SET
                    subtitle = COALESCE(NULLIF(excluded.subtitle, ''), goodreads_book.subtitle),
                    url = COALESCE(NULLIF(excluded.url, ''), goodreads_book.url),
                    rating = COALESCE(excluded.rating, goodreads_book.rating),
                    num_ratings = COALESCE(excluded.num_ratings, goodreads_book.num_ratings),
                    found = excluded.found,
                    updated_at = excluded.updated_at
                 WHERE
                    (excluded.found = 1 AND excluded.title <> '') OR
                    (excluded.found = 1 AND goodreads_book.found = 0) OR
                    (excluded.found = 0 AND goodreads_book.found = 0)
                 RETURNING id",
                params![
                    book.found,
                    title,
                    book.subtitle,
                    book.url,
                    book.rating,
                    book.num_ratings.map(|n| n as i64),
                    now
                ],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        debug!("Upserted goodreads_book {:?} -> {:?}", title, id);
        Ok(id)
    }

    fn get_goodreads_book(&self, title: &str) -> Result<Option<GoodreadsRecord>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM goodreads_book WHERE title = ?1", GOODREADS_COLUMNS),
                params![title],
                Self::goodreads_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn list_goodreads_books(&self) -> Result<Vec<GoodreadsRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM goodreads_book ORDER BY updated_at DESC, title",
            GOODREADS_COLUMNS
        ))?;

        let books = stmt
            .query_map([], Self::goodreads_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(books)
    }

    fn upsert_book(&self, retailer: Retailer, book: &BookData) -> Result<Option<i64>> {
        if book.title.is_empty() {
            return Ok(None);
        }

        let table = retailer.table();
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        let id = conn
            .query_row(
                &format!(
                    "INSERT INTO {table} (title, subtitle, author, url, format, rating, num_ratings,
                        price, currency, thumbnail_url, isbn, fetched_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
                     ON CONFLICT (title, format) DO UPDATE SET
                        subtitle = COALESCE(NULLIF(excluded.subtitle, ''), {table}.subtitle),
                        author = COALESCE(NULLIF(excluded.author, ''), {table}.author),
                        url = COALESCE(NULLIF(excluded.url, ''), {table}.url),
                        format = COALESCE(NULLIF(excluded.format, ''), {table}.format),
                        rating = COALESCE(excluded.rating, {table}.rating),
                        num_ratings = COALESCE(excluded.num_ratings, {table}.num_ratings),
                        price = COALESCE(excluded.price, {table}.price),
                        currency = COALESCE(excluded.currency, {table}.currency),
                        thumbnail_url = COALESCE(excluded.thumbnail_url, {table}.thumbnail_url),
                        isbn = COALESCE(excluded.isbn, {table}.isbn),
                        updated_at = excluded.updated_at
                     RETURNING id"
                ),
                params![
                    book.title,
                    book.subtitle,
                    book.author,
                    book.url,
                    book.format.as_deref().unwrap_or(""),
                    book.rating,
                    book.num_ratings.map(|n| n as i64),
                    book.price,
                    book.currency,
                    book.thumbnail_url,
                    book.isbn,
                    now
                ],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        debug!("Upserted {} {:?} -> {:?}", table, book.title, id);
        Ok(id)
    }

    fn get_book(&self, retailer: Retailer, title: &str, format: &str) -> Result<Option<BookRecord>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE title = ?1 AND format = ?2",
                    BOOK_COLUMNS,
                    retailer.table()
                ),
                params![title, format],
                |row| Self::book_from_row(retailer, row),
            )
            .optional()?;

        Ok(result)
    }

    fn list_books(&self, retailer: Retailer) -> Result<Vec<BookRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY updated_at DESC, title",
            BOOK_COLUMNS,
            retailer.table()
        ))?;

        let books = stmt
            .query_map([], |row| Self::book_from_row(retailer, row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(books)
    }
}

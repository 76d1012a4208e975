//! Local rating cache.
//!
//! A key/value table of Goodreads lookups keyed by storage key (`title` or
//! `title-subtitle`). Entries carry the epoch-millisecond timestamp at which
//! they were stored and are dropped at random by [`RatingCache::clean`] once
//! they are old enough, more eagerly for misses and obscure books.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::app::{BookrateError, Result};
use crate::domain::GoodreadsRating;

const DAY_MS: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// Age assumed for entries stored without a timestamp
const UNKNOWN_AGE_DAYS: f64 = 21.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache database file; defaults to the data directory
    pub path: Option<PathBuf>,

    /// Run one cleaning pass when the rating service starts (default: true)
    pub clean_on_start: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            clean_on_start: true,
        }
    }
}

/// Days since `timestamp` (epoch ms), or [`UNKNOWN_AGE_DAYS`] when absent
pub fn days_elapsed(timestamp: Option<i64>, now_ms: i64) -> f64 {
    match timestamp {
        Some(ts) => (now_ms - ts) as f64 / DAY_MS,
        None => UNKNOWN_AGE_DAYS,
    }
}

/// Decide whether a cached entry goes.
///
/// Tiers are tried in order and each draws its own number from `roll`, so an
/// entry that survives one tier can still be removed by a later one.
pub fn should_evict<R>(entry: &GoodreadsRating, now_ms: i64, roll: &mut R) -> bool
where
    R: FnMut() -> f64,
{
    let days = days_elapsed(entry.timestamp, now_ms);
    let num_ratings = entry.num_ratings;

    (!entry.found && days >= 3.0 && roll() < 0.3)
        || (num_ratings.is_some_and(|n| n <= 100) && days >= 7.0 && roll() < 0.3)
        || (num_ratings.is_some_and(|n| n <= 1000) && days >= 14.0 && roll() < 0.3)
        || (num_ratings.is_some_and(|n| n > 1000) && days >= 14.0 && roll() < 0.1)
}

pub struct RatingCache {
    conn: Mutex<Connection>,
}

impl RatingCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let cache = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    pub fn in_memory() -> Result<Self> {
        let cache = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/cache/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations.to_latest(&mut conn).map_err(|e| {
            error!("Cache migration failed: {}", e);
            BookrateError::Database(rusqlite::Error::InvalidQuery)
        })?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BookrateError::lock_poisoned(e.to_string()))
    }

    pub fn get(&self, key: &str) -> Result<Option<GoodreadsRating>> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM rating_cache WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, rating: &GoodreadsRating) -> Result<()> {
        let json = serde_json::to_string(rating)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO rating_cache (key, value, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, stored_at = excluded.stored_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM rating_cache WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Every entry ordered by key; rows that no longer deserialize are skipped
    pub fn entries(&self) -> Result<Vec<(String, GoodreadsRating)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM rating_cache ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, json) = row?;
            match serde_json::from_str(&json) {
                Ok(rating) => entries.push((key, rating)),
                Err(e) => warn!("Skipping unreadable cache entry {}: {}", key, e),
            }
        }
        Ok(entries)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM rating_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM rating_cache", [])?)
    }

    /// One cleaning pass with an explicit clock and random source; returns the removed keys.
    ///
    /// An entry that fails to delete is logged and left for the next pass.
    pub fn clean_with<R>(&self, now_ms: i64, mut roll: R) -> Result<Vec<String>>
    where
        R: FnMut() -> f64,
    {
        let mut removed = Vec::new();
        for (key, entry) in self.entries()? {
            if should_evict(&entry, now_ms, &mut roll) {
                let days = days_elapsed(entry.timestamp, now_ms);
                match self.remove(&key) {
                    Ok(true) => {
                        info!("remove title:{} daysElapsed:{:.1} from cache", key, days);
                        removed.push(key);
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Failed to remove {} from cache: {}", key, e),
                }
            }
        }
        Ok(removed)
    }

    pub fn clean(&self) -> Result<Vec<String>> {
        let mut rng = rand::thread_rng();
        self.clean_with(Utc::now().timestamp_millis(), || rng.gen::<f64>())
    }
}

//! Configuration management.
//!
//! Configuration is read from `~/.config/bookrate/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::fetcher::BrowserConfig;
use crate::goodreads::GoodreadsConfig;
use crate::server::ServerConfig;
use crate::sync::SyncConfig;

/// Main configuration struct.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    pub goodreads: GoodreadsConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub server: ServerConfig,
    pub browser: BrowserConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            goodreads: GoodreadsConfig::default(),
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
            server: ServerConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// Missing fields in the config file use default values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_config_path()?)
    }

    /// Load configuration from `path`, writing the commented defaults there
    /// first when the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::create_default_config(path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/bookrate/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("bookrate").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# bookrate configuration
#
# Log filter used when RUST_LOG is not set, e.g. "info" or "bookrate=debug"
log_level = "info"

[goodreads]
# Site searched for ratings
base_url = "https://www.goodreads.com"

# Request timeout in seconds
timeout_secs = 10

[cache]
# Rating cache database; defaults to ~/.local/share/bookrate/cache.db
# path = "/path/to/cache.db"

# Drop stale cache entries when the rating service starts
clean_on_start = true

[sync]
# Post observed books and Goodreads results to the book server
enabled = true
server_url = "http://localhost:3000/api/book"

[server]
# Address `bookrate serve` listens on
listen_addr = "127.0.0.1:3000"

# Book database; defaults to ~/.local/share/bookrate/books.db
# database = "/path/to/books.db"

# Allow cross-origin requests
cors_enabled = true

[browser]
# Run Chrome without a window when scanning with --browser
headless = true

# Page load timeout in seconds
timeout_secs = 30

# Wait after load for lazily rendered listings (milliseconds)
wait_after_load_ms = 1500

# user_agent = "Mozilla/5.0 ..."
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.goodreads.base_url, "https://www.goodreads.com");
        assert!(config.cache.clean_on_start);
        assert_eq!(config.sync.server_url, "http://localhost:3000/api/book");
        assert_eq!(config.server.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.browser.wait_after_load_ms, 1500);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
log_level = "debug"

[sync]
enabled = false
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.log_level, "debug");
        assert!(!config.sync.enabled);
        assert_eq!(config.sync.server_url, "http://localhost:3000/api/book");
        assert_eq!(config.goodreads, GoodreadsConfig::default());
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.server.listen_addr, config.server.listen_addr);
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cache\nclean_on_start = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}

//! Server configuration
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, then command-line flags or `ADIKE_*` environment variables.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::db;

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 16;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid bind address {0}")]
    Bind(String),
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Adike Mitra farm management server")]
pub struct Cli {
    /// Optional TOML config file
    #[arg(long, env = "ADIKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "ADIKE_BIND")]
    pub bind: Option<String>,

    /// SQLite database file
    #[arg(long = "db-path", env = "ADIKE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory for uploaded images
    #[arg(long = "upload-dir", env = "ADIKE_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Largest accepted upload, in megabytes
    #[arg(long = "max-upload-mb", env = "ADIKE_MAX_UPLOAD_MB")]
    pub max_upload_mb: Option<u64>,

    /// JSON endpoint returning the current arecanut prices
    #[arg(long = "price-feed-url", env = "ADIKE_PRICE_FEED_URL")]
    pub price_feed_url: Option<String>,
}

/// Keys accepted in the TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    bind: Option<String>,
    db_path: Option<PathBuf>,
    upload_dir: Option<PathBuf>,
    max_upload_mb: Option<u64>,
    price_feed_url: Option<String>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_mb: u64,
    pub price_feed_url: Option<String>,
}

impl Config {
    /// Merge CLI flags over the config file over defaults
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let bind = cli
            .bind
            .or(file.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Bind(bind.clone()))?;

        Ok(Config {
            bind,
            db_path: cli
                .db_path
                .or(file.db_path)
                .unwrap_or_else(db::default_db_path),
            upload_dir: cli
                .upload_dir
                .or(file.upload_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            max_upload_mb: cli
                .max_upload_mb
                .or(file.max_upload_mb)
                .unwrap_or(DEFAULT_MAX_UPLOAD_MB),
            price_feed_url: cli
                .price_feed_url
                .or(file.price_feed_url)
                .filter(|url| !url.trim().is_empty()),
        })
    }

    /// Upload limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::from_cli(Cli::default()).unwrap();
        assert_eq!(config.bind.port(), 5000);
        assert_eq!(config.upload_dir, PathBuf::from(DEFAULT_UPLOAD_DIR));
        assert_eq!(config.max_upload_bytes(), 16 * 1024 * 1024);
        assert!(config.price_feed_url.is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "bind = \"127.0.0.1:8080\"\nmax_upload_mb = 4\nupload_dir = \"/tmp/up\""
        )
        .unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            max_upload_mb: Some(8),
            ..Default::default()
        };
        let config = Config::from_cli(cli).unwrap();

        assert_eq!(config.bind.to_string(), "127.0.0.1:8080");
        assert_eq!(config.max_upload_mb, 8);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/up"));
    }

    #[test]
    fn test_bad_bind_address() {
        let cli = Cli {
            bind: Some("not-an-address".to_string()),
            ..Default::default()
        };
        assert!(matches!(Config::from_cli(cli), Err(ConfigError::Bind(_))));
    }

    #[test]
    fn test_missing_file() {
        let cli = Cli {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..Default::default()
        };
        assert!(matches!(Config::from_cli(cli), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_empty_feed_url_ignored() {
        let cli = Cli {
            price_feed_url: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(Config::from_cli(cli).unwrap().price_feed_url.is_none());
    }
}

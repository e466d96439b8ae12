//! Configuration module for the event log backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

/// Default retention bound for the backup log.
pub const DEFAULT_MAX_BACKUPS: usize = 20;
/// Default cap for a single photo upload (10 MiB).
pub const DEFAULT_MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
/// Default cap for a request body (50 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Where photos live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoBackendConfig {
    /// Files in a local directory
    Local { uploads_dir: PathBuf },
    /// Remote blob service reachable over HTTP
    Http {
        base_url: String,
        token: Option<String>,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory served as the web client (index, manifest, service worker)
    pub static_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Number of backups kept before the oldest are evicted
    pub max_backups: usize,
    pub max_photo_bytes: usize,
    pub max_body_bytes: usize,
    pub photo_backend: PhotoBackendConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("EVENTLOG_DB_PATH")
            .unwrap_or_else(|_| "./data/eventlog.sqlite".to_string())
            .into();

        let static_dir = env::var("EVENTLOG_STATIC_DIR")
            .unwrap_or_else(|_| "./public".to_string())
            .into();

        let bind_addr = env::var("EVENTLOG_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid EVENTLOG_BIND_ADDR: {}", e)))?;

        let log_level = env::var("EVENTLOG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("EVENTLOG_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") | Err(_) => LogFormat::Pretty,
            Ok(other) => {
                return Err(AppError::Config(format!(
                    "Invalid EVENTLOG_LOG_FORMAT: {}",
                    other
                )))
            }
        };

        let max_backups = parse_usize("EVENTLOG_MAX_BACKUPS", DEFAULT_MAX_BACKUPS)?;
        if max_backups == 0 {
            return Err(AppError::Config(
                "EVENTLOG_MAX_BACKUPS must be at least 1".to_string(),
            ));
        }

        let max_photo_bytes = parse_usize("EVENTLOG_MAX_PHOTO_BYTES", DEFAULT_MAX_PHOTO_BYTES)?;
        let max_body_bytes = parse_usize("EVENTLOG_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;

        let photo_backend = match env::var("EVENTLOG_PHOTO_BACKEND").as_deref() {
            Ok("local") | Err(_) => PhotoBackendConfig::Local {
                uploads_dir: env::var("EVENTLOG_UPLOADS_DIR")
                    .unwrap_or_else(|_| "./data/uploads".to_string())
                    .into(),
            },
            Ok("http") => {
                let base_url = env::var("EVENTLOG_BLOB_URL").map_err(|_| {
                    AppError::Config(
                        "EVENTLOG_BLOB_URL is required for the http photo backend".to_string(),
                    )
                })?;
                PhotoBackendConfig::Http {
                    base_url,
                    token: env::var("EVENTLOG_BLOB_TOKEN").ok(),
                }
            }
            Ok(other) => {
                return Err(AppError::Config(format!(
                    "Unknown EVENTLOG_PHOTO_BACKEND: {}",
                    other
                )))
            }
        };

        Ok(Self {
            db_path,
            static_dir,
            bind_addr,
            log_level,
            log_format,
            max_backups,
            max_photo_bytes,
            max_body_bytes,
            photo_backend,
        })
    }
}

fn parse_usize(name: &str, default: usize) -> Result<usize, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

/// Default replay window, in seconds, for signed requests.
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 120;
/// Default minimum password length.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;
/// Shortest accepted request-signing secret, in bytes.
const MIN_SECRET_BYTES: usize = 16;

/// Where users, posts and sessions are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL for users and posts, Redis for sessions.
    Postgres,
    /// Process memory for everything. Single node, nothing survives a restart.
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("Unknown STORAGE_BACKEND '{}' (expected postgres or memory)", other),
        }
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The storage backend.
    pub storage: StorageBackend,
    /// The URL of the PostgreSQL database.
    pub database_url: Option<String>,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The shared secret clients sign requests with.
    pub request_secret: Zeroizing<Vec<u8>>,
    /// How far, in seconds, a request timestamp may drift from the server clock.
    pub replay_window_secs: u64,
    /// The minimum password length.
    pub min_password_length: usize,
    /// Directory served for non-API paths.
    pub static_dir: PathBuf,
    /// Directory holding media attached to posts.
    pub media_dir: PathBuf,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let mut secret_hex = env::var("REQUEST_SECRET")
            .context("REQUEST_SECRET must be set (generate with: openssl rand -hex 32)")?;

        let secret_bytes = hex::decode(&secret_hex)
            .context("REQUEST_SECRET must be valid hexadecimal")?;

        secret_hex.zeroize();

        if secret_bytes.len() < MIN_SECRET_BYTES {
            anyhow::bail!("REQUEST_SECRET must be at least {} bytes", MIN_SECRET_BYTES);
        }

        let storage: StorageBackend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        Ok(Self {
            storage,
            database_url,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            request_secret: Zeroizing::new(secret_bytes),
            replay_window_secs: env::var("REPLAY_WINDOW_SECS")
                .unwrap_or_else(|_| DEFAULT_REPLAY_WINDOW_SECS.to_string())
                .parse()
                .context("Invalid REPLAY_WINDOW_SECS")?,
            min_password_length: env::var("MIN_PASSWORD_LENGTH")
                .unwrap_or_else(|_| DEFAULT_MIN_PASSWORD_LENGTH.to_string())
                .parse()
                .context("Invalid MIN_PASSWORD_LENGTH")?,
            static_dir: env::var("STATIC_DIR")
                .unwrap_or_else(|_| "static".to_string())
                .into(),
            media_dir: env::var("MEDIA_DIR")
                .unwrap_or_else(|_| "media".to_string())
                .into(),
        })
    }

    /// An in-memory configuration signing with `secret`.
    pub fn in_memory(secret: &[u8]) -> Self {
        Self {
            storage: StorageBackend::Memory,
            database_url: None,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            request_secret: Zeroizing::new(secret.to_vec()),
            replay_window_secs: DEFAULT_REPLAY_WINDOW_SECS,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            static_dir: "static".into(),
            media_dir: "media".into(),
        }
    }
}

use anyhow::{Context, Result};
use tracing::warn;

const DEFAULT_SECRET: &str = "dev-secret-change-me";

/// Server configuration, read from the environment (and `.env` if present).
pub struct Config {
    pub db_path: String,
    pub host: String,
    pub port: u16,
    pub session_secret: String,
    pub cookie_secure: bool,
    /// Base URL of the external assistant responder; unset disables replies.
    pub responder_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let session_secret =
            std::env::var("PARLEY_SESSION_SECRET").unwrap_or_else(|_| DEFAULT_SECRET.into());
        if session_secret == DEFAULT_SECRET {
            warn!("PARLEY_SESSION_SECRET not set, using the development default");
        }

        Ok(Self {
            db_path: std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into()),
            host: std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PARLEY_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .context("PARLEY_PORT must be a port number")?,
            session_secret,
            cookie_secure: std::env::var("PARLEY_COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            responder_url: std::env::var("PARLEY_RESPONDER_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
        })
    }
}

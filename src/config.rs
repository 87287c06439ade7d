//! Runtime settings gathered from the environment (and an optional `.env` file).

use crate::error::{AppError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Environment variable naming the current user.
pub const USER_ENV: &str = "HEADLINER_USER";
pub const HOME_ENV: &str = "HEADLINER_HOME";
pub const FEED_URL_ENV: &str = "HEADLINER_FEED_URL";
pub const SESSION_COOKIE_ENV: &str = "HEADLINER_SESSION_COOKIE";
pub const BROWSER_URL_ENV: &str = "HEADLINER_BROWSER_URL";

pub const DEFAULT_FEED_URL: &str = "https://www.ft.com";
pub const DEFAULT_BROWSER_URL: &str = "http://127.0.0.1:9377";
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Per-call timeout for RSS fetches.
pub const FEED_TIMEOUT: Duration = Duration::from_secs(15);
/// Per-call timeout for browser bridge calls (page loads are slow).
pub const BROWSER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Settings {
    /// Username from the environment, if any. Blank values are treated as unset.
    pub user: Option<String>,
    pub config_dir: PathBuf,
    pub feed_base_url: String,
    pub session_cookie: Option<String>,
    pub browser_url: String,
}

impl Settings {
    /// Reads settings from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let config_dir = match non_blank(HOME_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .map(|dir| dir.join("headliner"))
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "Could not determine a configuration directory. Set {} to a writable path.",
                        HOME_ENV
                    ))
                })?,
        };

        let settings = Self {
            user: non_blank(USER_ENV),
            config_dir,
            feed_base_url: non_blank(FEED_URL_ENV)
                .unwrap_or_else(|| DEFAULT_FEED_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            session_cookie: non_blank(SESSION_COOKIE_ENV),
            browser_url: non_blank(BROWSER_URL_ENV)
                .unwrap_or_else(|| DEFAULT_BROWSER_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        debug!("Loaded settings: {:?}", settings.redacted());
        Ok(settings)
    }

    /// Location of the credential document.
    pub fn credentials_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIALS_FILE)
    }

    fn redacted(&self) -> Self {
        Self {
            session_cookie: self.session_cookie.as_ref().map(|_| "<set>".to_string()),
            ..self.clone()
        }
    }
}

fn non_blank(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

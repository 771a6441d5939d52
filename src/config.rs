//! Client configuration with an optional runtime override file. The runtime
//! document uses the same shape the web frontend reads from `config.json`
//! (`{"apiUrl": "..."}`) so one deployment artifact can serve both clients.
//! Configuration values are public; do not store secrets here.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_INACTIVITY_LIMIT_SECONDS: u64 = 8 * 60;
const DEFAULT_SESSION_LIMIT_SECONDS: u64 = 10 * 60;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Delay between two auth-status polls.
    pub poll_interval: Duration,
    /// Ceiling after which an unanswered mobile approval is abandoned.
    pub poll_timeout: Duration,
    /// Seconds without navigation before the expiry warning is shown.
    pub inactivity_limit_seconds: u64,
    /// Seconds after token issue when the session is refreshed or ended.
    pub session_limit_seconds: u64,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            inactivity_limit_seconds: DEFAULT_INACTIVITY_LIMIT_SECONDS,
            session_limit_seconds: DEFAULT_SESSION_LIMIT_SECONDS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Loads defaults and applies the runtime document at `path`, if any.
    ///
    /// A missing or unreadable document is not fatal: the defaults are kept
    /// and a warning is logged.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = Self::default();

        if let Some(path) = path {
            match read_runtime_config(path) {
                Ok(runtime) => {
                    debug!("runtime configuration loaded from {}", path.display());
                    apply_runtime_overrides(&mut config, runtime);
                }
                Err(err) => {
                    warn!("Failed to load runtime configuration, using defaults: {err}");
                }
            }
        }

        config
    }

    /// Checks that the API base is an absolute http(s) URL.
    ///
    /// # Errors
    /// Returns `Error::Config` if the base URL cannot be parsed or uses another scheme.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(self.api_base_url.trim())
            .map_err(|err| Error::Config(format!("invalid API base URL: {err}")))?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(Error::Config(format!(
                "unsupported scheme {scheme} in API base URL"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RuntimeConfig {
    #[serde(rename = "apiUrl", default)]
    api_url: Option<String>,
}

fn read_runtime_config(path: &Path) -> Result<RuntimeConfig> {
    let raw = fs::read_to_string(path)
        .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&raw).map_err(|err| Error::Config(format!("{}: {err}", path.display())))
}

fn apply_runtime_overrides(config: &mut ClientConfig, runtime: RuntimeConfig) {
    if let Some(value) = runtime.api_url.as_deref().and_then(normalize_runtime_value) {
        config.api_base_url = value;
    }
}

fn normalize_runtime_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

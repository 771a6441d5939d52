use crate::{
    cli::commands::{ARG_API_URL, ARG_CONFIG, ARG_STATE_FILE, DEFAULT_STATE_FILE},
    config::ClientConfig,
    storage::FileStore,
    Session,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};

/// Arguments shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: Option<String>,
    pub state_file: PathBuf,
    pub config_file: Option<PathBuf>,
}

impl GlobalArgs {
    #[must_use]
    pub fn from_matches(matches: &clap::ArgMatches) -> Self {
        Self {
            api_url: matches.get_one::<String>(ARG_API_URL).cloned(),
            state_file: matches
                .get_one::<String>(ARG_STATE_FILE)
                .map_or_else(|| PathBuf::from(DEFAULT_STATE_FILE), PathBuf::from),
            config_file: matches.get_one::<String>(ARG_CONFIG).map(PathBuf::from),
        }
    }

    /// Runtime document first, then `--api-url` on top.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::load(self.config_file.as_deref());
        match &self.api_url {
            Some(url) if !url.trim().is_empty() => config.with_api_base_url(url.trim()),
            _ => config,
        }
    }

    /// # Errors
    /// Returns an error if the state file is corrupt or the configuration is invalid.
    pub fn session(&self) -> Result<Session> {
        let store = FileStore::open(&self.state_file).with_context(|| {
            format!("Failed to open state file {}", self.state_file.display())
        })?;
        Session::new(self.client_config(), Arc::new(store)).context("Invalid client configuration")
    }
}

//! Shared CLI context, error types, and argument parsers.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::Url;
use sluice_sync::SyncConfig;

use crate::cli::Cli;
use crate::engine::{Credentials, QbitClient};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Everything a command handler needs, built once from the parsed flags.
pub(crate) struct AppContext {
    pub(crate) engine: Arc<QbitClient>,
    pub(crate) state_file: PathBuf,
    pub(crate) sync: SyncConfig,
}

impl AppContext {
    pub(crate) fn from_cli(cli: &Cli) -> CliResult<Self> {
        let credentials = match (&cli.username, &cli.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(CliError::validation(
                    "username and password must be provided together",
                ));
            }
        };

        let engine = QbitClient::new(
            cli.url.clone(),
            credentials,
            Duration::from_secs(cli.timeout),
        )
        .map_err(|err| {
            CliError::failure(anyhow::Error::new(err).context("failed to build HTTP client"))
        })?;

        let sync = match &cli.config {
            Some(path) => load_sync_config(path)?,
            None => SyncConfig::default(),
        };

        Ok(Self {
            engine: Arc::new(engine),
            state_file: cli.state_file.clone(),
            sync,
        })
    }
}

/// Read and validate a poll loop configuration document.
pub(crate) fn load_sync_config(path: &Path) -> CliResult<SyncConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))
        .map_err(CliError::failure)?;
    SyncConfig::from_json_str(&raw)
        .map_err(|err| CliError::validation(format!("invalid config '{}': {err:#}", path.display())))
}

/// Parse the WebUI base URL, normalising it to end with `/`.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    let mut url = input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported URL scheme '{}'", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

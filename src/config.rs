use std::{env, path::PathBuf};

use thiserror::Error;

pub const NOTIFICATION_QUERY: &str = "in:inbox from:notifications@github.com";

const DEFAULT_OWNER: &str = "gro-intelligence";
const DEFAULT_SUBJECT_REPO: &str = "gro";
const DEFAULT_GMAIL_USER: &str = "me";
const DEFAULT_TOKEN_FILE: &str = "token.json";
const DEFAULT_CLIENT_SECRETS_FILE: &str = "credentials.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GitHubBackend {
    Cli,
    Api,
}

/// Settings for one pruning run, resolved once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub github_username: String,
    pub github_token: String,
    pub github_backend: GitHubBackend,
    /// Organization that owns every repository referenced by notifications.
    pub owner: String,
    /// Literal tag GitHub puts in notification subjects, e.g. `[acme/widgets]`.
    pub subject_marker: String,
    pub query: String,
    pub gmail_user: String,
    pub token_path: PathBuf,
    pub client_secrets_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_owned())
                .filter(|raw| !raw.is_empty())
        };
        let required = |key: &'static str| value(key).ok_or(ConfigError::Missing(key));

        let github_username = required("GITHUB_USERNAME")?;
        let github_token = required("GITHUB_ACCESS_TOKEN")?;

        let github_backend = match value("PRUNE_GITHUB_BACKEND").as_deref() {
            None | Some("cli") => GitHubBackend::Cli,
            Some("api") => GitHubBackend::Api,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "PRUNE_GITHUB_BACKEND",
                    value: other.to_owned(),
                });
            }
        };

        let owner = value("PRUNE_GITHUB_OWNER").unwrap_or_else(|| DEFAULT_OWNER.to_owned());
        let subject_repo =
            value("PRUNE_SUBJECT_REPO").unwrap_or_else(|| DEFAULT_SUBJECT_REPO.to_owned());

        Ok(Self {
            github_username,
            github_token,
            github_backend,
            subject_marker: format!("[{owner}/{subject_repo}]"),
            owner,
            query: NOTIFICATION_QUERY.to_owned(),
            gmail_user: value("PRUNE_GMAIL_USER").unwrap_or_else(|| DEFAULT_GMAIL_USER.to_owned()),
            token_path: value("PRUNE_GOOGLE_TOKEN")
                .unwrap_or_else(|| DEFAULT_TOKEN_FILE.to_owned())
                .into(),
            client_secrets_path: value("PRUNE_GOOGLE_CLIENT_SECRETS")
                .unwrap_or_else(|| DEFAULT_CLIENT_SECRETS_FILE.to_owned())
                .into(),
        })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has unsupported value `{value}`")]
    Invalid { key: &'static str, value: String },
}

use std::io;

use thiserror::Error;

use crate::{
    config::ConfigError, extract::ExtractError, github::GitHubError, gmail::GmailError,
    google_auth::AuthError, reference::ReferenceError,
};

/// Anything that stops a pruning run.
#[derive(Error, Debug)]
pub enum PruneError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("could not obtain Gmail credentials: {0}")]
    Credentials(#[from] AuthError),
    #[error("mail transport failed: {0}")]
    Mail(#[from] GmailError),
    #[error("assignee lookup failed: {0}")]
    GitHub(#[from] GitHubError),
    #[error("malformed notification: {0}")]
    Malformed(#[from] ExtractError),
    #[error("unparseable pull request reference: {0}")]
    UnparseableReference(#[from] ReferenceError),
    #[error("confirmation prompt failed: {0}")]
    Prompt(#[from] io::Error),
}

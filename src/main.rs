mod config;
mod domain;
mod error;
mod extract;
mod github;
mod gmail;
mod google_auth;
mod prompt;
mod prune;
mod reference;

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    domain::PruneSummary,
    error::PruneError,
    gmail::GmailClient,
    google_auth::{CredentialProvider, TokenFileCredentials},
    prune::Pruner,
};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(summary) => {
            info!(
                examined = summary.examined,
                deleted = summary.deleted,
                kept = summary.kept,
                skipped = summary.skipped,
                unparseable = summary.unparseable,
                "Pruning finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<PruneSummary, PruneError> {
    let config = Config::from_env()?;
    let oracle = github::oracle_for(&config)?;

    let mut credentials = TokenFileCredentials::new(&config)?;
    let access_token = credentials.get_credentials()?;
    let gmail = GmailClient::new(&config, access_token)?;

    Pruner::new(&config, &gmail, oracle.as_ref()).run(prompt::confirm_on_console)
}

use std::process::{Command, Stdio};

use reqwest::{
    blocking::Client,
    header::{ACCEPT, USER_AGENT},
};
use serde::Deserialize;
use thiserror::Error;

use crate::config::{Config, GitHubBackend};

const GH_API_REPOS: &str = "https://api.github.com/repos";
const USER_AGENT_HEADER: &str = "gh-inbox-prune/0.1";

/// Answers whether the configured user is still assigned to a pull request.
pub trait AssigneeOracle {
    fn is_assignee(&self, repo: &str, number: u64) -> Result<bool, GitHubError>;

    /// Stop GitHub from sending further notifications about a pull request.
    ///
    /// Muting a notification thread needs admin rights on the organization's
    /// repositories, which the tool does not have.
    fn unsubscribe(&self, repo: &str, number: u64) -> Result<(), GitHubError> {
        let _ = (repo, number);
        Err(GitHubError::NotImplemented("unsubscribe from pull request"))
    }
}

pub fn oracle_for(config: &Config) -> Result<Box<dyn AssigneeOracle>, GitHubError> {
    match config.github_backend {
        GitHubBackend::Cli => Ok(Box::new(GhCliOracle::new(config))),
        GitHubBackend::Api => Ok(Box::new(RestOracle::new(config)?)),
    }
}

// gh CLI backend -------------------------------------------------------------

pub struct GhCliOracle {
    owner: String,
    login: String,
    token: String,
}

impl GhCliOracle {
    pub fn new(config: &Config) -> Self {
        Self {
            owner: config.owner.clone(),
            login: config.github_username.clone(),
            token: config.github_token.clone(),
        }
    }
}

impl AssigneeOracle for GhCliOracle {
    fn is_assignee(&self, repo: &str, number: u64) -> Result<bool, GitHubError> {
        let full_name = format!("{}/{repo}", self.owner);
        let number_arg = number.to_string();
        let output = Command::new("gh")
            .args(["pr", "view", number_arg.as_str(), "--json", "assignees", "-R"])
            .arg(&full_name)
            .env("GH_TOKEN", &self.token)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(GitHubError::Spawn)?;

        if !output.status.success() {
            return Err(GitHubError::Command {
                pull_request: format!("{full_name}#{number}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let view: AssigneesResponse = serde_json::from_slice(&output.stdout)?;
        Ok(view.includes(&self.login))
    }
}

// REST backend ---------------------------------------------------------------

pub struct RestOracle {
    client: Client,
    owner: String,
    login: String,
    token: String,
}

impl RestOracle {
    pub fn new(config: &Config) -> Result<Self, GitHubError> {
        Ok(Self {
            client: build_client()?,
            owner: config.owner.clone(),
            login: config.github_username.clone(),
            token: config.github_token.clone(),
        })
    }
}

impl AssigneeOracle for RestOracle {
    fn is_assignee(&self, repo: &str, number: u64) -> Result<bool, GitHubError> {
        let url = format!("{GH_API_REPOS}/{}/{repo}/pulls/{number}", self.owner);
        let response: AssigneesResponse = self
            .client
            .get(url)
            .header(USER_AGENT, USER_AGENT_HEADER)
            .header(ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.token)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(response.includes(&self.login))
    }
}

pub fn build_client() -> Result<Client, GitHubError> {
    Client::builder()
        .user_agent(USER_AGENT_HEADER)
        .build()
        .map_err(GitHubError::Http)
}

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to run the gh CLI: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("gh pr view {pull_request} failed: {stderr}")]
    Command {
        pull_request: String,
        stderr: String,
    },
    #[error("unexpected assignee payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

// Response payloads ---------------------------------------------------------

// Shared by `gh pr view --json assignees` and the pulls endpoint.
#[derive(Debug, Deserialize)]
struct AssigneesResponse {
    #[serde(default)]
    assignees: Vec<GitHubUser>,
}

impl AssigneesResponse {
    fn includes(&self, login: &str) -> bool {
        self.assignees
            .iter()
            .any(|user| user.login.eq_ignore_ascii_case(login))
    }
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

//! Gmail OAuth credentials for an installed (desktop) application.
//!
//! The token file keeps the layout written by Python's google-auth
//! `Credentials.to_json()`, so an existing `token.json` keeps working.

use std::{
    fs, io,
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;

/// Full mailbox scope; permanent thread deletion is not allowed with narrower ones.
pub const GMAIL_SCOPE: &str = "https://mail.google.com/";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_SKEW_SECS: i64 = 60;

/// Supplies a bearer token for the mail transport.
pub trait CredentialProvider {
    fn get_credentials(&mut self) -> Result<String, AuthError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl StoredToken {
    /// Missing or unreadable expiry counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let Some(raw) = self.expiry.as_deref() else {
            return true;
        };
        match DateTime::parse_from_rfc3339(raw) {
            Ok(expiry) => expiry <= now + Duration::seconds(EXPIRY_SKEW_SECS),
            Err(_) => true,
        }
    }
}

/// Contents of the `credentials.json` downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub installed: InstalledApp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstalledApp {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

pub struct TokenFileCredentials {
    client: Client,
    token_path: PathBuf,
    client_secrets_path: PathBuf,
}

impl TokenFileCredentials {
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        Ok(Self {
            client: Client::builder().build()?,
            token_path: config.token_path.clone(),
            client_secrets_path: config.client_secrets_path.clone(),
        })
    }

    fn refresh(&self, token: &StoredToken, refresh_token: &str) -> Result<StoredToken, AuthError> {
        info!("Refreshing credentials.");
        let mut form = vec![
            ("client_id", token.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        if let Some(secret) = token.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self.client.post(&token.token_uri).form(&form).send()?;
        let granted = read_token_response(response)?;

        let mut refreshed = token.clone();
        refreshed.token = granted.access_token;
        refreshed.expiry = Some(expiry_from(granted.expires_in));
        if let Some(rotated) = granted.refresh_token {
            refreshed.refresh_token = Some(rotated);
        }
        Ok(refreshed)
    }

    fn run_consent_flow(&self) -> Result<StoredToken, AuthError> {
        let secrets = load_client_secrets(&self.client_secrets_path)?;
        let app = secrets.installed;

        let listener = TcpListener::bind("127.0.0.1:0")?;
        let redirect_uri = format!("http://localhost:{}/", listener.local_addr()?.port());

        let mut auth_url = Url::parse(&app.auth_uri)?;
        auth_url
            .query_pairs_mut()
            .append_pair("client_id", &app.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", GMAIL_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        info!("Please visit this URL to authorize this application: {auth_url}");
        if let Err(err) = open::that(auth_url.as_str()) {
            warn!("Failed to open browser: {err}");
        }

        let (mut stream, _) = listener.accept()?;
        let code = match read_redirect(&mut stream) {
            Ok(code) => {
                respond(
                    &mut stream,
                    "The authentication flow has completed. You may close this window.",
                );
                code
            }
            Err(err) => {
                respond(&mut stream, "Authorization failed. You may close this window.");
                return Err(err);
            }
        };

        let mut form = vec![
            ("code", code.as_str()),
            ("client_id", app.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        if let Some(secret) = app.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        let response = self.client.post(&app.token_uri).form(&form).send()?;
        let granted = read_token_response(response)?;

        Ok(StoredToken {
            token: granted.access_token,
            refresh_token: granted.refresh_token,
            token_uri: app.token_uri,
            client_id: app.client_id,
            client_secret: app.client_secret,
            scopes: vec![GMAIL_SCOPE.to_owned()],
            expiry: Some(expiry_from(granted.expires_in)),
        })
    }
}

impl CredentialProvider for TokenFileCredentials {
    fn get_credentials(&mut self) -> Result<String, AuthError> {
        let stored = read_token(&self.token_path)?;

        let token = match stored {
            Some(token) if !token.is_expired(Utc::now()) => token,
            Some(token) => {
                let renewed = match token.refresh_token.as_deref() {
                    Some(refresh_token) => self.refresh(&token, refresh_token)?,
                    None => self.run_consent_flow()?,
                };
                write_token(&self.token_path, &renewed)?;
                renewed
            }
            None => {
                let granted = self.run_consent_flow()?;
                write_token(&self.token_path, &granted)?;
                granted
            }
        };

        info!("Got credentials.");
        Ok(token.token)
    }
}

pub fn read_token(path: &Path) -> Result<Option<StoredToken>, AuthError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub fn write_token(path: &Path, token: &StoredToken) -> Result<(), AuthError> {
    let data = serde_json::to_string_pretty(token)?;
    fs::write(path, data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn load_client_secrets(path: &Path) -> Result<ClientSecrets, AuthError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AuthError::ClientSecretsNotFound(path.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };
    serde_json::from_str(&contents)
        .map_err(|err| AuthError::InvalidClientSecrets(format!("{}: {err}", path.display())))
}

fn read_token_response(response: reqwest::blocking::Response) -> Result<TokenResponse, AuthError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(AuthError::TokenEndpoint {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

fn expiry_from(expires_in: Option<i64>) -> String {
    (Utc::now() + Duration::seconds(expires_in.unwrap_or(3600))).to_rfc3339()
}

fn read_redirect(stream: &mut TcpStream) -> Result<String, AuthError> {
    let mut buffer = [0u8; 4096];
    let n = stream.read(&mut buffer)?;
    let request = String::from_utf8_lossy(&buffer[..n]);
    auth_code_from_request_line(request.lines().next().unwrap_or_default())
}

/// Pulls `code` out of `GET /?code=...&scope=... HTTP/1.1`.
pub fn auth_code_from_request_line(line: &str) -> Result<String, AuthError> {
    let target = line
        .split_whitespace()
        .nth(1)
        .ok_or(AuthError::FlowCancelled(None))?;
    let url = Url::parse("http://localhost")?.join(target)?;

    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (code, error) {
        (Some(code), None) => Ok(code),
        (_, error) => Err(AuthError::FlowCancelled(error)),
    }
}

fn respond(stream: &mut impl Write, message: &str) {
    let body = format!("<html><body><p>{message}</p></body></html>");
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    // The browser may already have gone away.
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OAuth request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error while handling credentials: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse stored credentials: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("OAuth client secrets not found at {0}")]
    ClientSecretsNotFound(PathBuf),
    #[error("invalid OAuth client secrets: {0}")]
    InvalidClientSecrets(String),
    #[error("invalid OAuth URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("authorization was not granted: {}", .0.as_deref().unwrap_or("no code in redirect"))]
    FlowCancelled(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expiry: Option<String>) -> StoredToken {
        StoredToken {
            token: "ya29.test".into(),
            refresh_token: Some("1//refresh".into()),
            token_uri: default_token_uri(),
            client_id: "client.apps.googleusercontent.com".into(),
            client_secret: Some("secret".into()),
            scopes: vec![GMAIL_SCOPE.into()],
            expiry,
        }
    }

    #[test]
    fn python_token_json_is_accepted() {
        let json = r#"{
            "token": "ya29.python",
            "refresh_token": "1//python-refresh",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "client.apps.googleusercontent.com",
            "client_secret": "secret",
            "scopes": ["https://mail.google.com/"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2026-02-08T12:00:00.000000Z"
        }"#;
        let token: StoredToken = serde_json::from_str(json).expect("token");
        assert_eq!(token.token, "ya29.python");
        assert_eq!(token.refresh_token.as_deref(), Some("1//python-refresh"));
        assert_eq!(token.scopes, vec![GMAIL_SCOPE]);
    }

    #[test]
    fn access_token_alias_and_default_token_uri() {
        let json = r#"{"access_token": "ya29.alias", "client_id": "c"}"#;
        let token: StoredToken = serde_json::from_str(json).expect("token");
        assert_eq!(token.token, "ya29.alias");
        assert_eq!(token.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn expiry_rules() {
        let now = Utc::now();
        assert!(token(None).is_expired(now));
        assert!(token(Some("not a date".into())).is_expired(now));
        assert!(token(Some((now - Duration::hours(1)).to_rfc3339())).is_expired(now));
        assert!(token(Some((now + Duration::seconds(30)).to_rfc3339())).is_expired(now));
        assert!(!token(Some((now + Duration::hours(1)).to_rfc3339())).is_expired(now));
    }

    #[test]
    fn token_file_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        assert!(read_token(&path).expect("read").is_none());

        write_token(&path, &token(Some("2030-01-01T00:00:00+00:00".into()))).expect("write");
        let loaded = read_token(&path).expect("read").expect("token");
        assert_eq!(loaded.token, "ya29.test");
        assert_eq!(loaded.expiry.as_deref(), Some("2030-01-01T00:00:00+00:00"));
    }

    #[test]
    fn valid_stored_token_is_used_without_network() {
        let dir = tempfile::tempdir().expect("tempdir");
        let token_path = dir.path().join("token.json");
        let future = (Utc::now() + Duration::hours(1)).to_rfc3339();
        // Compact JSON, unlike the pretty form `write_token` produces.
        let stored = serde_json::to_string(&token(Some(future))).expect("json");
        fs::write(&token_path, &stored).expect("write");

        let mut provider = TokenFileCredentials {
            client: Client::builder().build().expect("client"),
            token_path: token_path.clone(),
            client_secrets_path: dir.path().join("credentials.json"),
        };
        assert_eq!(provider.get_credentials().expect("credentials"), "ya29.test");
        assert_eq!(
            fs::read_to_string(&token_path).expect("read back"),
            stored,
            "a still-valid token file is left as it was"
        );
    }

    #[test]
    fn missing_client_secrets_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("credentials.json");
        assert!(matches!(
            load_client_secrets(&path),
            Err(AuthError::ClientSecretsNotFound(_))
        ));
    }

    #[test]
    fn client_secrets_parse() {
        let json = r#"{
            "installed": {
                "client_id": "12345.apps.googleusercontent.com",
                "project_id": "pruner",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "shh",
                "redirect_uris": ["http://localhost"]
            }
        }"#;
        let secrets: ClientSecrets = serde_json::from_str(json).expect("secrets");
        assert_eq!(secrets.installed.client_secret.as_deref(), Some("shh"));
    }

    #[test]
    fn auth_code_is_decoded_from_redirect() {
        let code = auth_code_from_request_line(
            "GET /?state=x&code=4%2F0Adeu5BW&scope=https%3A%2F%2Fmail.google.com%2F HTTP/1.1",
        )
        .expect("code");
        assert_eq!(code, "4/0Adeu5BW");
    }

    #[test]
    fn denied_consent_is_cancelled() {
        let result = auth_code_from_request_line("GET /?error=access_denied HTTP/1.1");
        assert!(matches!(
            result,
            Err(AuthError::FlowCancelled(Some(ref reason))) if reason == "access_denied"
        ));
        assert!(matches!(
            auth_code_from_request_line(""),
            Err(AuthError::FlowCancelled(None))
        ));
    }
}

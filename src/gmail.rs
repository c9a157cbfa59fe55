//! Gmail API v1 thread listing, fetch and delete.

use reqwest::{
    StatusCode,
    blocking::{Client, RequestBuilder, Response},
    header::USER_AGENT,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::Config,
    domain::{Header, Message, MimePart, NotificationThread},
};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users";
const USER_AGENT_HEADER: &str = "gh-inbox-prune/0.1";

/// One page of a thread search.
#[derive(Debug, Default)]
pub struct ThreadPage {
    pub thread_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

pub trait MailTransport {
    fn list_thread_page(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<ThreadPage, GmailError>;

    fn get_full_thread(&self, thread_id: &str) -> Result<NotificationThread, GmailError>;

    fn delete_thread(&self, thread_id: &str) -> Result<(), GmailError>;

    /// Follows continuation tokens until the listing is exhausted.
    fn list_threads(&self, query: &str) -> Result<Vec<String>, GmailError> {
        let mut thread_ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_thread_page(query, page_token.as_deref())?;
            thread_ids.extend(page.thread_ids);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(thread_ids)
    }
}

pub struct GmailClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(config: &Config, access_token: String) -> Result<Self, GmailError> {
        if access_token.is_empty() {
            return Err(GmailError::MissingToken);
        }
        let client = Client::builder()
            .user_agent(USER_AGENT_HEADER)
            .build()
            .map_err(GmailError::Http)?;
        Ok(Self {
            client,
            access_token,
            base_url: format!("{GMAIL_API_BASE}/{}", config.gmail_user),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(USER_AGENT, USER_AGENT_HEADER)
            .bearer_auth(&self.access_token)
    }
}

impl MailTransport for GmailClient {
    fn list_thread_page(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<ThreadPage, GmailError> {
        let mut params = vec![("q", query)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let response = self
            .authorized(self.client.get(format!("{}/threads", self.base_url)))
            .query(&params)
            .send()?;
        let list: ThreadListResponse = check(response)?.json()?;

        debug!(
            count = list.threads.len(),
            more = list.next_page_token.is_some(),
            "listed thread page"
        );
        Ok(ThreadPage {
            thread_ids: list.threads.into_iter().map(|stub| stub.id).collect(),
            next_page_token: list.next_page_token.filter(|token| !token.is_empty()),
        })
    }

    fn get_full_thread(&self, thread_id: &str) -> Result<NotificationThread, GmailError> {
        let response = self
            .authorized(self.client.get(format!("{}/threads/{thread_id}", self.base_url)))
            .query(&[("format", "full")])
            .send()?;
        let detail: ThreadResponse = check(response)?.json()?;
        Ok(detail.into_thread(thread_id))
    }

    fn delete_thread(&self, thread_id: &str) -> Result<(), GmailError> {
        let response = self
            .authorized(self.client.delete(format!("{}/threads/{thread_id}", self.base_url)))
            .send()?;
        check(response)?;
        info!(thread_id, "deleted thread");
        Ok(())
    }
}

fn check(response: Response) -> Result<Response, GmailError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(GmailError::AuthExpired);
    }
    if !status.is_success() {
        let message = response.text().unwrap_or_default();
        return Err(GmailError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

#[derive(Error, Debug)]
pub enum GmailError {
    #[error("Gmail API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gmail access token is missing")]
    MissingToken,
    #[error("Gmail rejected the access token (expired or revoked)")]
    AuthExpired,
    #[error("Gmail API error {status}: {message}")]
    Api { status: u16, message: String },
}

// Response payloads ---------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadListResponse {
    #[serde(default)]
    threads: Vec<ThreadStub>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadStub {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    messages: Vec<MessageResponse>,
}

impl ThreadResponse {
    fn into_thread(self, requested_id: &str) -> NotificationThread {
        NotificationThread {
            id: self.id.unwrap_or_else(|| requested_id.to_owned()),
            messages: self
                .messages
                .into_iter()
                .map(MessageResponse::into_message)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<PayloadResponse>,
}

impl MessageResponse {
    fn into_message(self) -> Message {
        let payload = self.payload.unwrap_or_default();
        Message {
            id: self.id,
            snippet: self.snippet,
            headers: payload
                .headers
                .into_iter()
                .map(|header| Header {
                    name: header.name,
                    value: header.value,
                })
                .collect(),
            parts: payload
                .parts
                .into_iter()
                .map(|part| MimePart {
                    mime_type: part.mime_type,
                    body_data: part.body.and_then(|body| body.data),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PayloadResponse {
    #[serde(default)]
    headers: Vec<HeaderResponse>,
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct HeaderResponse {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartResponse {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    body: Option<BodyResponse>,
}

#[derive(Debug, Deserialize)]
struct BodyResponse {
    #[serde(default)]
    data: Option<String>,
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

//! Thin, typed wrapper around the HTTP transport to the journal.
//!
//! Provides [`JournalClient`], a cheap-to-clone handle that owns the base
//! URL, optional credentials, and the underlying connection pool. Higher
//! modules ([`crate::navigator`], [`crate::publisher`],
//! [`crate::subscription`]) build their protocol semantics on the raw verbs
//! exposed here and never touch `reqwest` directly.

use std::fmt;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;

use crate::error::Error;
use crate::feed::{self, Page};

/// Media type for stream feed reads.
pub(crate) const ATOM_JSON: &str = "application/vnd.eventstore.atom+json";
/// Media type for competing-consumer batch reads.
pub(crate) const COMPETING_ATOM_JSON: &str = "application/vnd.eventstore.competingatom+json";
/// Media type for event write bodies.
pub(crate) const EVENTS_JSON: &str = "application/vnd.eventstore.events+json";

/// HTTP basic-auth credentials for the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub user: String,
    /// Password.
    pub pass: String,
}

/// Typed HTTP client for the journal.
///
/// Clone is cheap: `reqwest::Client` wraps an `Arc`'d connection pool, and
/// the pool is safe for concurrent use by independent navigators and
/// subscriptions traversing different streams simultaneously.
///
/// No request carries a client-imposed timeout; a caller that needs a
/// deadline builds its own `reqwest::Client` and passes it via
/// [`with_http`](JournalClient::with_http), or wraps individual calls.
#[derive(Clone)]
pub struct JournalClient {
    http: reqwest::Client,
    host: String,
    credentials: Option<Credentials>,
}

impl fmt::Debug for JournalClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JournalClient")
            .field("host", &self.host)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

impl JournalClient {
    /// Create a client for the journal at `host`.
    ///
    /// The host URL is normalized to always end in `/` before path
    /// concatenation, so `"http://journal:2113"` and `"http://journal:2113/"`
    /// are equivalent.
    ///
    /// # Arguments
    ///
    /// * `host` - Full base URL with protocol included.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: normalize_host(host.into()),
            credentials: None,
        }
    }

    /// Create a client from the `JOURNAL_URL` environment variable.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`std::env::VarError`] if `JOURNAL_URL` is
    /// unset or not valid Unicode.
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let host = std::env::var("JOURNAL_URL")?;
        Ok(Self::new(host))
    }

    /// Attach basic-auth credentials, applied to every outgoing request.
    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            pass: pass.into(),
        });
        self
    }

    /// Replace the underlying `reqwest::Client`.
    ///
    /// Use this to impose a timeout policy or proxy configuration; the
    /// journal client itself never sets one.
    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The normalized base URL (always ends in `/`).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Join a relative path onto the normalized host.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn request(&self, method: Method, uri: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, uri);
        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.user, Some(&credentials.pass));
        }
        builder
    }

    /// Fetch and decode one feed page.
    ///
    /// Sends `Accept: application/vnd.eventstore.atom+json` with
    /// `?embed=TryHarder` so entry payloads are embedded in the page.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on network failure or a non-success status;
    /// [`Error::Decode`] if the body is not a valid feed document.
    pub(crate) async fn get_page(&self, uri: &str) -> Result<Page, Error> {
        let response = self
            .request(Method::GET, uri)
            .header(ACCEPT, ATOM_JSON)
            .query(&[("embed", "TryHarder")])
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        feed::decode_page(&body)
    }

    /// GET a resource, returning the status and raw body.
    ///
    /// Status interpretation belongs to the caller; only I/O failures are
    /// errors here.
    pub(crate) async fn get_raw(&self, uri: &str, accept: &str) -> Result<(u16, String), Error> {
        let response = self
            .request(Method::GET, uri)
            .header(ACCEPT, accept)
            .query(&[("embed", "TryHarder")])
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// HEAD-style existence probe: GET without embedding, status only.
    pub(crate) async fn probe(&self, uri: &str) -> Result<u16, Error> {
        let response = self
            .request(Method::GET, uri)
            .header(ACCEPT, ATOM_JSON)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    /// POST a serialized body with the given content type, returning the status.
    pub(crate) async fn post_body(
        &self,
        uri: &str,
        content_type: &str,
        body: String,
    ) -> Result<u16, Error> {
        let response = self
            .request(Method::POST, uri)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    /// POST with an empty body (ack/nack/replay links), returning the status.
    ///
    /// `action` becomes an `?action=` query parameter when present, as nack
    /// links require.
    pub(crate) async fn post_disposition(
        &self,
        uri: &str,
        action: Option<&str>,
    ) -> Result<u16, Error> {
        let mut builder = self
            .request(Method::POST, uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(action) = action {
            builder = builder.query(&[("action", action)]);
        }
        let response = builder.send().await?;
        Ok(response.status().as_u16())
    }

    /// PUT a JSON body, returning the status.
    pub(crate) async fn put_json(
        &self,
        uri: &str,
        body: &impl serde::Serialize,
    ) -> Result<u16, Error> {
        let response = self
            .request(Method::PUT, uri)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

/// Normalize a base URL so it always ends in `/`.
fn normalize_host(host: String) -> String {
    if host.ends_with('/') {
        host
    } else {
        let mut host = host;
        host.push('/');
        host
    }
}

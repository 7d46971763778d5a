//! Provider backend API HTTP client
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic. Status codes are
//! not treated as transport errors so that 422/429 bodies and headers can
//! be turned into structured [`ProviderError`]s.

use log::debug;
use serde::de::DeserializeOwned;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body};
use url::Url;

use super::api::{CountResponse, CreateAccount, ErrorResponse, UpdateAccount, UserResponse};
use super::{IdentityProvider, PageRequest, ProviderError};
use crate::models::{AccountUpdate, Record, RemoteAccount};

/// HTTP client for the identity provider's backend API
pub struct HttpProvider {
    agent: Agent,
    base_url: String,
    secret_key: String,
}

impl HttpProvider {
    /// Default provider API base URL
    pub const DEFAULT_BASE_URL: &'static str = "https://api.clerk.com/v1";

    /// Per-request timeout
    const TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://api.clerk.com/v1`
    /// * `secret_key` - Backend secret key sent as a bearer token
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Self::TIMEOUT))
            .build();

        Self {
            agent: config.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    fn user_url(&self, id: &str) -> String {
        format!("{}/users/{}", self.base_url, urlencoding::encode(id))
    }
}

impl IdentityProvider for HttpProvider {
    fn create_account(&self, record: &Record) -> Result<RemoteAccount, ProviderError> {
        let url = format!("{}/users", self.base_url);
        let response = self
            .agent
            .post(&url)
            .header("Authorization", &self.bearer())
            .send_json(CreateAccount::from_record(record))
            .map_err(transport)?;

        read_json::<UserResponse>(response).map(RemoteAccount::from)
    }

    fn update_account(&self, id: &str, update: &AccountUpdate) -> Result<RemoteAccount, ProviderError> {
        let response = self
            .agent
            .patch(&self.user_url(id))
            .header("Authorization", &self.bearer())
            .send_json(UpdateAccount::from(update))
            .map_err(transport)?;

        read_json::<UserResponse>(response).map(RemoteAccount::from)
    }

    fn delete_account(&self, id: &str) -> Result<(), ProviderError> {
        let response = self
            .agent
            .delete(&self.user_url(id))
            .header("Authorization", &self.bearer())
            .call()
            .map_err(transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response))
        }
    }

    fn list_accounts(&self, page: &PageRequest) -> Result<Vec<RemoteAccount>, ProviderError> {
        let url = list_url(&self.base_url, page)
            .map_err(|e| ProviderError::Transport(format!("invalid list URL: {e}")))?;
        debug!("Listing accounts: {}", url);

        let response = self
            .agent
            .get(url.as_str())
            .header("Authorization", &self.bearer())
            .call()
            .map_err(transport)?;

        let users: Vec<UserResponse> = read_json(response)?;
        Ok(users.into_iter().map(RemoteAccount::from).collect())
    }

    fn count_accounts(&self) -> Result<u64, ProviderError> {
        let url = format!("{}/users/count", self.base_url);
        let response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .call()
            .map_err(transport)?;

        read_json::<CountResponse>(response).map(|c| c.total_count)
    }
}

/// Build the listing URL for one page
fn list_url(base_url: &str, page: &PageRequest) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("{base_url}/users"))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("limit", &page.limit.to_string());
        if let Some(cursor) = &page.after {
            query.append_pair("after_id", cursor);
        }
    }
    Ok(url)
}

fn transport(error: ureq::Error) -> ProviderError {
    ProviderError::Transport(error.to_string())
}

/// Decode a success body, or turn a failure status into a [`ProviderError`]
fn read_json<T: DeserializeOwned>(mut response: Response<Body>) -> Result<T, ProviderError> {
    if !response.status().is_success() {
        return Err(status_error(response));
    }

    response
        .body_mut()
        .read_json::<T>()
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

fn status_error(mut response: Response<Body>) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.body_mut().read_to_string().unwrap_or_default();

    error_from_body(status, &body, retry_after)
}

/// Parse a `Retry-After` header given in whole seconds
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Extract the provider's error code and message from a failure body
fn error_from_body(status: u16, body: &str, retry_after: Option<Duration>) -> ProviderError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();

    let (code, message) = match parsed.errors.into_iter().next() {
        Some(item) => {
            let message = item
                .long_message
                .or(item.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            (item.code, message)
        }
        None if body.trim().is_empty() => (None, format!("HTTP {status}")),
        None => (None, body.trim().to_string()),
    };

    ProviderError::Status {
        status,
        code,
        message,
        retry_after,
    }
}

//! Structured errors from the identity provider

use std::time::Duration;

/// How the sync engine should treat a provider error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The account already exists (409/422)
    Conflict,
    /// The provider asked us to slow down (429)
    RateLimited,
    /// Anything else; recorded and not retried
    Fatal,
}

/// Error returned by an [`IdentityProvider`](super::IdentityProvider) call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status
    #[error("provider returned {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// A success response whose body could not be understood
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub const CONFLICT: u16 = 409;
    pub const UNPROCESSABLE: u16 = 422;
    pub const TOO_MANY_REQUESTS: u16 = 429;

    /// Build a status error with just a message
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// A 429 response, optionally carrying the provider's retry hint
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::Status {
            status: Self::TOO_MANY_REQUESTS,
            code: Some("too_many_requests".to_string()),
            message: "Too many requests".to_string(),
            retry_after,
        }
    }

    /// A 422 response reporting an identifier that is already taken
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::Status {
            status: Self::UNPROCESSABLE,
            code: Some("form_identifier_exists".to_string()),
            message: message.into(),
            retry_after: None,
        }
    }

    /// HTTP status, if the provider responded at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    /// Retry hint from a rate-limit response
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self.status_code() {
            Some(Self::CONFLICT | Self::UNPROCESSABLE) => ErrorClass::Conflict,
            Some(Self::TOO_MANY_REQUESTS) => ErrorClass::RateLimited,
            _ => ErrorClass::Fatal,
        }
    }
}

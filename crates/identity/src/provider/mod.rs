//! Identity provider integration
//!
//! This module provides:
//! - The `IdentityProvider` trait the sync engine talks to
//! - A blocking HTTP client for the provider's backend API
//! - An in-memory provider for tests and dry runs
//! - Structured provider errors and their retry classification

mod client;
mod error;
mod memory;
mod traits;

pub use client::HttpProvider;
pub use error::{ErrorClass, ProviderError};
pub use memory::{InMemoryProvider, ProviderCall};
pub use traits::{IdentityProvider, PageRequest};

/// Provider API request and response bodies
pub mod api {
    use serde::{Deserialize, Serialize};

    use crate::models::{AccountUpdate, Credential, Metadata, PasswordHasher, Record, RemoteAccount};

    /// Body of `POST /users`
    ///
    /// Exactly one credential mode is populated: a digest with its hasher, a
    /// plaintext password with strength checks skipped, or no password with
    /// the requirement waived.
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct CreateAccount<'a> {
        pub external_id: &'a str,
        pub email_address: &'a [String],
        #[serde(skip_serializing_if = "Option::is_none")]
        pub first_name: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub last_name: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub username: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub password: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub password_digest: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub password_hasher: Option<PasswordHasher>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub skip_password_checks: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub skip_password_requirement: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub public_metadata: Option<&'a Metadata>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub private_metadata: Option<&'a Metadata>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub unsafe_metadata: Option<&'a Metadata>,
    }

    impl<'a> CreateAccount<'a> {
        /// Map a record onto the account-creation request
        pub fn from_record(record: &'a Record) -> Self {
            let mut request = Self {
                external_id: record.id.as_str(),
                email_address: &record.emails,
                first_name: record.first_name.as_deref(),
                last_name: record.last_name.as_deref(),
                username: record.username.as_deref(),
                password: None,
                password_digest: None,
                password_hasher: None,
                skip_password_checks: None,
                skip_password_requirement: None,
                public_metadata: record.public_metadata.as_ref(),
                private_metadata: record.private_metadata.as_ref(),
                unsafe_metadata: record.unsafe_metadata.as_ref(),
            };

            match record.credential() {
                Credential::Digest { digest, hasher } => {
                    request.password_digest = Some(digest);
                    request.password_hasher = Some(hasher);
                }
                Credential::Plaintext(secret) => {
                    request.password = Some(secret);
                    request.skip_password_checks = Some(true);
                }
                Credential::None => {
                    request.skip_password_requirement = Some(true);
                }
            }

            request
        }
    }

    /// Body of `PATCH /users/{id}`
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct UpdateAccount<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub first_name: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub last_name: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub email_address: Option<&'a [String]>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub phone_number: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub username: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub public_metadata: Option<&'a Metadata>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub private_metadata: Option<&'a Metadata>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub unsafe_metadata: Option<&'a Metadata>,
    }

    impl<'a> From<&'a AccountUpdate> for UpdateAccount<'a> {
        fn from(update: &'a AccountUpdate) -> Self {
            Self {
                first_name: update.first_name.as_deref(),
                last_name: update.last_name.as_deref(),
                email_address: update.email_address.as_deref(),
                phone_number: update.phone_number.as_deref(),
                username: update.username.as_deref(),
                public_metadata: update.public_metadata.as_ref(),
                private_metadata: update.private_metadata.as_ref(),
                unsafe_metadata: update.unsafe_metadata.as_ref(),
            }
        }
    }

    /// User object returned by the provider
    #[derive(Debug, Deserialize)]
    pub struct UserResponse {
        pub id: String,
        #[serde(default)]
        pub external_id: Option<String>,
        #[serde(default)]
        pub username: Option<String>,
        #[serde(default)]
        pub email_addresses: Vec<EmailAddressResponse>,
    }

    #[derive(Debug, Deserialize)]
    pub struct EmailAddressResponse {
        pub email_address: String,
    }

    impl From<UserResponse> for RemoteAccount {
        fn from(user: UserResponse) -> Self {
            Self {
                id: user.id,
                external_id: user.external_id,
                username: user.username,
                email_addresses: user
                    .email_addresses
                    .into_iter()
                    .map(|e| e.email_address)
                    .collect(),
            }
        }
    }

    /// Response from `GET /users/count`
    #[derive(Debug, Deserialize)]
    pub struct CountResponse {
        pub total_count: u64,
    }

    /// Error body returned with non-2xx responses
    #[derive(Debug, Default, Deserialize)]
    pub struct ErrorResponse {
        #[serde(default)]
        pub errors: Vec<ErrorItem>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorItem {
        #[serde(default)]
        pub code: Option<String>,
        #[serde(default)]
        pub message: Option<String>,
        #[serde(default)]
        pub long_message: Option<String>,
    }

}

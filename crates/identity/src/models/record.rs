//! Record model: one identity to synchronize

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Free-form metadata namespace attached to an account
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Identifier of a record within a run
///
/// For the create flow this is the external identifier from the dataset;
/// for paginated flows it is the provider's own account id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Hash algorithms the provider accepts for pre-hashed passwords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordHasher {
    Argon2i,
    Argon2id,
    Bcrypt,
    Md5,
    Pbkdf2Sha256,
    Pbkdf2Sha256Django,
    Pbkdf2Sha1,
    ScryptFirebase,
}

impl PasswordHasher {
    /// Wire name of the algorithm
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Argon2i => "argon2i",
            Self::Argon2id => "argon2id",
            Self::Bcrypt => "bcrypt",
            Self::Md5 => "md5",
            Self::Pbkdf2Sha256 => "pbkdf2_sha256",
            Self::Pbkdf2Sha256Django => "pbkdf2_sha256_django",
            Self::Pbkdf2Sha1 => "pbkdf2_sha1",
            Self::ScryptFirebase => "scrypt_firebase",
        }
    }
}

/// Credential material carried by a record, as the provider should see it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    /// No password; the provider waives its password requirement
    None,
    /// A secret the provider stores as given, skipping its strength checks
    Plaintext(&'a str),
    /// A digest produced elsewhere, passed through with its algorithm tag
    Digest {
        digest: &'a str,
        hasher: PasswordHasher,
    },
}

/// One identity record from the input dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// External identifier, unique within a run
    #[serde(rename = "userId")]
    pub id: RecordId,
    /// Email addresses; the dataset may give a single string or a list
    #[serde(rename = "email", deserialize_with = "one_or_many")]
    pub emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Plaintext secret or pre-hashed digest, see [`Record::credential`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hasher: Option<PasswordHasher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsafe_metadata: Option<Metadata>,
}

impl Record {
    /// Create a record with a single email address
    pub fn new(id: impl Into<RecordId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            emails: vec![email.into()],
            first_name: None,
            last_name: None,
            username: None,
            password: None,
            password_hasher: None,
            public_metadata: None,
            private_metadata: None,
            unsafe_metadata: None,
        }
    }

    /// Set first and last name
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    /// Set a plaintext password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self.password_hasher = None;
        self
    }

    /// Set a pre-hashed password digest and its algorithm
    pub fn with_digest(mut self, digest: impl Into<String>, hasher: PasswordHasher) -> Self {
        self.password = Some(digest.into());
        self.password_hasher = Some(hasher);
        self
    }

    /// Set the public metadata namespace
    pub fn with_public_metadata(mut self, metadata: Metadata) -> Self {
        self.public_metadata = Some(metadata);
        self
    }

    /// Classify the credential material on this record
    pub fn credential(&self) -> Credential<'_> {
        match (self.password.as_deref(), self.password_hasher) {
            (Some(digest), Some(hasher)) => Credential::Digest { digest, hasher },
            (Some(secret), None) => Credential::Plaintext(secret),
            (None, _) => Credential::None,
        }
    }
}

/// Accept either `"a@b.c"` or `["a@b.c", ...]`
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(email) => vec![email],
        OneOrMany::Many(emails) => emails,
    })
}

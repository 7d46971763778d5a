//! Partial account update payload

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

use super::Metadata;

/// Rewrites the first character of an account's current username
///
/// Written as `<prefixes>:<replacement>`, e.g. `sc:u` turns `sam` into `uam`
/// and `cat` into `uat` and leaves `bob` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameRewrite {
    pub prefixes: Vec<char>,
    pub replacement: String,
}

impl UsernameRewrite {
    pub fn apply(&self, username: &str) -> String {
        match username.chars().next() {
            Some(first) if self.prefixes.contains(&first) => {
                format!("{}{}", self.replacement, &username[first.len_utf8()..])
            }
            _ => username.to_string(),
        }
    }
}

impl FromStr for UsernameRewrite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefixes, replacement) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <prefixes>:<replacement>, got {s:?}"))?;
        if prefixes.is_empty() {
            return Err("at least one prefix character is required".to_string());
        }
        Ok(Self {
            prefixes: prefixes.chars().collect(),
            replacement: replacement.to_string(),
        })
    }
}

/// Fields to change on an existing account
///
/// Every field is optional and absent fields are never serialized, so the
/// provider leaves them untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsafe_metadata: Option<Metadata>,
    /// Derive each account's username from its current one
    #[serde(skip)]
    pub username_rewrite: Option<UsernameRewrite>,
}

impl AccountUpdate {
    /// True when the payload would not change anything
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// The payload to send for an account with the given current username
    ///
    /// A username rewrite wins over a fixed `username`; accounts without a
    /// username keep the payload as is.
    pub fn for_account(&self, current_username: Option<&str>) -> Cow<'_, Self> {
        match (&self.username_rewrite, current_username) {
            (Some(rewrite), Some(current)) => Cow::Owned(Self {
                username: Some(rewrite.apply(current)),
                ..self.clone()
            }),
            _ => Cow::Borrowed(self),
        }
    }
}

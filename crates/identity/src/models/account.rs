//! Account as reported by the identity provider

use serde::{Deserialize, Serialize};

use super::{Record, RecordId};

/// An account that already exists on the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAccount {
    /// Provider-assigned account id
    pub id: String,
    /// External identifier supplied when the account was created
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<String>,
}

impl RemoteAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external_id: None,
            username: None,
            email_addresses: Vec::new(),
        }
    }

    /// View this account as a record keyed by the provider id
    ///
    /// Paginated flows dispatch remote accounts through the same engine as
    /// dataset records; the record id is what update and delete address.
    pub fn into_record(self) -> Record {
        Record {
            id: RecordId(self.id),
            emails: self.email_addresses,
            first_name: None,
            last_name: None,
            username: self.username,
            password: None,
            password_hasher: None,
            public_metadata: None,
            private_metadata: None,
            unsafe_metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_record_uses_provider_id() {
        let account = RemoteAccount {
            id: "user_2abc".to_string(),
            external_id: Some("legacy-7".to_string()),
            username: Some("ada".to_string()),
            email_addresses: vec!["ada@example.com".to_string()],
        };

        let record = account.into_record();
        assert_eq!(record.id.as_str(), "user_2abc");
        assert_eq!(record.username.as_deref(), Some("ada"));
        assert_eq!(record.emails, vec!["ada@example.com"]);
    }
}

//! Input dataset loading and validation
//!
//! Validation is all-or-nothing: a dataset with any invalid record is
//! rejected before a single remote call is made.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::models::{AccountUpdate, Record, RecordId};
use crate::sync::FailureLogEntry;

/// Maximum email length per RFC 5321
const MAX_EMAIL_LENGTH: usize = 254;

/// A single problem found in the dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Position of the record in the input array
    pub index: usize,
    /// Record identifier, when it could be read
    pub id: Option<String>,
    pub reason: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "record #{} ({}): {}", self.index, id, self.reason),
            None => write!(f, "record #{}: {}", self.index, self.reason),
        }
    }
}

/// Error loading or validating a dataset
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset is not a valid array of records: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("dataset rejected, {} invalid record(s); first: {}", .0.len(), .0[0])]
    Invalid(Vec<Issue>),
}

impl DatasetError {
    /// Validation issues, empty for I/O and parse errors
    pub fn issues(&self) -> &[Issue] {
        match self {
            Self::Invalid(issues) => issues,
            Self::Io(_) | Self::Parse(_) => &[],
        }
    }
}

/// Read and validate a dataset file
pub fn load(path: &Path) -> Result<Vec<Record>, DatasetError> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// Parse and validate a dataset from a JSON string
pub fn parse(json: &str) -> Result<Vec<Record>, DatasetError> {
    let records: Vec<Record> = serde_json::from_str(json)?;
    validate(&records)?;
    Ok(records)
}

/// Validate every record, collecting all issues
pub fn validate(records: &[Record]) -> Result<(), DatasetError> {
    let mut issues = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let id = record.id.as_str();
        let mut report = |reason: String| {
            issues.push(Issue {
                index,
                id: (!id.is_empty()).then(|| id.to_string()),
                reason,
            })
        };

        if id.trim().is_empty() {
            report("identifier is empty".to_string());
        } else if !seen.insert(id) {
            report("identifier appears more than once".to_string());
        }

        if record.emails.is_empty() {
            report("at least one email address is required".to_string());
        }
        for email in &record.emails {
            if let Err(reason) = validate_email(email) {
                report(format!("invalid email {email:?}: {reason}"));
            }
        }

        match (&record.password, record.password_hasher) {
            (Some(password), _) if password.is_empty() => {
                report("password is empty".to_string());
            }
            (None, Some(hasher)) => {
                report(format!("password hasher {} given without a password", hasher.as_str()));
            }
            _ => {}
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(DatasetError::Invalid(issues))
    }
}

/// Validate an update payload before it is applied to any account
pub fn validate_update(update: &AccountUpdate) -> Result<(), DatasetError> {
    let issues: Vec<Issue> = update
        .email_address
        .iter()
        .flatten()
        .filter_map(|email| {
            validate_email(email).err().map(|reason| Issue {
                index: 0,
                id: None,
                reason: format!("invalid email {email:?}: {reason}"),
            })
        })
        .collect();

    if issues.is_empty() {
        Ok(())
    } else {
        Err(DatasetError::Invalid(issues))
    }
}

/// Validate an email address format
///
/// A practical check rather than full RFC 5322: exactly one `@`, non-empty
/// local part, a dotted domain that does not start or end with `.` or `-`,
/// no whitespace, and a bounded length.
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("empty".to_string());
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(format!("longer than {MAX_EMAIL_LENGTH} characters"));
    }
    if email.contains(char::is_whitespace) {
        return Err("contains whitespace".to_string());
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err("missing '@'".to_string());
    };
    if domain.contains('@') {
        return Err("more than one '@'".to_string());
    }
    if local.is_empty() {
        return Err("local part is empty".to_string());
    }
    if !domain.contains('.') {
        return Err("domain has no '.'".to_string());
    }
    if domain.starts_with(['.', '-']) || domain.ends_with(['.', '-']) {
        return Err("domain starts or ends with '.' or '-'".to_string());
    }

    Ok(())
}

/// Keep only the records named in a previous run's failure log
pub fn retain_failed(records: Vec<Record>, failures: &[FailureLogEntry]) -> Vec<Record> {
    let failed: HashSet<&RecordId> = failures.iter().map(|e| &e.record_id).collect();
    records
        .into_iter()
        .filter(|r| failed.contains(&r.id))
        .collect()
}

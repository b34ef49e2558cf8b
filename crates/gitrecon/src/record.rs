use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{serialize_names_by_email, CommitMetadata};

// -------------------------------------------------------------------------------------------------
// ErrorEntry
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
}

// -------------------------------------------------------------------------------------------------
// AccountType
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    User,
    Organization,
}

impl AccountType {
    /// Interpret the `type` field of a GitHub user object.
    pub fn from_github(user_type: &str) -> Self {
        if user_type == "Organization" {
            AccountType::Organization
        } else {
            AccountType::User
        }
    }
}

// -------------------------------------------------------------------------------------------------
// UserRecord
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub login: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,

    #[serde(rename = "orgs", skip_serializing_if = "Vec::is_empty")]
    pub organizations: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
}

impl UserRecord {
    pub fn with_login<S: Into<String>>(login: S) -> Self {
        UserRecord {
            login: login.into(),
            ..Default::default()
        }
    }

    /// Blank the login if it belongs to the authenticated caller.
    pub fn redact(&mut self, self_login: &str) {
        if !self_login.is_empty() && self.login == self_login {
            self.login.clear();
        }
    }
}

// -------------------------------------------------------------------------------------------------
// RepositoryRecord
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryRecord {
    /// The platform's stable identifier; used for merging, never emitted.
    #[serde(skip)]
    pub id: Option<i64>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub owner: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fork: Option<bool>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,

    #[serde(
        serialize_with = "serialize_names_by_email",
        skip_serializing_if = "CommitMetadata::is_empty"
    )]
    pub metadata: CommitMetadata,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<UserRecord>,
}

impl RepositoryRecord {
    pub fn at_location<S: Into<String>>(location: S) -> Self {
        RepositoryRecord {
            location: location.into(),
            ..Default::default()
        }
    }
}

// -------------------------------------------------------------------------------------------------
// ReconRecord
// -------------------------------------------------------------------------------------------------
/// The unit of output: one repository, one user, or one error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconRecord {
    pub time: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryRecord>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecord>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error: Vec<ErrorEntry>,
}

impl ReconRecord {
    fn empty() -> Self {
        ReconRecord {
            time: Utc::now(),
            repository: None,
            user: None,
            error: Vec::new(),
        }
    }

    pub fn for_repository(repository: RepositoryRecord) -> Self {
        ReconRecord {
            repository: Some(repository),
            ..Self::empty()
        }
    }

    pub fn for_user(user: UserRecord) -> Self {
        ReconRecord {
            user: Some(user),
            ..Self::empty()
        }
    }

    pub fn from_error<E: std::fmt::Display>(err: E) -> Self {
        let mut record = Self::empty();
        record.push_error(err);
        record
    }

    /// Record an error, refreshing the record's timestamp.
    pub fn push_error<E: std::fmt::Display>(&mut self, err: E) {
        self.time = Utc::now();
        self.error.push(ErrorEntry {
            message: err.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.error.is_empty()
    }
}

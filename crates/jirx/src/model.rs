//! 📦 The data model — what the tracker hands us, and what we hand everyone else.
//!
//! Two shapes live here:
//! - [`RemoteIssue`] is the boundary record. Tracker backends fill it straight from the
//!   wire. Fields that the tracker may send as an opaque code are [`FieldValue`]s, so
//!   "the REST API gave us a name" and "the RPC API gave us an id" look the same.
//! - [`Issue`] is the normalized record. Built once by the fetcher, never mutated,
//!   dropped at the end of the invocation. Every remote field converted exactly once.
//!
//! The looseness of the remote API stops at this file. 🦆

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 🔒 One authenticated session. Acquired once per invocation, closed exactly once.
///
/// The REST flavor carries no token (basic auth rides on every request); the legacy
/// RPC flavor carries the token that `login` handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub server: String,
    pub token: Option<String>,
    pub user: Option<String>,
}

impl Session {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            token: None,
            user: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

/// 🎭 A remote field that is either already a display name or a code needing a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Name(String),
    Code(String),
}

impl FieldValue {
    pub fn name(value: impl Into<String>) -> Self {
        Self::Name(value.into())
    }

    pub fn code(value: impl Into<String>) -> Self {
        Self::Code(value.into())
    }
}

/// 🗂️ Which lookup table a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    Priority,
    Resolution,
    Status,
    IssueType,
    User,
}

impl CodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Resolution => "resolution",
            Self::Status => "status",
            Self::IssueType => "issue type",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 📡 One issue exactly as the tracker described it, before normalization.
///
/// `comments` is `None` when the tracker does not inline them (legacy RPC), in which
/// case the fetcher asks for them separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<FieldValue>,
    #[serde(default)]
    pub resolution: Option<FieldValue>,
    #[serde(default)]
    pub priority: Option<FieldValue>,
    #[serde(default)]
    pub issue_type: Option<FieldValue>,
    #[serde(default)]
    pub reporter: Option<FieldValue>,
    #[serde(default)]
    pub assignee: Option<FieldValue>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub fix_versions: Vec<String>,
    #[serde(default)]
    pub comments: Option<Vec<String>>,
}

/// 🎫 A normalized issue. `key` and `issue_type` are always present; the rest may be empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub key: String,
    pub id: String,
    pub summary: Option<String>,
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub reporter: Option<String>,
    pub assignee: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub components: Vec<String>,
    pub fix_versions: Vec<String>,
    pub comments: Vec<String>,
    pub link: String,
}

impl Issue {
    /// 🧪 Bare-bones issue with just the two mandatory fields. Handy in tests and fixtures.
    pub fn stub(key: impl Into<String>, issue_type: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            id: key.clone(),
            link: String::new(),
            key,
            summary: None,
            status: None,
            resolution: None,
            priority: None,
            issue_type: issue_type.into(),
            reporter: None,
            assignee: None,
            created: None,
            updated: None,
            components: Vec::new(),
            fix_versions: Vec::new(),
            comments: Vec::new(),
        }
    }
}

/// 🔀 A workflow action currently available on one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowAction {
    pub id: String,
    pub name: String,
}

/// 🏷️ A project version as the tracker knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVersion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
}

/// 🕰️ Parse the timestamp flavors trackers emit.
///
/// RFC 3339 first, then JIRA's `2024-01-15T10:30:00.000+0000` (offset without a colon).
pub fn parse_tracker_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
}

/// 🔗 `{base}/browse/{key}` with exactly one slash in between.
pub fn browse_link(base_url: &str, key: &str) -> String {
    format!("{}/browse/{}", base_url.trim_end_matches('/'), key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn the_one_where_jira_offsets_without_colons_still_parse() {
        let the_expected = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();
        assert_eq!(
            parse_tracker_timestamp("2024-01-15T10:30:00.000+0100"),
            Some(the_expected)
        );
        assert_eq!(
            parse_tracker_timestamp("2024-01-15T09:30:00Z"),
            Some(the_expected)
        );
        assert_eq!(parse_tracker_timestamp("last tuesday-ish"), None);
    }

    #[test]
    fn the_one_where_the_browse_link_has_exactly_one_slash() {
        assert_eq!(
            browse_link("https://jira.example.com/", "ABC-7"),
            "https://jira.example.com/browse/ABC-7"
        );
        assert_eq!(
            browse_link("https://jira.example.com", "ABC-7"),
            "https://jira.example.com/browse/ABC-7"
        );
    }

    #[test]
    fn the_one_where_fixture_issues_deserialize_from_toml_shaped_json() {
        let the_fixture = serde_json::json!({
            "id": "10001",
            "key": "ABC-1",
            "issue_type": { "name": "Bug" },
            "status": { "code": "5" },
            "fix_versions": ["1.0"]
        });
        let the_issue: RemoteIssue = serde_json::from_value(the_fixture).unwrap();
        assert_eq!(the_issue.issue_type, Some(FieldValue::name("Bug")));
        assert_eq!(the_issue.status, Some(FieldValue::code("5")));
        assert!(the_issue.comments.is_none());
        assert!(the_issue.components.is_empty());
    }
}

//! 🦖 The legacy RPC backend.
//!
//! Older JIRA servers expose their SOAP service a second time as JSON-RPC, at
//! `{url}/rpc/json-rpc/jirasoapservice-v2/{method}`. Every call is a POST whose body is
//! the positional argument array, and every call after `login` carries the session
//! token as its first argument.
//!
//! This dialect is stingy: search results carry ids instead of names for status,
//! priority, resolution, type, and users, and comments are not inlined at all. The
//! fetcher makes up the difference through `resolve_code` and `fetch_comments`.
//!
//! `close` calls `logout`, so a leaked session here is a real leaked session.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::{TrackerError, TrackerResult};
use crate::model::{
    CodeKind, FieldValue, RemoteIssue, RemoteVersion, Session, WorkflowAction,
    parse_tracker_timestamp,
};
use crate::tracker::{TrackerClient, default_timeout_secs, http_failure};

const RPC_PATH: &str = "/rpc/json-rpc/jirasoapservice-v2";

/// 🦖 Legacy tracker config. The RPC service has no anonymous mode.
#[derive(Debug, Deserialize, Clone)]
pub struct LegacyTrackerConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug)]
pub struct LegacyTracker {
    client: reqwest::Client,
    base_url: String,
    config: LegacyTrackerConfig,
}

// -- 📦 wire shapes

#[derive(Debug, Deserialize)]
struct IdName {
    #[serde(default)]
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyIssue {
    id: String,
    key: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, rename = "type")]
    issue_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    reporter: Option<String>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    created: Option<Value>,
    #[serde(default)]
    updated: Option<Value>,
    #[serde(default)]
    components: Vec<IdName>,
    #[serde(default)]
    fix_versions: Vec<IdName>,
}

impl From<LegacyIssue> for RemoteIssue {
    fn from(issue: LegacyIssue) -> Self {
        let code = |c: Option<String>| c.filter(|c| !c.is_empty()).map(FieldValue::Code);
        RemoteIssue {
            id: issue.id,
            key: issue.key,
            summary: issue.summary,
            status: code(issue.status),
            resolution: code(issue.resolution),
            priority: code(issue.priority),
            issue_type: code(issue.issue_type),
            reporter: code(issue.reporter),
            assignee: code(issue.assignee),
            created: issue.created.as_ref().and_then(legacy_timestamp),
            updated: issue.updated.as_ref().and_then(legacy_timestamp),
            components: issue.components.into_iter().map(|c| c.name).collect(),
            fix_versions: issue.fix_versions.into_iter().map(|v| v.name).collect(),
            comments: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LegacyUser {
    #[serde(default)]
    fullname: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyComment {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyVersion {
    id: String,
    name: String,
    #[serde(default)]
    released: bool,
    #[serde(default)]
    release_date: Option<Value>,
}

impl From<LegacyVersion> for RemoteVersion {
    fn from(v: LegacyVersion) -> Self {
        RemoteVersion {
            id: v.id,
            name: v.name,
            released: v.released,
            release_date: v
                .release_date
                .as_ref()
                .and_then(legacy_timestamp)
                .map(|t| t.date_naive()),
        }
    }
}

/// 🕰️ The RPC bridge sends dates as epoch millis or as strings, depending on its mood.
fn legacy_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => parse_tracker_timestamp(s).or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }),
        _ => None,
    }
}

impl LegacyTracker {
    pub fn new(config: LegacyTrackerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably a TLS stack having a bad day.")?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// 📡 One RPC round trip. The error is a bare reason string; callers pick the variant.
    async fn call<T: DeserializeOwned>(
        &self,
        rpc_method: &str,
        params: Value,
    ) -> std::result::Result<T, String> {
        let url = format!("{}{}/{}", self.base_url, RPC_PATH, rpc_method);
        trace!("📡 RPC {rpc_method}");
        let response = self
            .client
            .post(&url)
            .json(&params)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_failure(status, response.text().await));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("unreadable response: {e}"))?;
        // -- faults come back as 200 with an `error` envelope
        if let Some(fault) = body.get("error") {
            let message = fault
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| fault.to_string());
            return Err(message);
        }
        serde_json::from_value(body).map_err(|e| format!("unexpected response shape: {e}"))
    }

    async fn lookup<T: DeserializeOwned>(&self, rpc_method: &str, params: Value) -> TrackerResult<T> {
        self.call(rpc_method, params)
            .await
            .map_err(|reason| TrackerError::lookup(rpc_method, reason))
    }

    fn token(session: &Session) -> TrackerResult<&str> {
        session
            .token
            .as_deref()
            .ok_or_else(|| TrackerError::lookup("session", "no login token; authenticate first"))
    }
}

#[async_trait]
impl TrackerClient for LegacyTracker {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn authenticate(&self) -> TrackerResult<Session> {
        let token: String = self
            .call("login", json!([self.config.username, self.config.password]))
            .await
            .map_err(|reason| TrackerError::Authentication {
                server: self.base_url.clone(),
                reason,
            })?;
        debug!("🔒 Logged in as {}", self.config.username);
        Ok(Session::new(self.base_url.clone())
            .with_token(token)
            .with_user(self.config.username.clone()))
    }

    async fn search(
        &self,
        session: &Session,
        jql: &str,
        max_results: usize,
    ) -> TrackerResult<Vec<RemoteIssue>> {
        let token = Self::token(session)?;
        let found: Option<Vec<LegacyIssue>> = self
            .call("getIssuesFromJqlSearch", json!([token, jql, max_results]))
            .await
            .map_err(|reason| TrackerError::Query {
                query: jql.to_string(),
                reason,
            })?;
        Ok(found
            .unwrap_or_default()
            .into_iter()
            .map(RemoteIssue::from)
            .collect())
    }

    async fn resolve_code(
        &self,
        session: &Session,
        kind: CodeKind,
        code: &str,
    ) -> TrackerResult<String> {
        let token = Self::token(session)?;
        let rpc_method = match kind {
            CodeKind::Priority => "getPriorities",
            CodeKind::Resolution => "getResolutions",
            CodeKind::Status => "getStatuses",
            CodeKind::IssueType => "getIssueTypes",
            CodeKind::User => {
                // -- users are not a table; one call per username
                let user: LegacyUser = self.lookup("getUser", json!([token, code])).await?;
                return user.fullname.or(user.name).ok_or_else(|| {
                    TrackerError::lookup("getUser", format!("no user named '{code}'"))
                });
            }
        };
        let table: Vec<IdName> = self.lookup(rpc_method, json!([token])).await?;
        table
            .into_iter()
            .find(|entry| entry.id.as_deref() == Some(code))
            .map(|entry| entry.name)
            .ok_or_else(|| TrackerError::lookup(rpc_method, format!("no {kind} with id '{code}'")))
    }

    async fn fetch_comments(
        &self,
        session: &Session,
        issue_key: &str,
    ) -> TrackerResult<Vec<String>> {
        let token = Self::token(session)?;
        let comments: Option<Vec<LegacyComment>> =
            self.lookup("getComments", json!([token, issue_key])).await?;
        Ok(comments
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.body)
            .collect())
    }

    async fn list_workflow_actions(
        &self,
        session: &Session,
        issue_key: &str,
    ) -> TrackerResult<Vec<WorkflowAction>> {
        let token = Self::token(session)?;
        let actions: Option<Vec<WorkflowAction>> = self
            .lookup("getAvailableActions", json!([token, issue_key]))
            .await?;
        Ok(actions.unwrap_or_default())
    }

    async fn apply_transition(
        &self,
        session: &Session,
        issue_key: &str,
        action_id: &str,
    ) -> TrackerResult<()> {
        let token = Self::token(session)?;
        let _: Value = self
            .lookup(
                "progressWorkflowAction",
                json!([token, issue_key, action_id, []]),
            )
            .await?;
        Ok(())
    }

    async fn list_versions(
        &self,
        session: &Session,
        project_key: &str,
    ) -> TrackerResult<Vec<RemoteVersion>> {
        let token = Self::token(session)?;
        let versions: Option<Vec<LegacyVersion>> =
            self.lookup("getVersions", json!([token, project_key])).await?;
        Ok(versions
            .unwrap_or_default()
            .into_iter()
            .map(RemoteVersion::from)
            .collect())
    }

    async fn add_version(
        &self,
        session: &Session,
        project_key: &str,
        name: &str,
    ) -> TrackerResult<RemoteVersion> {
        let token = Self::token(session)?;
        let created: LegacyVersion = self
            .lookup("addVersion", json!([token, project_key, { "name": name }]))
            .await?;
        Ok(created.into())
    }

    async fn release_version(
        &self,
        session: &Session,
        project_key: &str,
        version: &RemoteVersion,
        release_date: NaiveDate,
    ) -> TrackerResult<()> {
        let token = Self::token(session)?;
        let released = json!({
            "id": version.id,
            "name": version.name,
            "released": true,
            "releaseDate": release_date.format("%Y-%m-%d").to_string(),
        });
        let _: Value = self
            .lookup("releaseVersion", json!([token, project_key, released]))
            .await?;
        Ok(())
    }

    async fn close(&self, session: &Session) -> TrackerResult<()> {
        let token = Self::token(session)?;
        let _: Value = self.lookup("logout", json!([token])).await?;
        debug!("🗑️ Logged out of {}", self.base_url);
        Ok(())
    }
}

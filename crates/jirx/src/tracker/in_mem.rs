//! # Previously, on Jirx...
//!
//! 🎬 The tracker was down. Again. Someone, somewhere, was "upgrading the plugin".
//! The release still had to ship. Someone had to pretend to be JIRA, so convincingly
//! that the pipeline would never know the difference.
//!
//! That someone was this module.
//!
//! `in_mem` is a [`TrackerClient`] that lives entirely in RAM. Issues, workflow
//! actions, versions, and code lookups come from its config; every call that would
//! have mutated a real tracker is written into a [`CallLog`] behind an
//! `Arc<tokio::sync::Mutex<..>>` so tests can check what the pipeline asked for.
//!
//! ⚠️ Not for production. For fixtures, dry-runs, and tests.
//!
//! 🦆

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};
use crate::model::{CodeKind, RemoteIssue, RemoteVersion, Session, WorkflowAction};
use crate::tracker::TrackerClient;

fn default_in_memory_url() -> String {
    "http://tracker.invalid".to_string()
}

/// 📦 Fixture tracker configuration. Everything the fake JIRA "knows".
#[derive(Debug, Deserialize, Clone)]
pub struct InMemoryTrackerConfig {
    /// 🌐 Only used for browse links.
    #[serde(default = "default_in_memory_url")]
    pub url: String,
    /// 🎫 Every search returns these, capped at `max_results`.
    #[serde(default)]
    pub issues: Vec<RemoteIssue>,
    /// 🔀 Issue key → workflow actions currently available on it.
    #[serde(default)]
    pub actions: BTreeMap<String, Vec<WorkflowAction>>,
    /// 🏷️ The project's versions.
    #[serde(default)]
    pub versions: Vec<RemoteVersion>,
    /// 🗂️ Code → display name, shared across every code kind.
    #[serde(default)]
    pub codes: BTreeMap<String, String>,
    /// 💬 Issue key → comments, for issues whose `comments` is not inlined.
    #[serde(default)]
    pub comments: BTreeMap<String, Vec<String>>,
    /// 🔒 When set, `authenticate` fails with this reason.
    #[serde(default)]
    pub reject_credentials: Option<String>,
    /// 🔍 When set, `search` fails with a query error carrying this reason.
    #[serde(default)]
    pub reject_query: Option<String>,
    /// 💀 Issue keys whose workflow-action listing blows up.
    #[serde(default)]
    pub broken_issues: Vec<String>,
}

impl Default for InMemoryTrackerConfig {
    fn default() -> Self {
        Self {
            url: default_in_memory_url(),
            issues: Vec::new(),
            actions: BTreeMap::new(),
            versions: Vec::new(),
            codes: BTreeMap::new(),
            comments: BTreeMap::new(),
            reject_credentials: None,
            reject_query: None,
            broken_issues: Vec::new(),
        }
    }
}

/// 📋 Everything the pipeline asked the fake tracker to do, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallLog {
    pub authentications: usize,
    pub closes: usize,
    pub searches: Vec<String>,
    /// (issue key, action id)
    pub transitions: Vec<(String, String)>,
    pub added_versions: Vec<String>,
    /// (version name, release date)
    pub released_versions: Vec<(String, NaiveDate)>,
}

/// 🧪 A tracker made of heap memory and good intentions.
///
/// Clone-able so a test can keep a handle after passing one into the runner. The `Arc`
/// means every clone writes to the same log.
#[derive(Debug, Clone)]
pub struct InMemoryTracker {
    config: Arc<InMemoryTrackerConfig>,
    versions: Arc<Mutex<Vec<RemoteVersion>>>,
    calls: Arc<Mutex<CallLog>>,
}

impl InMemoryTracker {
    pub fn new(config: InMemoryTrackerConfig) -> Self {
        let versions = config.versions.clone();
        Self {
            config: Arc::new(config),
            versions: Arc::new(Mutex::new(versions)),
            calls: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    /// 🔍 Snapshot of the call log so far.
    pub async fn call_log(&self) -> CallLog {
        self.calls.lock().await.clone()
    }

    /// 🏷️ Snapshot of the versions, including any added or released along the way.
    pub async fn versions(&self) -> Vec<RemoteVersion> {
        self.versions.lock().await.clone()
    }
}

#[async_trait]
impl TrackerClient for InMemoryTracker {
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn authenticate(&self) -> TrackerResult<Session> {
        self.calls.lock().await.authentications += 1;
        if let Some(reason) = &self.config.reject_credentials {
            return Err(TrackerError::Authentication {
                server: self.config.url.clone(),
                reason: reason.clone(),
            });
        }
        debug!("🔒 In-memory session opened. Nobody checked the password.");
        Ok(Session::new(self.base_url()).with_token("in-memory"))
    }

    async fn search(
        &self,
        _session: &Session,
        jql: &str,
        max_results: usize,
    ) -> TrackerResult<Vec<RemoteIssue>> {
        self.calls.lock().await.searches.push(jql.to_string());
        if let Some(reason) = &self.config.reject_query {
            return Err(TrackerError::Query {
                query: jql.to_string(),
                reason: reason.clone(),
            });
        }
        // -- the fake tracker ignores the JQL; every fixture issue matches
        Ok(self.config.issues.iter().take(max_results).cloned().collect())
    }

    async fn resolve_code(
        &self,
        _session: &Session,
        kind: CodeKind,
        code: &str,
    ) -> TrackerResult<String> {
        self.config.codes.get(code).cloned().ok_or_else(|| {
            TrackerError::lookup(
                format!("resolve {kind}"),
                format!("no {kind} with code '{code}'"),
            )
        })
    }

    async fn fetch_comments(
        &self,
        _session: &Session,
        issue_key: &str,
    ) -> TrackerResult<Vec<String>> {
        Ok(self
            .config
            .comments
            .get(issue_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_workflow_actions(
        &self,
        _session: &Session,
        issue_key: &str,
    ) -> TrackerResult<Vec<WorkflowAction>> {
        if self.config.broken_issues.iter().any(|k| k == issue_key) {
            return Err(TrackerError::lookup(
                "list workflow actions",
                format!("{issue_key} is cursed"),
            ));
        }
        Ok(self
            .config
            .actions
            .get(issue_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_transition(
        &self,
        _session: &Session,
        issue_key: &str,
        action_id: &str,
    ) -> TrackerResult<()> {
        self.calls
            .lock()
            .await
            .transitions
            .push((issue_key.to_string(), action_id.to_string()));
        Ok(())
    }

    async fn list_versions(
        &self,
        _session: &Session,
        _project_key: &str,
    ) -> TrackerResult<Vec<RemoteVersion>> {
        Ok(self.versions.lock().await.clone())
    }

    async fn add_version(
        &self,
        _session: &Session,
        _project_key: &str,
        name: &str,
    ) -> TrackerResult<RemoteVersion> {
        let mut versions = self.versions.lock().await;
        let the_new_one = RemoteVersion {
            id: format!("mem-{}", versions.len() + 1),
            name: name.to_string(),
            released: false,
            release_date: None,
        };
        versions.push(the_new_one.clone());
        self.calls.lock().await.added_versions.push(name.to_string());
        Ok(the_new_one)
    }

    async fn release_version(
        &self,
        _session: &Session,
        _project_key: &str,
        version: &RemoteVersion,
        release_date: NaiveDate,
    ) -> TrackerResult<()> {
        let mut versions = self.versions.lock().await;
        let target = versions
            .iter_mut()
            .find(|v| v.id == version.id)
            .ok_or_else(|| {
                TrackerError::lookup("release version", format!("no version '{}'", version.id))
            })?;
        target.released = true;
        target.release_date = Some(release_date);
        self.calls
            .lock()
            .await
            .released_versions
            .push((version.name.clone(), release_date));
        Ok(())
    }

    async fn close(&self, _session: &Session) -> TrackerResult<()> {
        self.calls.lock().await.closes += 1;
        Ok(())
    }
}

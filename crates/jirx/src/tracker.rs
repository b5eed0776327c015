//! 🔌 Trackers — where the real I/O happens.
//!
//! 🎭 This module is the casting agency. Need to talk to a modern JIRA over REST?
//! A crusty old one that still speaks the legacy RPC dialect and hands out login
//! tokens like it's 2009? A fixture tracker that lives entirely in RAM? We've got a
//! backend for that.
//!
//! The pipeline only ever sees [`TrackerClient`]. It does not know, and does not want
//! to know, which protocol is on the other end.
//!
//! # Contract 📜
//! - `authenticate` once per invocation. The returned [`Session`] is passed by reference
//!   to every other call.
//! - `close` exactly once, after the last call, on success and failure alike.
//! - `resolve_code` turns an opaque code into a display name. Trackers that already
//!   return display names may treat it as a pass-through.
//!
//! 🦆

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::app_config::TrackerConfig;
use crate::error::TrackerResult;
use crate::model::{CodeKind, RemoteIssue, RemoteVersion, Session, WorkflowAction};

pub mod in_mem;
pub mod legacy;
pub mod rest;

pub use in_mem::{CallLog, InMemoryTracker, InMemoryTrackerConfig};
pub use legacy::{LegacyTracker, LegacyTrackerConfig};
pub use rest::{RestTracker, RestTrackerConfig};

// 🕰️ 30 seconds. If the tracker can't answer in 30 seconds, it's not having a good day.
pub(crate) fn default_timeout_secs() -> u64 {
    30
}

/// 💀 Reason text for a non-2xx response. A body we could not read is named as such.
pub(crate) fn http_failure<E: std::fmt::Display>(
    status: reqwest::StatusCode,
    body: std::result::Result<String, E>,
) -> String {
    match body {
        Ok(body) => format!("HTTP {status}: {body}"),
        Err(e) => format!("HTTP {status} (response body unreadable: {e})"),
    }
}

/// 📡 Everything the pipeline is allowed to ask of an issue tracker.
#[async_trait]
pub trait TrackerClient: std::fmt::Debug + Send + Sync {
    /// 🌐 Base URL of the tracker, used to build browse links.
    fn base_url(&self) -> &str;

    /// 🔒 Open a session. Fails with `Authentication` on bad credentials or no server.
    async fn authenticate(&self) -> TrackerResult<Session>;

    /// 🔍 Run one capped search. Fails with `Query` when the tracker rejects the JQL.
    async fn search(
        &self,
        session: &Session,
        jql: &str,
        max_results: usize,
    ) -> TrackerResult<Vec<RemoteIssue>>;

    /// 🗂️ Code → display name for priorities, resolutions, statuses, types, users.
    async fn resolve_code(
        &self,
        session: &Session,
        kind: CodeKind,
        code: &str,
    ) -> TrackerResult<String>;

    /// 💬 Comment bodies for one issue, for trackers whose search does not inline them.
    async fn fetch_comments(&self, session: &Session, issue_key: &str)
    -> TrackerResult<Vec<String>>;

    /// 🔀 Workflow actions currently valid for one issue. Empty when there are none.
    async fn list_workflow_actions(
        &self,
        session: &Session,
        issue_key: &str,
    ) -> TrackerResult<Vec<WorkflowAction>>;

    /// 🚀 Apply one workflow action, no extra fields.
    async fn apply_transition(
        &self,
        session: &Session,
        issue_key: &str,
        action_id: &str,
    ) -> TrackerResult<()>;

    /// 🏷️ All versions of a project.
    async fn list_versions(
        &self,
        session: &Session,
        project_key: &str,
    ) -> TrackerResult<Vec<RemoteVersion>>;

    /// ➕ Create an unreleased version.
    async fn add_version(
        &self,
        session: &Session,
        project_key: &str,
        name: &str,
    ) -> TrackerResult<RemoteVersion>;

    /// ✅ Mark a version released on the given date.
    async fn release_version(
        &self,
        session: &Session,
        project_key: &str,
        version: &RemoteVersion,
        release_date: NaiveDate,
    ) -> TrackerResult<()>;

    /// 🗑️ Release the session. Idempotent on the tracker side.
    async fn close(&self, session: &Session) -> TrackerResult<()>;
}

/// 🎭 The many faces of a tracker — a polymorphic casting call.
///
/// Same trick as a universal remote: one set of buttons, whichever TV is plugged in.
#[derive(Debug)]
pub enum TrackerBackend {
    Rest(RestTracker),
    Legacy(LegacyTracker),
    InMemory(InMemoryTracker),
}

impl TrackerBackend {
    /// 🔧 Build the backend the config asks for.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        let backend = match config {
            TrackerConfig::Rest(c) => Self::Rest(
                RestTracker::new(c.clone()).context("💀 Could not build the REST tracker client")?,
            ),
            TrackerConfig::Legacy(c) => Self::Legacy(
                LegacyTracker::new(c.clone())
                    .context("💀 Could not build the legacy RPC tracker client")?,
            ),
            TrackerConfig::InMemory(c) => Self::InMemory(InMemoryTracker::new(c.clone())),
        };
        Ok(backend)
    }

    fn inner(&self) -> &dyn TrackerClient {
        match self {
            Self::Rest(t) => t,
            Self::Legacy(t) => t,
            Self::InMemory(t) => t,
        }
    }
}

#[async_trait]
impl TrackerClient for TrackerBackend {
    fn base_url(&self) -> &str {
        self.inner().base_url()
    }

    async fn authenticate(&self) -> TrackerResult<Session> {
        self.inner().authenticate().await
    }

    async fn search(
        &self,
        session: &Session,
        jql: &str,
        max_results: usize,
    ) -> TrackerResult<Vec<RemoteIssue>> {
        self.inner().search(session, jql, max_results).await
    }

    async fn resolve_code(
        &self,
        session: &Session,
        kind: CodeKind,
        code: &str,
    ) -> TrackerResult<String> {
        self.inner().resolve_code(session, kind, code).await
    }

    async fn fetch_comments(
        &self,
        session: &Session,
        issue_key: &str,
    ) -> TrackerResult<Vec<String>> {
        self.inner().fetch_comments(session, issue_key).await
    }

    async fn list_workflow_actions(
        &self,
        session: &Session,
        issue_key: &str,
    ) -> TrackerResult<Vec<WorkflowAction>> {
        self.inner().list_workflow_actions(session, issue_key).await
    }

    async fn apply_transition(
        &self,
        session: &Session,
        issue_key: &str,
        action_id: &str,
    ) -> TrackerResult<()> {
        self.inner()
            .apply_transition(session, issue_key, action_id)
            .await
    }

    async fn list_versions(
        &self,
        session: &Session,
        project_key: &str,
    ) -> TrackerResult<Vec<RemoteVersion>> {
        self.inner().list_versions(session, project_key).await
    }

    async fn add_version(
        &self,
        session: &Session,
        project_key: &str,
        name: &str,
    ) -> TrackerResult<RemoteVersion> {
        self.inner().add_version(session, project_key, name).await
    }

    async fn release_version(
        &self,
        session: &Session,
        project_key: &str,
        version: &RemoteVersion,
        release_date: NaiveDate,
    ) -> TrackerResult<()> {
        self.inner()
            .release_version(session, project_key, version, release_date)
            .await
    }

    async fn close(&self, session: &Session) -> TrackerResult<()> {
        self.inner().close(session).await
    }
}

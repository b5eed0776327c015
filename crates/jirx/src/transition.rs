//! 🔀 Transitions — push every issue in the release through one named workflow action.
//!
//! Matching is by exact action name. Case matters: "Close Issue" and "close issue" are
//! different actions as far as we are concerned, because they can be in JIRA too.
//!
//! Failure isolation is per issue. An issue with no actions, no matching action, or a
//! tracker that errored while we were asking about it gets one warning and we move on
//! to the next. One stubborn ticket does not get to hold the whole release hostage.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{TrackerError, TrackerResult};
use crate::model::{Issue, Session};
use crate::query::DEFAULT_TRANSITION_JQL;
use crate::tracker::TrackerClient;

fn default_transition_jql() -> String {
    DEFAULT_TRANSITION_JQL.to_string()
}

/// 🔀 `[transition]` config section.
#[derive(Debug, Deserialize, Clone)]
pub struct TransitionConfig {
    /// Exact workflow action name, e.g. "Close Issue". Only the transition goal needs it.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_transition_jql")]
    pub jql_template: String,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            name: None,
            jql_template: default_transition_jql(),
        }
    }
}

/// ⚠️ Why one issue was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionWarning {
    NoActions { issue_key: String },
    NoMatchingAction { issue_key: String, transition: String },
    RemoteFailure { issue_key: String, reason: String },
}

impl TransitionWarning {
    pub fn issue_key(&self) -> &str {
        match self {
            Self::NoActions { issue_key }
            | Self::NoMatchingAction { issue_key, .. }
            | Self::RemoteFailure { issue_key, .. } => issue_key,
        }
    }
}

impl std::fmt::Display for TransitionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActions { issue_key } => write!(f, "No transitions found for issue {issue_key}"),
            Self::NoMatchingAction {
                issue_key,
                transition,
            } => write!(
                f,
                "No transition with name '{transition}' found for issue {issue_key}"
            ),
            Self::RemoteFailure { issue_key, reason } => {
                write!(f, "Could not transition issue {issue_key}: {reason}")
            }
        }
    }
}

/// 📋 What happened to each issue, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    pub transition: String,
    pub transitioned: Vec<String>,
    pub warnings: Vec<TransitionWarning>,
}

impl TransitionReport {
    pub fn attempted(&self) -> usize {
        self.transitioned.len() + self.warnings.len()
    }
}

/// 🚀 Apply `transition_name` to every issue that offers it.
///
/// A blank transition name is a configuration problem and is reported before any
/// remote call is made.
pub async fn transition_issues<C>(
    client: &C,
    session: &Session,
    issues: &[Issue],
    transition_name: &str,
) -> TrackerResult<TransitionReport>
where
    C: TrackerClient + ?Sized,
{
    if transition_name.trim().is_empty() {
        return Err(TrackerError::Configuration(
            "no transition name configured".to_string(),
        ));
    }

    let mut report = TransitionReport {
        transition: transition_name.to_string(),
        ..TransitionReport::default()
    };

    for issue in issues {
        match transition_one(client, session, &issue.key, transition_name).await {
            Ok(None) => {
                info!("✅ {} → {transition_name}", issue.key);
                report.transitioned.push(issue.key.clone());
            }
            Ok(Some(warning)) | Err(warning) => {
                warn!("⚠️ {warning}");
                report.warnings.push(warning);
            }
        }
    }
    Ok(report)
}

// -- Ok(None) transitioned, Ok(Some(_)) skipped, Err(_) tracker said no
async fn transition_one<C>(
    client: &C,
    session: &Session,
    issue_key: &str,
    transition_name: &str,
) -> Result<Option<TransitionWarning>, TransitionWarning>
where
    C: TrackerClient + ?Sized,
{
    let remote_failure = |e: TrackerError| TransitionWarning::RemoteFailure {
        issue_key: issue_key.to_string(),
        reason: e.to_string(),
    };

    let actions = client
        .list_workflow_actions(session, issue_key)
        .await
        .map_err(remote_failure)?;
    if actions.is_empty() {
        return Ok(Some(TransitionWarning::NoActions {
            issue_key: issue_key.to_string(),
        }));
    }

    let Some(action) = actions.iter().find(|a| a.name == transition_name) else {
        return Ok(Some(TransitionWarning::NoMatchingAction {
            issue_key: issue_key.to_string(),
            transition: transition_name.to_string(),
        }));
    };

    client
        .apply_transition(session, issue_key, &action.id)
        .await
        .map_err(remote_failure)?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::WorkflowAction;
    use crate::tracker::{InMemoryTracker, InMemoryTrackerConfig};

    fn action(id: &str, name: &str) -> WorkflowAction {
        WorkflowAction {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn issues(keys: &[&str]) -> Vec<Issue> {
        keys.iter().map(|k| Issue::stub(*k, "Bug")).collect()
    }

    #[tokio::test]
    async fn the_one_where_only_the_exact_name_is_applied() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig {
            actions: BTreeMap::from([(
                "ABC-1".to_string(),
                vec![action("2", "Close Issue"), action("3", "Reopen Issue")],
            )]),
            ..InMemoryTrackerConfig::default()
        });
        let session = tracker.authenticate().await?;
        let report = transition_issues(&tracker, &session, &issues(&["ABC-1"]), "Close Issue").await?;

        assert_eq!(report.transitioned, vec!["ABC-1"]);
        assert!(report.warnings.is_empty());
        assert_eq!(
            tracker.call_log().await.transitions,
            vec![("ABC-1".to_string(), "2".to_string())]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_no_match_means_one_warning_and_no_call() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig {
            actions: BTreeMap::from([("ABC-1".to_string(), vec![action("3", "Reopen Issue")])]),
            ..InMemoryTrackerConfig::default()
        });
        let session = tracker.authenticate().await?;
        let report = transition_issues(&tracker, &session, &issues(&["ABC-1"]), "Close Issue").await?;

        assert_eq!(
            report.warnings,
            vec![TransitionWarning::NoMatchingAction {
                issue_key: "ABC-1".to_string(),
                transition: "Close Issue".to_string(),
            }]
        );
        assert_eq!(
            report.warnings[0].to_string(),
            "No transition with name 'Close Issue' found for issue ABC-1"
        );
        assert!(tracker.call_log().await.transitions.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_case_still_matters() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig {
            actions: BTreeMap::from([("ABC-1".to_string(), vec![action("2", "close issue")])]),
            ..InMemoryTrackerConfig::default()
        });
        let session = tracker.authenticate().await?;
        let report = transition_issues(&tracker, &session, &issues(&["ABC-1"]), "Close Issue").await?;
        assert!(report.transitioned.is_empty());
        assert_eq!(report.warnings.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_one_cursed_issue_does_not_stop_the_rest() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig {
            actions: BTreeMap::from([
                ("ABC-1".to_string(), vec![action("2", "Close Issue")]),
                ("ABC-3".to_string(), vec![action("2", "Close Issue")]),
            ]),
            broken_issues: vec!["ABC-2".to_string()],
            ..InMemoryTrackerConfig::default()
        });
        let session = tracker.authenticate().await?;
        let report = transition_issues(
            &tracker,
            &session,
            &issues(&["ABC-1", "ABC-2", "ABC-3", "ABC-4"]),
            "Close Issue",
        )
        .await?;

        assert_eq!(report.transitioned, vec!["ABC-1", "ABC-3"]);
        assert_eq!(report.attempted(), 4);
        let skipped: Vec<&str> = report.warnings.iter().map(|w| w.issue_key()).collect();
        assert_eq!(skipped, vec!["ABC-2", "ABC-4"]);
        assert!(matches!(report.warnings[0], TransitionWarning::RemoteFailure { .. }));
        assert_eq!(
            report.warnings[1].to_string(),
            "No transitions found for issue ABC-4"
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_blank_name_is_a_configuration_error() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig::default());
        let session = tracker.authenticate().await?;
        let err = transition_issues(&tracker, &session, &issues(&["ABC-1"]), "  ")
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(tracker.call_log().await.transitions.is_empty());
        Ok(())
    }
}

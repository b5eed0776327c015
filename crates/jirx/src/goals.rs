//! 🎬 *[INT. CI RUNNER — the release job has started]*
//! 🎬 "One invocation. One goal. One session."
//! 🎬 *[the session is opened. the session WILL be closed.]* 🦆
//!
//! 📦 The goal runner — part stage manager, part bouncer.
//!
//! Every invocation runs exactly one [`Goal`]. The runner:
//! 1. honors `skip` without touching the tracker,
//! 2. checks the goal's own configuration before opening anything,
//! 3. authenticates once and hands the same `&Session` to every step,
//! 4. closes the session exactly once, whether the goal succeeded or blew up.
//!
//! A close failure is logged and swallowed; it never replaces the goal's own result.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::app_config::AppConfig;
use crate::classify::ClassifiedIssues;
use crate::error::TrackerError;
use crate::fetcher::fetch_issues;
use crate::model::{Issue, RemoteVersion, Session};
use crate::query::{ReleaseVersionQuery, normalize_version};
use crate::release_notes::{
    EmitterBackend, ReleaseNoteEmitter, ReleaseNotesContext, append_release_notes,
};
use crate::report::{render_report, resolve_columns};
use crate::tracker::{TrackerBackend, TrackerClient};
use crate::transition::{TransitionReport, transition_issues};
use crate::versions::{create_version, release_version};

/// 🎯 The five things jirx knows how to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    ReleaseNotes,
    Report,
    Transition,
    ReleaseVersion,
    CreateVersion,
}

impl Goal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReleaseNotes => "release-notes",
            Self::Report => "report",
            Self::Transition => "transition",
            Self::ReleaseVersion => "release-version",
            Self::CreateVersion => "create-version",
        }
    }
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 📋 What a goal produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalOutcome {
    ReleaseNotes {
        target_file: PathBuf,
        issue_count: usize,
    },
    Report {
        rendered: String,
        target_file: Option<PathBuf>,
        issue_count: usize,
    },
    Transition(TransitionReport),
    VersionReleased(Option<RemoteVersion>),
    VersionCreated(Option<RemoteVersion>),
    Skipped {
        goal: Goal,
        reason: String,
    },
}

/// 🎬 Runs one goal against one tracker session.
#[derive(Debug)]
pub struct GoalRunner {
    app_config: AppConfig,
}

impl GoalRunner {
    pub fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🚀 Build the configured tracker and run `goal` against it.
    pub async fn run(&self, goal: Goal) -> Result<GoalOutcome> {
        let tracker = TrackerBackend::from_config(&self.app_config.tracker)?;
        self.run_with(&tracker, goal).await
    }

    /// 🔒 Run `goal` against an already-built tracker. The session lives and dies in here.
    pub async fn run_with<C>(&self, tracker: &C, goal: Goal) -> Result<GoalOutcome>
    where
        C: TrackerClient + ?Sized,
    {
        if let Some(skipped) = self.skipped(goal) {
            return Ok(skipped);
        }

        let session = tracker.authenticate().await.with_context(|| {
            format!("💀 Could not open a session with {}", tracker.base_url())
        })?;
        info!("🔒 Session open against {}", session.server);

        let outcome = self.execute(tracker, &session, goal).await;

        if let Err(e) = tracker.close(&session).await {
            error!("💀 Failed to close the tracker session: {e}");
        }

        match outcome {
            Err(e) if is_configuration(&e) => Ok(self.skip(goal, format!("{e:#}"))),
            other => other,
        }
    }

    // -- skip flag first, then whatever the goal itself needs before we connect
    fn skipped(&self, goal: Goal) -> Option<GoalOutcome> {
        if self.app_config.skip {
            return Some(self.skip(goal, "skip = true".to_string()));
        }
        self.preflight(goal)
            .err()
            .map(|e| self.skip(goal, e.to_string()))
    }

    fn preflight(&self, goal: Goal) -> Result<(), TrackerError> {
        match goal {
            Goal::Transition => {
                let named = self
                    .app_config
                    .transition
                    .name
                    .as_deref()
                    .is_some_and(|n| !n.trim().is_empty());
                if !named {
                    return Err(TrackerError::Configuration(
                        "no transition name configured".to_string(),
                    ));
                }
            }
            Goal::Report => {
                resolve_columns(&self.app_config.report.columns)?;
            }
            Goal::CreateVersion => {
                if normalize_version(self.development_version()).trim().is_empty() {
                    return Err(TrackerError::Configuration(
                        "no development version configured".to_string(),
                    ));
                }
            }
            Goal::ReleaseNotes | Goal::ReleaseVersion => {}
        }
        Ok(())
    }

    fn skip(&self, goal: Goal, reason: String) -> GoalOutcome {
        warn!("⏭️ Skipping {goal}: {reason}");
        GoalOutcome::Skipped { goal, reason }
    }

    fn development_version(&self) -> &str {
        self.app_config
            .versions
            .development_version
            .as_deref()
            .unwrap_or(self.app_config.release_version.as_str())
    }

    async fn execute<C>(&self, tracker: &C, session: &Session, goal: Goal) -> Result<GoalOutcome>
    where
        C: TrackerClient + ?Sized,
    {
        info!("🎯 Running goal {goal}");
        match goal {
            Goal::ReleaseNotes => self.release_notes(tracker, session).await,
            Goal::Report => self.report(tracker, session).await,
            Goal::Transition => self.transition(tracker, session).await,
            Goal::ReleaseVersion => {
                let released = release_version(
                    tracker,
                    session,
                    &self.app_config.project_key,
                    &self.app_config.release_version,
                    &self.app_config.versions,
                )
                .await
                .context("💀 Could not release the version")?;
                Ok(GoalOutcome::VersionReleased(released))
            }
            Goal::CreateVersion => {
                let created = create_version(
                    tracker,
                    session,
                    &self.app_config.project_key,
                    self.development_version(),
                )
                .await
                .context("💀 Could not create the development version")?;
                Ok(GoalOutcome::VersionCreated(created))
            }
        }
    }

    fn release_query(&self, template: &str) -> ReleaseVersionQuery {
        ReleaseVersionQuery::new(
            &self.app_config.project_key,
            &self.app_config.release_version,
            template,
        )
    }

    async fn download<C>(
        &self,
        tracker: &C,
        session: &Session,
        query: &ReleaseVersionQuery,
    ) -> Result<Vec<Issue>>
    where
        C: TrackerClient + ?Sized,
    {
        fetch_issues(tracker, session, query, self.app_config.query.max_issues)
            .await
            .with_context(|| format!("💀 Could not download issues for {}", query.project_key))
    }

    async fn release_notes<C>(&self, tracker: &C, session: &Session) -> Result<GoalOutcome>
    where
        C: TrackerClient + ?Sized,
    {
        let notes_config = &self.app_config.release_notes;
        let query = self.release_query(&self.app_config.query.jql_template);
        let issues = self.download(tracker, session, &query).await?;
        let classified = ClassifiedIssues::classify(issues);

        let context = ReleaseNotesContext::assemble(
            &classified,
            tracker.base_url(),
            &query.project_key,
            &query.normalized_version,
            &notes_config.announce_parameters,
        );
        let content = EmitterBackend::from_format(notes_config.format).render(&context)?;
        append_release_notes(
            &notes_config.target_file,
            notes_config.before_text.as_deref(),
            &content,
            notes_config.after_text.as_deref(),
        )
        .await?;

        info!(
            "📰 Release notes for {} issue(s) written to {}",
            classified.len(),
            notes_config.target_file.display()
        );
        Ok(GoalOutcome::ReleaseNotes {
            target_file: notes_config.target_file.clone(),
            issue_count: classified.len(),
        })
    }

    async fn report<C>(&self, tracker: &C, session: &Session) -> Result<GoalOutcome>
    where
        C: TrackerClient + ?Sized,
    {
        let report_config = &self.app_config.report;
        let columns = resolve_columns(&report_config.columns)?;
        let query = self.release_query(&self.app_config.query.jql_template);
        let issues = self.download(tracker, session, &query).await?;

        let title = report_config.title.clone().unwrap_or_else(|| {
            format!("{} {} issues", query.project_key, query.normalized_version)
        });
        let rendered = render_report(&title, &columns, &issues);

        if let Some(path) = &report_config.target_file {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("💀 Could not create directory {}", parent.display())
                })?;
            }
            tokio::fs::write(path, &rendered)
                .await
                .with_context(|| format!("💀 Could not write report to {}", path.display()))?;
            info!("📊 Report written to {}", path.display());
        }

        Ok(GoalOutcome::Report {
            rendered,
            target_file: report_config.target_file.clone(),
            issue_count: issues.len(),
        })
    }

    async fn transition<C>(&self, tracker: &C, session: &Session) -> Result<GoalOutcome>
    where
        C: TrackerClient + ?Sized,
    {
        let transition_config = &self.app_config.transition;
        let name = transition_config.name.as_deref().unwrap_or_default();
        let query = self.release_query(&transition_config.jql_template);
        let issues = self.download(tracker, session, &query).await?;

        let report = transition_issues(tracker, session, &issues, name).await?;
        info!(
            "🔀 {} of {} issue(s) moved through '{}'",
            report.transitioned.len(),
            report.attempted(),
            report.transition
        );
        Ok(GoalOutcome::Transition(report))
    }
}

fn is_configuration(err: &anyhow::Error) -> bool {
    err.downcast_ref::<TrackerError>()
        .is_some_and(TrackerError::is_configuration)
}

//! 🎫 jirx — ask the tracker what shipped, then write it down.
//!
//! Release notes, issue reports, bulk workflow transitions and version housekeeping,
//! against either the REST flavor of JIRA or the legacy RPC one.

pub mod app_config;
pub mod classify;
pub mod error;
pub mod fetcher;
pub mod goals;
pub mod model;
pub mod query;
pub mod release_notes;
pub mod report;
pub mod tracker;
pub mod transition;
pub mod versions;

use anyhow::{Context, Result};

pub use crate::app_config::{AppConfig, ConfigOverrides, TrackerConfig, load_config};
pub use crate::error::{TrackerError, TrackerResult};
pub use crate::goals::{Goal, GoalOutcome, GoalRunner};

/// 🚀 Run one goal with the given config. Load it, do it.
pub async fn run(app_config: AppConfig, goal: Goal) -> Result<GoalOutcome> {
    GoalRunner::new(app_config)
        .run(goal)
        .await
        .with_context(|| format!("💀 Goal '{goal}' did not make it"))
}

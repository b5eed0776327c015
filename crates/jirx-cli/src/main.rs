//! 🚀 jirx-cli — the front door, the bouncer, the maitre d' of jirx.
//!
//! 🎬 *[narrator voice]* "It all started with a release nobody wrote notes for..."
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, and then lets the library do the heavy lifting.
//! Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jirx::{ConfigOverrides, Goal, GoalOutcome};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 🎫 Release notes, reports, transitions and versions, straight from the tracker.
#[derive(Debug, Parser)]
#[command(name = "jirx", version, about)]
struct Cli {
    /// TOML config file. Ignored when it does not exist; `JIRX_*` env vars still apply.
    #[arg(short, long, default_value = "jirx.toml")]
    config: PathBuf,

    /// Overrides `project_key`.
    #[arg(long, global = true)]
    project_key: Option<String>,

    /// Overrides `release_version`, e.g. `1.2-SNAPSHOT`.
    #[arg(long, global = true)]
    release_version: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 📝 Append the release notes to the configured target file.
    ReleaseNotes,
    /// 📊 Render the issue table for the release.
    Report,
    /// 🔀 Push every issue of the release through one workflow action.
    Transition {
        /// Exact workflow action name, e.g. "Close Issue".
        #[arg(long)]
        name: Option<String>,
    },
    /// ✅ Mark the shipped version as released, today.
    ReleaseVersion,
    /// ➕ Create the next development version.
    CreateVersion,
}

impl Command {
    fn goal(&self) -> Goal {
        match self {
            Self::ReleaseNotes => Goal::ReleaseNotes,
            Self::Report => Goal::Report,
            Self::Transition { .. } => Goal::Transition,
            Self::ReleaseVersion => Goal::ReleaseVersion,
            Self::CreateVersion => Goal::CreateVersion,
        }
    }
}

/// 🚀 main() — where it all begins. The genesis. The "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args
/// 3. Load config (the moment of truth)
/// 4. Run the goal (send it and pray 🙏)
/// 5. Handle errors (cry)
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 📡 println! debugging is a lifestyle choice we're trying to move past
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let goal = cli.command.goal();

    // 🔒 Only hand the file to figment if it is actually there
    let config_file = cli.config.as_path();
    let config_file_which_is_validated_to_exist = match config_file.try_exists()
        .context(format!("💀 Couldn't tell whether the configuration file exists. Maybe it's a permissions thing, maybe it's a pwd/cwd thing. Was checking here: '{}'", config_file.display()))?
    {
        true => Some(config_file),
        false => None, // 💤 env vars it is
    };

    let overrides = ConfigOverrides {
        project_key: cli.project_key,
        release_version: cli.release_version,
        transition_name: match cli.command {
            Command::Transition { name } => name,
            _ => None,
        },
    };

    let app_config = jirx::load_config(config_file_which_is_validated_to_exist, &overrides)
        .context("💀 In jirx-cli, main, we couldn't load the config. Take a look at the file and the JIRX_* env vars, make sure you didn't forget something obvious")?;

    match jirx::run(app_config, goal).await {
        Ok(outcome) => {
            report_outcome(outcome);
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            // -- 📡 if it smells like a connection problem, it's probably a connection problem
            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like the tracker isn't reachable. \
                    Double-check the tracker url, your VPN, and whether JIRA is having one of its days. ☕"
                );
            }

            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }
}

fn report_outcome(outcome: GoalOutcome) {
    match outcome {
        GoalOutcome::ReleaseNotes {
            target_file,
            issue_count,
        } => info!(
            "📝 Release notes for {issue_count} issue(s) appended to {}",
            target_file.display()
        ),
        GoalOutcome::Report {
            rendered,
            target_file: None,
            ..
        } => print!("{rendered}"),
        GoalOutcome::Report {
            target_file: Some(target_file),
            issue_count,
            ..
        } => info!(
            "📊 Report of {issue_count} issue(s) written to {}",
            target_file.display()
        ),
        GoalOutcome::Transition(report) => info!(
            "🔀 '{}': {} of {} issue(s) transitioned, {} warning(s)",
            report.transition,
            report.transitioned.len(),
            report.attempted(),
            report.warnings.len()
        ),
        GoalOutcome::VersionReleased(Some(version)) => {
            info!("✅ Released version {}", version.name)
        }
        GoalOutcome::VersionReleased(None) => warn!("⚠️ No version was released"),
        GoalOutcome::VersionCreated(Some(version)) => {
            info!("✅ Created version {}", version.name)
        }
        GoalOutcome::VersionCreated(None) => info!("💤 No version needed creating"),
        GoalOutcome::Skipped { goal, reason } => info!("⏭️ {goal} skipped: {reason}"),
    }
}

//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every release manager at 4:59pm on a Friday 🦆
//!
//! 🏗️ Three layers, later wins:
//! 1. `JIRX_*` environment variables (nested keys split on `__`, so
//!    `JIRX_TRACKER__REST__PASSWORD` lands in `tracker.rest.password`),
//! 2. the TOML file, when one is given,
//! 3. command-line overrides.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::query::QueryConfig;
use crate::release_notes::ReleaseNotesConfig;
use crate::report::ReportConfig;
use crate::tracker::{InMemoryTrackerConfig, LegacyTrackerConfig, RestTrackerConfig};
use crate::transition::TransitionConfig;
use crate::versions::VersionsConfig;

/// 📡 Which tracker to talk to. One lowercase table per flavor: `[tracker.rest]`,
/// `[tracker.legacy]`, `[tracker.inmemory]`.
///
/// The env provider lowercases every key, so the tags have to be lowercase too or
/// `JIRX_TRACKER__REST__PASSWORD` lands in a table nobody reads.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum TrackerConfig {
    Rest(RestTrackerConfig),
    Legacy(LegacyTrackerConfig),
    InMemory(InMemoryTrackerConfig),
}

/// 📦 Everything one invocation needs to know.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub project_key: String,
    /// Raw, e.g. `1.2-SNAPSHOT`. Normalized where it is used.
    pub release_version: String,
    /// 🛑 Do nothing, successfully.
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub release_notes: ReleaseNotesConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub transition: TransitionConfig,
    #[serde(default)]
    pub versions: VersionsConfig,
}

impl AppConfig {
    fn validate(self) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !self.project_key.trim().is_empty(),
            "💀 project_key is empty. Which project are we releasing, exactly?"
        );
        anyhow::ensure!(
            self.query.max_issues > 0,
            "💀 query.max_issues must be positive. Asking the tracker for zero issues is a very expensive no-op."
        );
        Ok(self)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(tracker: TrackerConfig) -> Self {
        Self {
            tracker,
            project_key: "ABC".to_string(),
            release_version: "1.0-SNAPSHOT".to_string(),
            skip: false,
            query: QueryConfig::default(),
            release_notes: ReleaseNotesConfig::default(),
            report: ReportConfig::default(),
            transition: TransitionConfig::default(),
            versions: VersionsConfig::default(),
        }
    }
}

/// 🎛️ Command-line values that beat both the environment and the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project_key: Option<String>,
    pub release_version: Option<String>,
    pub transition_name: Option<String>,
}

/// 🚀 Load the config — env vars, then the optional TOML file, then overrides.
///
/// - `config_file_name` is `None` → env vars (and overrides) only.
/// - `config_file_name` is `Some` → the file is merged over the env. TOML wins on conflicts.
pub fn load_config(
    config_file_name: Option<&Path>,
    overrides: &ConfigOverrides,
) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("JIRX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let mut config = config;
    for (key, value) in [
        ("project_key", &overrides.project_key),
        ("release_version", &overrides.release_version),
        ("transition.name", &overrides.transition_name),
    ] {
        if let Some(value) = value {
            config = config.merge(Serialized::default(key, value));
        }
    }

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (JIRX_*). \
             The file exists in our hearts, but apparently not on disk, or not in this shape.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (JIRX_*). \
                 No file was provided — this one's all on the environment."
            .to_string(),
    };

    config.extract::<AppConfig>().context(context_msg)?.validate()
}

//! 📰 Release notes — the parameter set, the emitters, and the file they end up in.
//!
//! 🧠 Same shape as everything else that comes in flavors around here:
//! trait → concrete impls → enum dispatcher → resolved from config.
//!
//! - **Text** (`TextEmitter`): one section per non-empty category, one line per issue.
//!   Good enough to paste into a release email without anyone noticing.
//! - **JSON** (`JsonEmitter`): the whole parameter set, pretty-printed. For when the
//!   release notes are rendered by some other tool with stronger opinions about fonts.
//!
//! Output is appended, never truncated: before-text, content, after-text, one line each.
//! Running the goal twice gives you two copies. That is the contract, not a bug.
//!
//! 🦆

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::classify::{Category, ClassifiedIssues};
use crate::model::Issue;

fn default_target_file() -> PathBuf {
    PathBuf::from("target/releaseNotes.txt")
}

/// 🎨 Which emitter renders the notes.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseNotesFormat {
    #[default]
    Text,
    Json,
}

/// 📰 `[release_notes]` config section.
#[derive(Debug, Deserialize, Clone)]
pub struct ReleaseNotesConfig {
    #[serde(default = "default_target_file")]
    pub target_file: PathBuf,
    #[serde(default)]
    pub format: ReleaseNotesFormat,
    #[serde(default)]
    pub before_text: Option<String>,
    #[serde(default)]
    pub after_text: Option<String>,
    /// Free-form values handed to the emitter untouched.
    #[serde(default)]
    pub announce_parameters: BTreeMap<String, String>,
}

impl Default for ReleaseNotesConfig {
    fn default() -> Self {
        Self {
            target_file: default_target_file(),
            format: ReleaseNotesFormat::default(),
            before_text: None,
            after_text: None,
            announce_parameters: BTreeMap::new(),
        }
    }
}

/// 📦 Exactly what an emitter gets to work with. Nothing more, nothing less.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseNotesContext {
    /// add, then fix, then update.
    pub issues: Vec<Issue>,
    /// `add` / `fix` / `update` → issues. All three keys always present.
    pub issues_map: BTreeMap<String, Vec<Issue>>,
    pub jira_url: String,
    pub project_key: String,
    /// Normalized.
    pub release_version: String,
    pub announce_parameters: BTreeMap<String, String>,
}

impl ReleaseNotesContext {
    pub fn assemble(
        classified: &ClassifiedIssues,
        jira_url: &str,
        project_key: &str,
        release_version: &str,
        announce_parameters: &BTreeMap<String, String>,
    ) -> Self {
        Self {
            issues: classified.flat(),
            issues_map: classified.grouped(),
            jira_url: jira_url.to_string(),
            project_key: project_key.to_string(),
            release_version: release_version.to_string(),
            announce_parameters: announce_parameters.clone(),
        }
    }

    fn section(&self, category: Category) -> &[Issue] {
        self.issues_map
            .get(category.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

// ===== Trait =====

/// 🖨️ Turns a [`ReleaseNotesContext`] into a document.
pub trait ReleaseNoteEmitter: std::fmt::Debug {
    fn render(&self, context: &ReleaseNotesContext) -> Result<String>;
}

// ===== Text Emitter =====

/// 📝 Plain text, sectioned by category.
#[derive(Debug, Clone, Copy)]
pub struct TextEmitter;

impl ReleaseNoteEmitter for TextEmitter {
    fn render(&self, context: &ReleaseNotesContext) -> Result<String> {
        let mut out = String::with_capacity(64 + context.issues.len() * 80);
        writeln!(
            out,
            "Release Notes - {} - Version {}",
            context.project_key, context.release_version
        )?;

        if context.issues.is_empty() {
            writeln!(out)?;
            writeln!(out, "No issues found for this release.")?;
            return Ok(out);
        }

        for category in Category::ALL {
            let section = context.section(category);
            if section.is_empty() {
                continue;
            }
            writeln!(out)?;
            writeln!(out, "** {}", category.heading())?;
            for issue in section {
                let line = format!(
                    "    * [{}] {}",
                    issue.key,
                    issue.summary.as_deref().unwrap_or_default()
                );
                writeln!(out, "{}", line.trim_end())?;
            }
        }
        Ok(out)
    }
}

// ===== JSON Emitter =====

/// 📦 The parameter set as pretty JSON, for external template engines.
#[derive(Debug, Clone, Copy)]
pub struct JsonEmitter;

impl ReleaseNoteEmitter for JsonEmitter {
    fn render(&self, context: &ReleaseNotesContext) -> Result<String> {
        serde_json::to_string_pretty(context)
            .context("💀 The release notes refused to become JSON. Serde has spoken.")
    }
}

// ===== Dispatcher =====

/// 🎭 Emitter chosen by config.
#[derive(Debug, Clone, Copy)]
pub enum EmitterBackend {
    Text(TextEmitter),
    Json(JsonEmitter),
}

impl EmitterBackend {
    pub fn from_format(format: ReleaseNotesFormat) -> Self {
        match format {
            ReleaseNotesFormat::Text => Self::Text(TextEmitter),
            ReleaseNotesFormat::Json => Self::Json(JsonEmitter),
        }
    }
}

impl ReleaseNoteEmitter for EmitterBackend {
    fn render(&self, context: &ReleaseNotesContext) -> Result<String> {
        match self {
            Self::Text(e) => e.render(context),
            Self::Json(e) => e.render(context),
        }
    }
}

/// 💾 Append `before`, `content`, `after` to `path`, each on its own line.
///
/// Parent directories are created. Existing content is kept.
pub async fn append_release_notes(
    path: &Path,
    before_text: Option<&str>,
    content: &str,
    after_text: Option<&str>,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("💀 Could not create directory {}", parent.display()))?;
    }

    let mut document = String::new();
    for part in [before_text, Some(content), after_text].into_iter().flatten() {
        document.push_str(part);
        document.push('\n');
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("💀 Could not open {} for appending", path.display()))?;
    file.write_all(document.as_bytes())
        .await
        .with_context(|| format!("💀 Could not write release notes to {}", path.display()))?;
    file.flush().await?;
    debug!("💾 Appended {} bytes to {}", document.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn the_release() -> ClassifiedIssues {
        let mut bug = Issue::stub("ABC-12", "Bug");
        bug.summary = Some("Crash on empty config".to_string());
        let mut feature = Issue::stub("ABC-3", "New Feature");
        feature.summary = Some("Dark mode".to_string());
        let untitled = Issue::stub("ABC-1", "Bug");
        ClassifiedIssues::classify(vec![bug, feature, untitled])
    }

    fn context_for(classified: &ClassifiedIssues) -> ReleaseNotesContext {
        ReleaseNotesContext::assemble(
            classified,
            "https://jira.example.com",
            "ABC",
            "1.0",
            &BTreeMap::from([("codename".to_string(), "Duck".to_string())]),
        )
    }

    #[test]
    fn the_one_where_text_notes_get_one_section_per_category() -> Result<()> {
        let rendered = TextEmitter.render(&context_for(&the_release()))?;
        assert_eq!(
            rendered,
            "Release Notes - ABC - Version 1.0\n\
             \n\
             ** New Features\n\
             \x20   * [ABC-3] Dark mode\n\
             \n\
             ** Bug Fixes\n\
             \x20   * [ABC-1]\n\
             \x20   * [ABC-12] Crash on empty config\n"
        );
        Ok(())
    }

    #[test]
    fn the_one_where_an_empty_release_still_says_something() -> Result<()> {
        let rendered = TextEmitter.render(&context_for(&ClassifiedIssues::default()))?;
        assert!(rendered.ends_with("No issues found for this release.\n"));
        Ok(())
    }

    #[test]
    fn the_one_where_json_carries_the_whole_parameter_set() -> Result<()> {
        let backend = EmitterBackend::from_format(ReleaseNotesFormat::Json);
        let rendered = backend.render(&context_for(&ClassifiedIssues::default()))?;
        let parsed: serde_json::Value = serde_json::from_str(&rendered)?;
        assert_eq!(parsed["jira_url"], "https://jira.example.com");
        assert_eq!(parsed["announce_parameters"]["codename"], "Duck");
        for bucket in ["add", "fix", "update"] {
            assert_eq!(parsed["issues_map"][bucket], serde_json::json!([]));
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_notes_are_appended_not_overwritten() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/deeper/releaseNotes.txt");

        append_release_notes(&path, Some("Hello team"), "the notes", Some("Bye")).await?;
        append_release_notes(&path, None, "again", None).await?;

        let written = tokio::fs::read_to_string(&path).await?;
        assert_eq!(written, "Hello team\nthe notes\nBye\nagain\n");
        Ok(())
    }
}

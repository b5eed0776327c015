//! 📊 The issue report — a table so comfy it has lumbar support.
//!
//! Columns come from a comma-separated list in config. Names are matched
//! case-insensitively with spaces ignored, so `Fix Version`, `fixversion` and
//! `FixVersions` all land on the same column. Unknown names are dropped with a warning;
//! if nothing survives, there is no report to render and we say so.

use std::path::PathBuf;

use comfy_table::{ContentArrangement, Table, presets::ASCII_MARKDOWN};
use serde::Deserialize;
use tracing::warn;

use crate::error::{TrackerError, TrackerResult};
use crate::model::Issue;

pub const DEFAULT_REPORT_COLUMNS: &str = "Key,Summary,Status,Resolution,Assignee";

fn default_columns() -> String {
    DEFAULT_REPORT_COLUMNS.to_string()
}

/// 📊 `[report]` config section.
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_columns")]
    pub columns: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Printed to stdout when absent.
    #[serde(default)]
    pub target_file: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            title: None,
            target_file: None,
        }
    }
}

/// 🏛️ One column of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportColumn {
    Id,
    Key,
    Summary,
    Status,
    Resolution,
    Priority,
    Type,
    Assignee,
    Reporter,
    Created,
    Updated,
    Components,
    FixVersions,
}

impl ReportColumn {
    pub fn parse(name: &str) -> Option<Self> {
        let squashed: String = name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        let column = match squashed.as_str() {
            "id" => Self::Id,
            "key" => Self::Key,
            "summary" => Self::Summary,
            "status" => Self::Status,
            "resolution" => Self::Resolution,
            "priority" => Self::Priority,
            "type" => Self::Type,
            "assignee" => Self::Assignee,
            "reporter" => Self::Reporter,
            "created" => Self::Created,
            "updated" => Self::Updated,
            "component" | "components" => Self::Components,
            "fixversion" | "fixversions" => Self::FixVersions,
            _ => return None,
        };
        Some(column)
    }

    pub fn header(&self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::Key => "Key",
            Self::Summary => "Summary",
            Self::Status => "Status",
            Self::Resolution => "Resolution",
            Self::Priority => "Priority",
            Self::Type => "Type",
            Self::Assignee => "Assignee",
            Self::Reporter => "Reporter",
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Components => "Components",
            Self::FixVersions => "Fix Versions",
        }
    }

    pub fn cell(&self, issue: &Issue) -> String {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let date = |d: &Option<chrono::DateTime<chrono::Utc>>| {
            d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
        };
        match self {
            Self::Id => issue.id.clone(),
            Self::Key => issue.key.clone(),
            Self::Summary => text(&issue.summary),
            Self::Status => text(&issue.status),
            // -- JIRA shows "Unresolved" for the absence of a resolution
            Self::Resolution => issue
                .resolution
                .clone()
                .unwrap_or_else(|| "Unresolved".to_string()),
            Self::Priority => text(&issue.priority),
            Self::Type => issue.issue_type.clone(),
            Self::Assignee => text(&issue.assignee),
            Self::Reporter => text(&issue.reporter),
            Self::Created => date(&issue.created),
            Self::Updated => date(&issue.updated),
            Self::Components => issue.components.join(", "),
            Self::FixVersions => issue.fix_versions.join(", "),
        }
    }
}

/// 🔎 Parse the configured column list. Fails only when no column is valid.
pub fn resolve_columns(configured: &str) -> TrackerResult<Vec<ReportColumn>> {
    let mut columns = Vec::new();
    for name in configured.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match ReportColumn::parse(name) {
            Some(column) => columns.push(column),
            None => warn!("⚠️ Ignoring unknown report column '{name}'"),
        }
    }
    if columns.is_empty() {
        return Err(TrackerError::Configuration(format!(
            "none of the configured report columns '{configured}' are valid"
        )));
    }
    Ok(columns)
}

/// 🖨️ Title, blank line, table. Or title and a shrug when there is nothing to tabulate.
pub fn render_report(title: &str, columns: &[ReportColumn], issues: &[Issue]) -> String {
    if issues.is_empty() {
        return format!("{title}\n\nNo issues found.\n");
    }

    let mut table = Table::new();
    table
        .load_preset(ASCII_MARKDOWN)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(columns.iter().map(ReportColumn::header));
    for issue in issues {
        table.add_row(columns.iter().map(|c| c.cell(issue)));
    }
    format!("{title}\n\n{table}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_column_names_are_forgiving_but_not_psychic() -> anyhow::Result<()> {
        let columns = resolve_columns("key, Fix Version ,SUMMARY,Vibes,,components")?;
        assert_eq!(
            columns,
            vec![
                ReportColumn::Key,
                ReportColumn::FixVersions,
                ReportColumn::Summary,
                ReportColumn::Components
            ]
        );
        Ok(())
    }

    #[test]
    fn the_one_where_no_valid_columns_is_a_configuration_error() {
        let err = resolve_columns("Vibes, Mood").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Vibes, Mood"));
    }

    #[test]
    fn the_one_where_the_table_has_a_header_and_a_row_per_issue() -> anyhow::Result<()> {
        let mut the_bug = Issue::stub("ABC-1", "Bug");
        the_bug.summary = Some("Crash".to_string());
        the_bug.fix_versions = vec!["1.0".to_string(), "1.1".to_string()];
        let columns = resolve_columns(DEFAULT_REPORT_COLUMNS)?;

        let rendered = render_report("ABC 1.0", &columns, &[the_bug]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "ABC 1.0");
        assert!(lines[2].contains("Key") && lines[2].contains("Assignee"));
        assert!(rendered.contains("ABC-1"));
        assert!(rendered.contains("Unresolved"));
        assert_eq!(ReportColumn::FixVersions.cell(&Issue {
            fix_versions: vec!["1.0".to_string(), "1.1".to_string()],
            ..Issue::stub("ABC-1", "Bug")
        }), "1.0, 1.1");
        Ok(())
    }

    #[test]
    fn the_one_where_nothing_to_report_is_still_a_report() {
        let rendered = render_report("ABC 1.0", &[ReportColumn::Key], &[]);
        assert_eq!(rendered, "ABC 1.0\n\nNo issues found.\n");
    }
}

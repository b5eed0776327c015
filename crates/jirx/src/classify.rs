//! 🗂️ Classification & ordering — sorting the release into "new", "fixed", and "other".
//!
//! Every issue lands in exactly one [`Category`]. Nobody gets turned away at the door:
//! an issue type we have never seen before goes to `update`, which is the bucket for
//! "it changed, we're just not sure how to describe it". Within a bucket, issues line
//! up by the number after the last `-` of their key. Across buckets the order is fixed:
//! add, fix, update.
//!
//! Pure, total, never throws. The most relaxing module in the crate. 🦆

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::Issue;

/// 🏷️ The three release-note buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Add,
    Fix,
    Update,
}

impl Category {
    /// Output order of the buckets.
    pub const ALL: [Category; 3] = [Category::Add, Category::Fix, Category::Update];

    /// 🎯 Case-insensitive. Unknown types are updates.
    pub fn from_issue_type(issue_type: &str) -> Self {
        match issue_type.trim().to_lowercase().as_str() {
            "new feature" | "task" | "internaltask" | "sub-task" => Self::Add,
            "bug" | "internalbug" => Self::Fix,
            _ => Self::Update,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Fix => "fix",
            Self::Update => "update",
        }
    }

    /// 📰 Section heading used by the text release notes.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Add => "New Features",
            Self::Fix => "Bug Fixes",
            Self::Update => "Improvements",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 🔑 Sort key parsed from an issue key like `ABC-123`.
///
/// Compares by project prefix, then numeric suffix. A key with no numeric suffix sorts
/// after the numeric ones of the same prefix, ordered by its raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueKey<'a> {
    prefix: &'a str,
    number: Option<u64>,
    raw: &'a str,
}

impl<'a> IssueKey<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let (prefix, suffix) = match raw.rfind('-') {
            Some(dash) => (&raw[..dash], &raw[dash + 1..]),
            None => ("", raw),
        };
        Self {
            prefix,
            number: suffix.parse().ok(),
            raw,
        }
    }
}

impl Ord for IssueKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix.cmp(other.prefix).then_with(|| {
            match (self.number, other.number) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => self.raw.cmp(other.raw),
            }
        })
    }
}

impl PartialOrd for IssueKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// ⚖️ Issue comparator by key.
pub fn compare_issue_keys(a: &Issue, b: &Issue) -> Ordering {
    IssueKey::parse(&a.key).cmp(&IssueKey::parse(&b.key))
}

/// 📦 The classified release: three ordered buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedIssues {
    add: Vec<Issue>,
    fix: Vec<Issue>,
    update: Vec<Issue>,
}

impl ClassifiedIssues {
    /// 🗂️ Bucket, then sort each bucket. Consumes the input; nothing is mutated.
    pub fn classify(issues: Vec<Issue>) -> Self {
        let mut classified = Self::default();
        for issue in issues {
            match Category::from_issue_type(&issue.issue_type) {
                Category::Add => classified.add.push(issue),
                Category::Fix => classified.fix.push(issue),
                Category::Update => classified.update.push(issue),
            }
        }
        classified.add.sort_by(compare_issue_keys);
        classified.fix.sort_by(compare_issue_keys);
        classified.update.sort_by(compare_issue_keys);
        classified
    }

    pub fn bucket(&self, category: Category) -> &[Issue] {
        match category {
            Category::Add => &self.add,
            Category::Fix => &self.fix,
            Category::Update => &self.update,
        }
    }

    pub fn len(&self) -> usize {
        self.add.len() + self.fix.len() + self.update.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 📋 add, then fix, then update.
    pub fn flat(&self) -> Vec<Issue> {
        Category::ALL
            .iter()
            .flat_map(|category| self.bucket(*category).iter().cloned())
            .collect()
    }

    /// 🗺️ Bucket name → issues. All three names are always present, even when empty.
    pub fn grouped(&self) -> BTreeMap<String, Vec<Issue>> {
        Category::ALL
            .iter()
            .map(|category| (category.as_str().to_string(), self.bucket(*category).to_vec()))
            .collect()
    }
}

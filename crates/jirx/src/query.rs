//! 🔍 Query building — project key + release version + template = JQL.
//!
//! Two pure functions and one tiny struct. No I/O, no tracker, no feelings.
//!
//! 🧠 Templates use message-format placeholders: `{0}` is the project key, `{1}` the
//! normalized version. A single quote opens/closes a literal section and `''` is a
//! literal quote, which is why the default templates look like they were typed by
//! someone with a stutter: `project = ''{0}''` renders as `project = 'ABC'`.

use serde::{Deserialize, Serialize};

/// 📜 Default JQL for release notes and reports.
pub const DEFAULT_RELEASE_NOTES_JQL: &str =
    "project = ''{0}'' AND status in (Resolved, Closed) AND fixVersion = ''{1}''";

/// 📜 Default JQL for the transition goal — only issues that are resolved but not closed.
pub const DEFAULT_TRANSITION_JQL: &str =
    "project = ''{0}'' AND status in (Resolved) AND fixVersion = ''{1}''";

const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

fn default_jql_template() -> String {
    DEFAULT_RELEASE_NOTES_JQL.to_string()
}

fn default_max_issues() -> usize {
    100
}

/// 🔍 `[query]` config section, shared by the release-notes and report goals.
#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_jql_template")]
    pub jql_template: String,
    /// Cap handed to the tracker. Must be positive.
    #[serde(default = "default_max_issues")]
    pub max_issues: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            jql_template: default_jql_template(),
            max_issues: default_max_issues(),
        }
    }
}

/// 🏷️ Canonicalize a raw version string.
///
/// Removes every `-SNAPSHOT`, turns every `-` into a space, then uppercases the first
/// character of each whitespace-separated word when it is a lowercase letter. The rest
/// of each word is left alone. Idempotent: the output has no hyphens left to replace.
///
/// `"1.2-SNAPSHOT"` → `"1.2"`, `"release-candidate-1"` → `"Release Candidate 1"`.
pub fn normalize_version(raw: &str) -> String {
    let without_snapshot = raw.replace(SNAPSHOT_SUFFIX, "");
    let spaced = without_snapshot.replace('-', " ");

    let mut normalized = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for c in spaced.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            normalized.push(c);
        } else if at_word_start {
            at_word_start = false;
            if c.is_lowercase() {
                normalized.extend(c.to_uppercase());
            } else {
                normalized.push(c);
            }
        } else {
            normalized.push(c);
        }
    }
    normalized
}

/// 🧩 Substitute positional `{n}` placeholders into a message-format template.
///
/// Placeholders with no matching argument, or braces that are not `{digits}`, are
/// emitted verbatim. Nothing in the arguments is escaped.
pub fn format_template(template: &str, args: &[&str]) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut rendered = String::with_capacity(template.len() + 32);
    let mut quoted = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // -- '' is a literal quote, in or out of a quoted section
            if chars.get(i + 1) == Some(&'\'') {
                rendered.push('\'');
                i += 2;
            } else {
                quoted = !quoted;
                i += 1;
            }
            continue;
        }

        if c == '{' && !quoted {
            if let Some((index, consumed)) = placeholder_at(&chars[i..]) {
                match args.get(index) {
                    Some(arg) => rendered.push_str(arg),
                    None => rendered.extend(&chars[i..i + consumed]),
                }
                i += consumed;
                continue;
            }
        }

        rendered.push(c);
        i += 1;
    }
    rendered
}

// -- 🔎 `{12}` → Some((12, 4)); anything else → None
fn placeholder_at(chars: &[char]) -> Option<(usize, usize)> {
    let close = chars.iter().position(|&c| c == '}')?;
    let digits: String = chars[1..close].iter().collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|index| (index, close + 1))
}

/// 🔍 `format_template(template, [project_key, normalize_version(raw_version)])`.
pub fn build_query(template: &str, project_key: &str, raw_version: &str) -> String {
    ReleaseVersionQuery::new(project_key, raw_version, template).render()
}

/// 📦 Everything that goes into one release-version query. Ephemeral, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseVersionQuery {
    pub project_key: String,
    pub raw_version: String,
    pub normalized_version: String,
    pub query_template: String,
}

impl ReleaseVersionQuery {
    pub fn new(project_key: &str, raw_version: &str, query_template: &str) -> Self {
        Self {
            project_key: project_key.to_string(),
            raw_version: raw_version.to_string(),
            normalized_version: normalize_version(raw_version),
            query_template: query_template.to_string(),
        }
    }

    pub fn render(&self) -> String {
        format_template(
            &self.query_template,
            &[&self.project_key, &self.normalized_version],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_snapshot_goes_away_and_words_stand_up_straight() {
        assert_eq!(normalize_version("1.2-SNAPSHOT"), "1.2");
        assert_eq!(normalize_version("release-candidate-1"), "Release Candidate 1");
        assert_eq!(normalize_version("beta-rC"), "Beta RC");
        assert_eq!(normalize_version(""), "");
        // -- only the leading char of each word is touched
        assert_eq!(normalize_version("iOS-app"), "IOS App");
    }

    #[test]
    fn the_one_where_normalizing_twice_changes_nothing() {
        let the_suspects = [
            "1.2-SNAPSHOT",
            "release-candidate-1",
            "a--SNAPSHOTSNAPSHOT",
            "  spaced   out-words ",
            "straße-ß",
            "ALREADY Normal",
            "-",
        ];
        for raw in the_suspects {
            let once = normalize_version(raw);
            assert_eq!(normalize_version(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn the_one_where_doubled_quotes_become_single_quotes() {
        assert_eq!(
            build_query("project = ''{0}'' AND fixVersion = ''{1}''", "ABC", "1.0"),
            "project = 'ABC' AND fixVersion = '1.0'"
        );
    }

    #[test]
    fn the_one_where_the_default_template_gets_the_normalized_version() {
        assert_eq!(
            build_query(DEFAULT_RELEASE_NOTES_JQL, "ABC", "2.0-beta-SNAPSHOT"),
            "project = 'ABC' AND status in (Resolved, Closed) AND fixVersion = '2.0 Beta'"
        );
    }

    #[test]
    fn the_one_where_quoted_sections_and_strays_are_left_alone() {
        assert_eq!(format_template("'{0}' is {0}", &["x"]), "{0} is x");
        assert_eq!(format_template("{2} {x} {", &["a", "b"]), "{2} {x} {");
        assert_eq!(format_template("fixVersion = \"{1}\"", &["P", "1.0"]), "fixVersion = \"1.0\"");
    }

    #[test]
    fn the_one_where_the_query_struct_remembers_both_versions() {
        let q = ReleaseVersionQuery::new("ABC", "3.1-SNAPSHOT", "{0}/{1}");
        assert_eq!(q.raw_version, "3.1-SNAPSHOT");
        assert_eq!(q.normalized_version, "3.1");
        assert_eq!(q.render(), "ABC/3.1");
    }
}

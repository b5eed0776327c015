//! 📥 Fetching — one search, then turn every remote record into an [`Issue`].
//!
//! The search is soft: if the tracker rejects the query or the search call falls over,
//! we log a warning and carry on with zero issues. A release with no notes is
//! embarrassing; a release blocked on a typo in a JQL template is worse.
//!
//! Normalization is hard: once we have issues, every code must resolve. Half-resolved
//! release notes ("Priority: 3") are not something we ship.

use tracing::{debug, info, warn};

use crate::error::{TrackerError, TrackerResult};
use crate::model::{CodeKind, FieldValue, Issue, RemoteIssue, Session, browse_link};
use crate::query::ReleaseVersionQuery;
use crate::tracker::TrackerClient;

/// 🔍 Render the query, search once, normalize every hit in search order.
pub async fn fetch_issues<C>(
    client: &C,
    session: &Session,
    query: &ReleaseVersionQuery,
    max_issues: usize,
) -> TrackerResult<Vec<Issue>>
where
    C: TrackerClient + ?Sized,
{
    let jql = query.render();
    info!("🔍 JQL: {jql}");

    let remote_issues = match client.search(session, &jql, max_issues).await {
        Ok(found) => found,
        Err(e) => {
            warn!("⚠️ No issues found: {e}");
            return Ok(Vec::new());
        }
    };
    info!("📦 Issues: {}", remote_issues.len());

    let mut issues = Vec::with_capacity(remote_issues.len());
    for remote in remote_issues {
        issues.push(normalize_issue(client, session, remote).await?);
    }
    Ok(issues)
}

/// 🎫 One remote record → one [`Issue`]. Every field is converted exactly once.
pub async fn normalize_issue<C>(
    client: &C,
    session: &Session,
    remote: RemoteIssue,
) -> TrackerResult<Issue>
where
    C: TrackerClient + ?Sized,
{
    debug!("🎫 Normalizing {}", remote.key);

    let issue_type = resolve(client, session, CodeKind::IssueType, remote.issue_type)
        .await?
        .ok_or_else(|| {
            TrackerError::lookup(
                "resolve issue type",
                format!("issue {} has no issue type", remote.key),
            )
        })?;
    let status = resolve(client, session, CodeKind::Status, remote.status).await?;
    let resolution = resolve(client, session, CodeKind::Resolution, remote.resolution).await?;
    let priority = resolve(client, session, CodeKind::Priority, remote.priority).await?;
    let reporter = resolve(client, session, CodeKind::User, remote.reporter).await?;
    let assignee = resolve(client, session, CodeKind::User, remote.assignee).await?;

    let comments = match remote.comments {
        Some(inline) => inline,
        None => client.fetch_comments(session, &remote.key).await?,
    };

    Ok(Issue {
        link: browse_link(client.base_url(), &remote.key),
        key: remote.key,
        id: remote.id,
        summary: remote.summary,
        status,
        resolution,
        priority,
        issue_type,
        reporter,
        assignee,
        created: remote.created,
        updated: remote.updated,
        components: remote.components,
        fix_versions: remote.fix_versions,
        comments,
    })
}

async fn resolve<C>(
    client: &C,
    session: &Session,
    kind: CodeKind,
    field: Option<FieldValue>,
) -> TrackerResult<Option<String>>
where
    C: TrackerClient + ?Sized,
{
    match field {
        None => Ok(None),
        Some(FieldValue::Name(name)) => Ok(Some(name)),
        Some(FieldValue::Code(code)) => client.resolve_code(session, kind, &code).await.map(Some),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::query::DEFAULT_RELEASE_NOTES_JQL;
    use crate::tracker::{InMemoryTracker, InMemoryTrackerConfig};

    fn the_query() -> ReleaseVersionQuery {
        ReleaseVersionQuery::new("ABC", "1.0-SNAPSHOT", DEFAULT_RELEASE_NOTES_JQL)
    }

    fn coded_issue(key: &str) -> RemoteIssue {
        RemoteIssue {
            id: format!("id-{key}"),
            key: key.to_string(),
            summary: Some("Something broke".to_string()),
            issue_type: Some(FieldValue::code("1")),
            priority: Some(FieldValue::code("3")),
            reporter: Some(FieldValue::code("pdoe")),
            comments: None,
            ..RemoteIssue::default()
        }
    }

    #[tokio::test]
    async fn the_one_where_codes_become_names_and_comments_are_fetched() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig {
            url: "https://jira.example.com/".to_string(),
            issues: vec![coded_issue("ABC-1")],
            codes: BTreeMap::from([
                ("1".to_string(), "Bug".to_string()),
                ("3".to_string(), "Major".to_string()),
                ("pdoe".to_string(), "Pat Doe".to_string()),
            ]),
            comments: BTreeMap::from([("ABC-1".to_string(), vec!["fixed in trunk".to_string()])]),
            ..InMemoryTrackerConfig::default()
        });
        let session = tracker.authenticate().await?;

        let issues = fetch_issues(&tracker, &session, &the_query(), 100).await?;
        assert_eq!(issues.len(), 1);
        let the_issue = &issues[0];
        assert_eq!(the_issue.issue_type, "Bug");
        assert_eq!(the_issue.priority.as_deref(), Some("Major"));
        assert_eq!(the_issue.reporter.as_deref(), Some("Pat Doe"));
        assert_eq!(the_issue.assignee, None);
        assert_eq!(the_issue.comments, vec!["fixed in trunk"]);
        assert_eq!(the_issue.link, "https://jira.example.com/browse/ABC-1");

        let log = tracker.call_log().await;
        assert_eq!(
            log.searches,
            vec!["project = 'ABC' AND status in (Resolved, Closed) AND fixVersion = '1.0'"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_rejected_query_just_means_no_issues() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig {
            issues: vec![coded_issue("ABC-1")],
            reject_query: Some("Field 'fixVersion' is unknown".to_string()),
            ..InMemoryTrackerConfig::default()
        });
        let session = tracker.authenticate().await?;
        let issues = fetch_issues(&tracker, &session, &the_query(), 100).await?;
        assert!(issues.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_unresolvable_code_stops_the_fetch() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig {
            issues: vec![coded_issue("ABC-1")],
            codes: BTreeMap::from([("1".to_string(), "Bug".to_string())]),
            ..InMemoryTrackerConfig::default()
        });
        let session = tracker.authenticate().await?;
        let err = fetch_issues(&tracker, &session, &the_query(), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::RemoteLookup { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_issue_without_a_type_is_rejected() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig {
            issues: vec![RemoteIssue {
                id: "1".to_string(),
                key: "ABC-9".to_string(),
                comments: Some(Vec::new()),
                ..RemoteIssue::default()
            }],
            ..InMemoryTrackerConfig::default()
        });
        let session = tracker.authenticate().await?;
        let err = fetch_issues(&tracker, &session, &the_query(), 100)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ABC-9 has no issue type"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_cap_is_passed_through() -> anyhow::Result<()> {
        let tracker = InMemoryTracker::new(InMemoryTrackerConfig {
            issues: (1..=4)
                .map(|n| RemoteIssue {
                    id: n.to_string(),
                    key: format!("ABC-{n}"),
                    issue_type: Some(FieldValue::name("Task")),
                    comments: Some(Vec::new()),
                    ..RemoteIssue::default()
                })
                .collect(),
            ..InMemoryTrackerConfig::default()
        });
        let session = tracker.authenticate().await?;
        let issues = fetch_issues(&tracker, &session, &the_query(), 2).await?;
        assert_eq!(
            issues.iter().map(|i| i.key.as_str()).collect::<Vec<_>>(),
            vec!["ABC-1", "ABC-2"]
        );
        Ok(())
    }
}

//! # 📡 THE REST BACKEND
//!
//! 🎬 INT. RELEASE MEETING — 4:55 PM, FRIDAY
//!
//! "Can someone just paste the release notes?" asks the product manager.
//! Nobody can. Everybody opens JIRA. JIRA opens a spinner. The spinner opens a
//! second spinner. Somewhere, an engineer starts writing a REST client.
//!
//! 🚀 This module talks to JIRA's REST API, version 2. Basic auth rides on every
//! request, so there is no server-side session to speak of: `authenticate` just
//! confirms the credentials with `/myself`, and `close` has nothing to release.
//!
//! REST hands back display names inline, so every [`FieldValue`] we build is a
//! `Name` and `resolve_code` never has real work to do.
//!
//! 🦆

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace};

use crate::error::{TrackerError, TrackerResult};
use crate::model::{
    CodeKind, FieldValue, RemoteIssue, RemoteVersion, Session, WorkflowAction,
    parse_tracker_timestamp,
};
use crate::tracker::{TrackerClient, default_timeout_secs, http_failure};

/// Fields requested from `/search`. Everything the normalized issue needs, nothing more.
const SEARCH_FIELDS: [&str; 12] = [
    "summary",
    "status",
    "resolution",
    "priority",
    "issuetype",
    "reporter",
    "assignee",
    "created",
    "updated",
    "components",
    "fixVersions",
    "comment",
];

/// 📡 REST tracker config. Username and password are optional; without them we go in
/// anonymously, which works exactly as well as the tracker's permission scheme allows.
#[derive(Debug, Deserialize, Clone)]
pub struct RestTrackerConfig {
    /// 📡 Base URL, scheme included. `https://jira.example.com`, not `jira.example.com`.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 If this is in plaintext in a committed TOML file, use `JIRX_TRACKER__REST__PASSWORD`.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug)]
pub struct RestTracker {
    client: reqwest::Client,
    base_url: String,
    config: RestTrackerConfig,
}

// ============================================================
// 📦 Wire shapes. Only what we read; serde ignores the rest.
// ============================================================

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestUser {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl RestUser {
    fn into_field(self) -> Option<FieldValue> {
        self.display_name.or(self.name).map(FieldValue::Name)
    }
}

#[derive(Debug, Deserialize)]
struct RestComment {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Default, Deserialize)]
struct RestComments {
    #[serde(default)]
    comments: Vec<RestComment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RestFields {
    summary: Option<String>,
    status: Option<Named>,
    resolution: Option<Named>,
    priority: Option<Named>,
    issuetype: Option<Named>,
    reporter: Option<RestUser>,
    assignee: Option<RestUser>,
    created: Option<String>,
    updated: Option<String>,
    components: Vec<Named>,
    fix_versions: Vec<Named>,
    comment: Option<RestComments>,
}

#[derive(Debug, Deserialize)]
struct RestIssue {
    id: String,
    key: String,
    #[serde(default)]
    fields: RestFields,
}

impl From<RestIssue> for RemoteIssue {
    fn from(issue: RestIssue) -> Self {
        let f = issue.fields;
        let named = |n: Option<Named>| n.map(|n| FieldValue::Name(n.name));
        RemoteIssue {
            id: issue.id,
            key: issue.key,
            summary: f.summary,
            status: named(f.status),
            resolution: named(f.resolution),
            priority: named(f.priority),
            issue_type: named(f.issuetype),
            reporter: f.reporter.and_then(RestUser::into_field),
            assignee: f.assignee.and_then(RestUser::into_field),
            created: f.created.as_deref().and_then(parse_tracker_timestamp),
            updated: f.updated.as_deref().and_then(parse_tracker_timestamp),
            components: f.components.into_iter().map(|c| c.name).collect(),
            fix_versions: f.fix_versions.into_iter().map(|v| v.name).collect(),
            comments: Some(
                f.comment
                    .unwrap_or_default()
                    .comments
                    .into_iter()
                    .map(|c| c.body)
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<RestIssue>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TransitionsResponse {
    #[serde(default)]
    transitions: Vec<WorkflowAction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestVersion {
    id: String,
    name: String,
    #[serde(default)]
    released: bool,
    #[serde(default)]
    release_date: Option<String>,
}

impl From<RestVersion> for RemoteVersion {
    fn from(v: RestVersion) -> Self {
        RemoteVersion {
            id: v.id,
            name: v.name,
            released: v.released,
            release_date: v
                .release_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestErrorBody {
    #[serde(default)]
    error_messages: Vec<String>,
}

// ============================================================
// 🔧 Plumbing
// ============================================================

impl RestTracker {
    /// 🚀 Build the HTTP client. Nothing is sent until `authenticate`.
    pub fn new(config: RestTrackerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably a TLS stack having a bad day.")?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        trace!("📡 {method} {url}");
        let request = self.client.request(method, url);
        match &self.config.username {
            Some(username) => request.basic_auth(username, self.config.password.as_ref()),
            None => request,
        }
    }

    // -- non-2xx → lookup error carrying status and body
    async fn ok_or_lookup(response: Response, operation: &str) -> TrackerResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(TrackerError::lookup(
            operation,
            http_failure(status, response.text().await),
        ))
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> TrackerResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| TrackerError::lookup(operation, e))?;
        Self::ok_or_lookup(response, operation).await
    }

    async fn json<T: serde::de::DeserializeOwned>(
        response: Response,
        operation: &str,
    ) -> TrackerResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| TrackerError::lookup(operation, format!("unreadable response: {e}")))
    }
}

#[async_trait]
impl TrackerClient for RestTracker {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn authenticate(&self) -> TrackerResult<Session> {
        let session = Session::new(self.base_url.clone());
        let Some(username) = &self.config.username else {
            debug!("🔓 No username configured, going in anonymously");
            return Ok(session);
        };

        let auth_failure = |reason: String| TrackerError::Authentication {
            server: self.base_url.clone(),
            reason,
        };
        let response = self
            .request(Method::GET, "/rest/api/2/myself")
            .send()
            .await
            .map_err(|e| auth_failure(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(auth_failure(format!("HTTP {status} for user '{username}'")));
        }
        debug!("🔒 Authenticated as {username}");
        Ok(session.with_user(username.clone()))
    }

    async fn search(
        &self,
        _session: &Session,
        jql: &str,
        max_results: usize,
    ) -> TrackerResult<Vec<RemoteIssue>> {
        let body = json!({
            "jql": jql,
            "startAt": 0,
            "maxResults": max_results,
            "fields": SEARCH_FIELDS,
        });
        let response = self
            .request(Method::POST, "/rest/api/2/search")
            .json(&body)
            .send()
            .await
            .map_err(|e| TrackerError::lookup("search", e))?;

        match response.status() {
            StatusCode::BAD_REQUEST => {
                let reasons = response
                    .json::<RestErrorBody>()
                    .await
                    .unwrap_or_default()
                    .error_messages;
                Err(TrackerError::Query {
                    query: jql.to_string(),
                    reason: if reasons.is_empty() {
                        "HTTP 400".to_string()
                    } else {
                        reasons.join("; ")
                    },
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TrackerError::Authentication {
                server: self.base_url.clone(),
                reason: format!("HTTP {} during search", response.status()),
            }),
            _ => {
                let response = Self::ok_or_lookup(response, "search").await?;
                let page: SearchResponse = Self::json(response, "search").await?;
                debug!(
                    "🔍 Search returned {} issue(s) of {:?} total",
                    page.issues.len(),
                    page.total
                );
                Ok(page.issues.into_iter().map(RemoteIssue::from).collect())
            }
        }
    }

    async fn resolve_code(
        &self,
        _session: &Session,
        kind: CodeKind,
        code: &str,
    ) -> TrackerResult<String> {
        trace!("🗂️ REST {kind} '{code}' is already a display name");
        Ok(code.to_string())
    }

    async fn fetch_comments(
        &self,
        _session: &Session,
        issue_key: &str,
    ) -> TrackerResult<Vec<String>> {
        let operation = "fetch comments";
        let request = self.request(Method::GET, &format!("/rest/api/2/issue/{issue_key}/comment"));
        let response = self.send(request, operation).await?;
        let comments: RestComments = Self::json(response, operation).await?;
        Ok(comments.comments.into_iter().map(|c| c.body).collect())
    }

    async fn list_workflow_actions(
        &self,
        _session: &Session,
        issue_key: &str,
    ) -> TrackerResult<Vec<WorkflowAction>> {
        let operation = "list workflow actions";
        let request = self.request(
            Method::GET,
            &format!("/rest/api/2/issue/{issue_key}/transitions"),
        );
        let response = self.send(request, operation).await?;
        let listed: TransitionsResponse = Self::json(response, operation).await?;
        Ok(listed.transitions)
    }

    async fn apply_transition(
        &self,
        _session: &Session,
        issue_key: &str,
        action_id: &str,
    ) -> TrackerResult<()> {
        let request = self
            .request(
                Method::POST,
                &format!("/rest/api/2/issue/{issue_key}/transitions"),
            )
            .json(&json!({ "transition": { "id": action_id } }));
        self.send(request, "apply transition").await?;
        Ok(())
    }

    async fn list_versions(
        &self,
        _session: &Session,
        project_key: &str,
    ) -> TrackerResult<Vec<RemoteVersion>> {
        let operation = "list versions";
        let request = self.request(
            Method::GET,
            &format!("/rest/api/2/project/{project_key}/versions"),
        );
        let response = self.send(request, operation).await?;
        let versions: Vec<RestVersion> = Self::json(response, operation).await?;
        Ok(versions.into_iter().map(RemoteVersion::from).collect())
    }

    async fn add_version(
        &self,
        _session: &Session,
        project_key: &str,
        name: &str,
    ) -> TrackerResult<RemoteVersion> {
        let operation = "add version";
        let request = self
            .request(Method::POST, "/rest/api/2/version")
            .json(&json!({ "name": name, "project": project_key }));
        let response = self.send(request, operation).await?;
        let created: RestVersion = Self::json(response, operation).await?;
        Ok(created.into())
    }

    async fn release_version(
        &self,
        _session: &Session,
        _project_key: &str,
        version: &RemoteVersion,
        release_date: NaiveDate,
    ) -> TrackerResult<()> {
        let request = self
            .request(Method::PUT, &format!("/rest/api/2/version/{}", version.id))
            .json(&json!({
                "released": true,
                "releaseDate": release_date.format("%Y-%m-%d").to_string(),
            }));
        self.send(request, "release version").await?;
        Ok(())
    }

    async fn close(&self, _session: &Session) -> TrackerResult<()> {
        // -- basic auth is stateless; nothing to hand back
        debug!("🗑️ REST session closed (there was never really one)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tracker_for(server: &MockServer, username: Option<&str>) -> RestTracker {
        RestTracker::new(RestTrackerConfig {
            url: format!("{}/", server.uri()),
            username: username.map(str::to_string),
            password: username.map(|_| "hunter2".to_string()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn the_one_where_search_maps_names_and_inline_comments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/search"))
            .and(body_partial_json(json!({ "jql": "project = 'ABC'", "maxResults": 100 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "issues": [{
                    "id": "10001",
                    "key": "ABC-7",
                    "fields": {
                        "summary": "Make it faster",
                        "issuetype": { "name": "Improvement" },
                        "status": { "name": "Resolved" },
                        "priority": { "name": "Major" },
                        "assignee": { "displayName": "Pat Doe", "name": "pdoe" },
                        "created": "2024-01-15T10:30:00.000+0000",
                        "fixVersions": [{ "name": "1.0" }],
                        "comment": { "comments": [{ "body": "done" }] }
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = tracker_for(&server, None);
        let session = tracker.authenticate().await.unwrap();
        let issues = tracker.search(&session, "project = 'ABC'", 100).await.unwrap();

        assert_eq!(issues.len(), 1);
        let the_issue = &issues[0];
        assert_eq!(the_issue.key, "ABC-7");
        assert_eq!(the_issue.issue_type, Some(FieldValue::name("Improvement")));
        assert_eq!(the_issue.assignee, Some(FieldValue::name("Pat Doe")));
        assert_eq!(the_issue.resolution, None);
        assert_eq!(the_issue.fix_versions, vec!["1.0"]);
        assert_eq!(the_issue.comments, Some(vec!["done".to_string()]));
        assert!(the_issue.created.is_some());
    }

    #[tokio::test]
    async fn the_one_where_a_bad_jql_becomes_a_query_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/search"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errorMessages": ["The value 'Nope' does not exist for the field 'fixVersion'."]
            })))
            .mount(&server)
            .await;

        let tracker = tracker_for(&server, None);
        let session = tracker.authenticate().await.unwrap();
        let err = tracker.search(&session, "fixVersion = 'Nope'", 10).await.unwrap_err();
        match err {
            TrackerError::Query { query, reason } => {
                assert_eq!(query, "fixVersion = 'Nope'");
                assert!(reason.contains("does not exist"));
            }
            other => panic!("💀 Expected a query error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn the_one_where_bad_credentials_fail_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/myself"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let tracker = tracker_for(&server, Some("pdoe"));
        let err = tracker.authenticate().await.unwrap_err();
        assert!(matches!(err, TrackerError::Authentication { .. }));
    }

    #[tokio::test]
    async fn the_one_where_transitions_are_listed_and_applied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/ABC-1/transitions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transitions": [{ "id": "2", "name": "Close Issue" }, { "id": "3", "name": "Reopen" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/issue/ABC-1/transitions"))
            .and(body_partial_json(json!({ "transition": { "id": "2" } })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = tracker_for(&server, None);
        let session = tracker.authenticate().await.unwrap();
        let actions = tracker.list_workflow_actions(&session, "ABC-1").await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].name, "Close Issue");
        tracker.apply_transition(&session, "ABC-1", "2").await.unwrap();
    }

    #[tokio::test]
    async fn the_one_where_versions_are_listed_created_and_released() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/project/ABC/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "1", "name": "1.0", "released": true, "releaseDate": "2023-12-01" },
                { "id": "2", "name": "1.1", "released": false }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/version"))
            .and(body_partial_json(json!({ "name": "1.2", "project": "ABC" })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "id": "3", "name": "1.2", "released": false })),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/rest/api/2/version/2"))
            .and(body_partial_json(json!({ "released": true, "releaseDate": "2024-02-29" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "2", "name": "1.1" })))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = tracker_for(&server, None);
        let session = tracker.authenticate().await.unwrap();

        let versions = tracker.list_versions(&session, "ABC").await.unwrap();
        assert_eq!(versions[0].release_date, NaiveDate::from_ymd_opt(2023, 12, 1));
        assert!(!versions[1].released);

        let created = tracker.add_version(&session, "ABC", "1.2").await.unwrap();
        assert_eq!(created.id, "3");

        let leap_day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        tracker
            .release_version(&session, "ABC", &versions[1], leap_day)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn the_one_where_comments_come_back_in_tracker_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/ABC-7/comment"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "startAt": 0,
                "total": 2,
                "comments": [
                    { "id": "1", "body": "works on my machine" },
                    { "id": "2", "body": "shipped it anyway" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/myself"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "pdoe" })))
            .mount(&server)
            .await;

        let tracker = tracker_for(&server, Some("pdoe"));
        let session = tracker.authenticate().await.unwrap();
        let comments = tracker.fetch_comments(&session, "ABC-7").await.unwrap();
        assert_eq!(comments, vec!["works on my machine", "shipped it anyway"]);
    }

    #[tokio::test]
    async fn the_one_where_missing_comments_are_a_lookup_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/ABC-404/comment"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Issue Does Not Exist"))
            .mount(&server)
            .await;

        let tracker = tracker_for(&server, None);
        let session = tracker.authenticate().await.unwrap();
        let err = tracker.fetch_comments(&session, "ABC-404").await.unwrap_err();
        assert!(matches!(err, TrackerError::RemoteLookup { .. }));
        assert!(err.to_string().contains("fetch comments"));
        assert!(err.to_string().contains("Issue Does Not Exist"));
    }

    #[tokio::test]
    async fn the_one_where_a_server_error_is_a_lookup_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/project/ABC/versions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("on fire"))
            .mount(&server)
            .await;

        let tracker = tracker_for(&server, None);
        let session = tracker.authenticate().await.unwrap();
        let err = tracker.list_versions(&session, "ABC").await.unwrap_err();
        assert!(err.to_string().contains("on fire"));
    }
}

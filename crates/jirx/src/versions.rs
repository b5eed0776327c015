//! 🏷️ Version housekeeping — release the one that shipped, open the next one.
//!
//! Two small goals that run at the end of a release:
//! - **release**: find the version that just shipped and mark it released, today.
//! - **create**: make sure the next development version exists, so issues have
//!   somewhere to go on Monday.

use std::cmp::Ordering;

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{TrackerError, TrackerResult};
use crate::model::{RemoteVersion, Session};
use crate::query::normalize_version;
use crate::tracker::TrackerClient;

fn default_auto_discover() -> bool {
    true
}

/// 🏷️ `[versions]` config section.
#[derive(Debug, Deserialize, Clone)]
pub struct VersionsConfig {
    /// Release the highest-named unreleased version instead of the configured one.
    #[serde(default = "default_auto_discover")]
    pub auto_discover_latest_release: bool,
    /// Version to create. Falls back to the release version.
    #[serde(default)]
    pub development_version: Option<String>,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            auto_discover_latest_release: default_auto_discover(),
            development_version: None,
        }
    }
}

// -- one case-folding rule for sorting and matching, Unicode-aware
fn folded(name: &str) -> String {
    name.to_lowercase()
}

fn same_name(a: &str, b: &str) -> bool {
    folded(a) == folded(b)
}

/// ⚖️ Name descending, ignoring case.
pub fn compare_versions_desc(a: &RemoteVersion, b: &RemoteVersion) -> Ordering {
    folded(&b.name).cmp(&folded(&a.name))
}

/// 🎯 Which version the release goal should mark as released, if any.
///
/// Versions are considered in descending name order. With auto-discovery the first
/// unreleased one wins; otherwise the first unreleased one whose name matches one of
/// `wanted`, ignoring case.
pub fn pick_version_to_release(
    versions: &[RemoteVersion],
    auto_discover: bool,
    wanted: &[&str],
) -> Option<RemoteVersion> {
    let mut sorted = versions.to_vec();
    sorted.sort_by(compare_versions_desc);
    sorted.into_iter().filter(|v| !v.released).find(|v| {
        auto_discover || wanted.iter().any(|w| same_name(w, &v.name))
    })
}

pub fn version_already_present(versions: &[RemoteVersion], name: &str) -> bool {
    versions.iter().any(|v| same_name(&v.name, name))
}

/// ✅ Mark the shipped version as released today. `None` when there was nothing to release.
pub async fn release_version<C>(
    client: &C,
    session: &Session,
    project_key: &str,
    raw_release_version: &str,
    config: &VersionsConfig,
) -> TrackerResult<Option<RemoteVersion>>
where
    C: TrackerClient + ?Sized,
{
    release_version_on(
        client,
        session,
        project_key,
        raw_release_version,
        config,
        Local::now().date_naive(),
    )
    .await
}

pub async fn release_version_on<C>(
    client: &C,
    session: &Session,
    project_key: &str,
    raw_release_version: &str,
    config: &VersionsConfig,
    release_date: NaiveDate,
) -> TrackerResult<Option<RemoteVersion>>
where
    C: TrackerClient + ?Sized,
{
    let versions = client.list_versions(session, project_key).await?;
    let normalized = normalize_version(raw_release_version);
    let Some(mut target) = pick_version_to_release(
        &versions,
        config.auto_discover_latest_release,
        &[raw_release_version, &normalized],
    ) else {
        warn!("⚠️ No unreleased version of {project_key} to release");
        return Ok(None);
    };

    info!("🚀 Releasing version {}", target.name);
    client
        .release_version(session, project_key, &target, release_date)
        .await?;
    target.released = true;
    target.release_date = Some(release_date);
    info!("✅ Version {} was released", target.name);
    Ok(Some(target))
}

/// ➕ Create the next development version unless it already exists.
pub async fn create_version<C>(
    client: &C,
    session: &Session,
    project_key: &str,
    raw_development_version: &str,
) -> TrackerResult<Option<RemoteVersion>>
where
    C: TrackerClient + ?Sized,
{
    let name = normalize_version(raw_development_version);
    if name.trim().is_empty() {
        return Err(TrackerError::Configuration(
            "no development version configured".to_string(),
        ));
    }

    let versions = client.list_versions(session, project_key).await?;
    if version_already_present(&versions, &name) {
        warn!("⚠️ Version {name} is already created in {project_key}");
        return Ok(None);
    }

    let created = client.add_version(session, project_key, &name).await?;
    info!("✅ Version {} created in {project_key}", created.name);
    Ok(Some(created))
}

// src/services/fetcher.rs

//! Release listing fetchers.

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{PartHandle, ReleaseRecord, Snapshot, SourceKind, TrackedProject, UpstreamConfig};
use crate::services::wiki;
use crate::utils::HttpSource;

/// One item of the repository tags listing.
#[derive(Debug, Deserialize)]
struct TagItem {
    name: String,
    #[serde(default)]
    commit: Option<TagCommit>,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagCommit {
    created_at: Option<String>,
}

impl TagItem {
    fn into_record(self, part: &str) -> ReleaseRecord {
        let date = self
            .commit
            .and_then(|c| c.created_at)
            .or(self.created_at)
            .unwrap_or_default();
        ReleaseRecord::new(self.name, part, date)
    }
}

/// Builds a fresh [`Snapshot`] of a tracked project.
pub struct Fetcher<'a> {
    source: &'a dyn HttpSource,
    upstream: &'a UpstreamConfig,
}

impl<'a> Fetcher<'a> {
    pub fn new(source: &'a dyn HttpSource, upstream: &'a UpstreamConfig) -> Self {
        Self { source, upstream }
    }

    /// Fetch every release of `project`. Any failed page aborts the fetch.
    pub async fn fetch(&self, project: &TrackedProject) -> Result<Snapshot> {
        match project.source {
            SourceKind::Api => self.fetch_tags(project).await,
            SourceKind::Wiki => self.fetch_wiki(project).await,
        }
    }

    async fn fetch_tags(&self, project: &TrackedProject) -> Result<Snapshot> {
        let mut snapshot = Snapshot::new();
        for part in &project.parts {
            let section = project.section_key(&part.name);
            snapshot.ensure_section(&section);

            let mut page = 1u32;
            loop {
                let url = self.tags_url(part, page);
                log::debug!("Fetching {} page {}: {}", section, page, url);

                let fetched = self
                    .source
                    .get(&url)
                    .await
                    .map_err(|e| AppError::fetch(format!("{section} page {page}"), e))?;
                let items: Vec<TagItem> = serde_json::from_str(&fetched.body)
                    .map_err(|e| AppError::fetch(format!("{section} page {page}"), e))?;
                for item in items {
                    snapshot.insert(&section, item.into_record(&part.name));
                }

                match next_page(fetched.header("x-next-page"), page) {
                    Some(next) => page = next,
                    None => break,
                }
            }
            log::info!(
                "{}: {} tags",
                section,
                snapshot.section(&section).map_or(0, |s| s.len())
            );
        }
        Ok(snapshot)
    }

    async fn fetch_wiki(&self, project: &TrackedProject) -> Result<Snapshot> {
        let url = project
            .url
            .as_deref()
            .ok_or_else(|| AppError::config(format!("wiki project '{}' has no url", project.name)))?;
        let fetched = self
            .source
            .get(url)
            .await
            .map_err(|e| AppError::fetch(&project.name, e))?;

        let mut snapshot = Snapshot::new();
        snapshot.ensure_section(&project.name);
        for record in wiki::parse_release_table(&fetched.body)? {
            snapshot.insert(&project.name, record);
        }
        log::info!("{}: {} rows", project.name, snapshot.len());
        Ok(snapshot)
    }

    fn tags_url(&self, part: &PartHandle, page: u32) -> String {
        let id: String = url::form_urlencoded::byte_serialize(part.id.as_bytes()).collect();
        format!(
            "{}/projects/{}/repository/tags?per_page={}&page={}",
            self.upstream.api_url.trim_end_matches('/'),
            id,
            self.upstream.per_page,
            page
        )
    }
}

/// Continuation page from the `x-next-page` header.
fn next_page(header: Option<&str>, current: u32) -> Option<u32> {
    let value = header.map(str::trim).filter(|v| !v.is_empty())?;
    match value.parse::<u32>() {
        Ok(next) if next > current => Some(next),
        Ok(next) => {
            log::warn!("Ignoring non-advancing x-next-page {} after page {}", next, current);
            None
        }
        Err(_) => {
            log::warn!("Ignoring malformed x-next-page '{}'", value);
            None
        }
    }
}

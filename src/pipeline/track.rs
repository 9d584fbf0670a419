// src/pipeline/track.rs

//! Release tracking pipeline.

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, TrackedProject};
use crate::pipeline::SnapshotDiff;
use crate::services::{
    ExclusionRuleSet, Fetcher, ManifestResolver, MessageFormatter, Messenger,
    NotificationDispatcher,
};
use crate::storage::{PublishOutcome, Publisher, SnapshotStore};
use crate::utils::HttpSource;

/// Outcome of tracking one project.
#[derive(Debug, Clone, Default)]
pub struct ProjectReport {
    pub project: String,
    /// Records in the fresh snapshot
    pub fetched: usize,
    /// Records not present in the previous snapshot
    pub new_records: usize,
    /// Successful channel deliveries
    pub delivered: usize,
}

/// Outcome of a full run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub projects: Vec<ProjectReport>,
    /// Projects that failed, with their error
    pub failures: Vec<(String, AppError)>,
    pub published: Option<PublishOutcome>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs fetch, diff, enrichment, and notification for tracked projects.
pub struct Tracker<'a> {
    config: &'a Config,
    source: &'a dyn HttpSource,
    store: &'a dyn SnapshotStore,
    /// Pacing state spans every project of a run
    dispatcher: NotificationDispatcher<'a>,
    exclusions: ExclusionRuleSet,
    formatter: MessageFormatter,
    now: DateTime<Utc>,
    persist: bool,
}

impl<'a> Tracker<'a> {
    pub fn new(
        config: &'a Config,
        source: &'a dyn HttpSource,
        store: &'a dyn SnapshotStore,
        messenger: &'a dyn Messenger,
    ) -> Result<Self> {
        Ok(Self {
            config,
            source,
            store,
            dispatcher: NotificationDispatcher::new(messenger, &config.notify),
            exclusions: ExclusionRuleSet::new(&config.exclusions)?,
            formatter: MessageFormatter::new(config),
            now: Utc::now(),
            persist: true,
        })
    }

    /// Evaluate the retention window at `now` instead of the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Leave stored snapshots untouched.
    pub fn without_persist(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Track every configured project, or only `only` when given.
    ///
    /// A failing project is logged and recorded; the others still run.
    pub async fn run(&self, only: Option<&str>) -> Result<RunReport> {
        let projects: Vec<&TrackedProject> = match only {
            Some(name) => vec![
                self.config
                    .project(name)
                    .ok_or_else(|| AppError::config(format!("unknown project '{name}'")))?,
            ],
            None => self.config.projects.iter().collect(),
        };

        let mut report = RunReport::default();
        for project in projects {
            match self.track_project(project).await {
                Ok(project_report) => report.projects.push(project_report),
                Err(e) => {
                    log::error!("Tracking {} failed: {}", project.name, e);
                    report.failures.push((project.name.clone(), e));
                }
            }
        }
        Ok(report)
    }

    /// Fetch, diff, notify, then persist one project.
    pub async fn track_project(&self, project: &TrackedProject) -> Result<ProjectReport> {
        log::info!("Tracking {}", project.name);

        let current = Fetcher::new(self.source, &self.config.upstream)
            .fetch(project)
            .await?;
        let previous = self.store.load(&project.name).await?;
        let diff = SnapshotDiff::calculate(&previous, &current);
        log::info!(
            "{}: {} records, {} new, {} gone",
            project.name,
            current.len(),
            diff.added.len(),
            diff.removed
        );

        let resolver = ManifestResolver::new(self.source, self.config, &self.exclusions)?;

        let mut delivered = 0;
        for record in &diff.added {
            if !self.dispatcher.is_recent(record, self.now) {
                log::debug!("{}: outside retention window", record.tag);
                continue;
            }
            let enrichment = resolver.resolve(&record.tag, record.kind()).await;
            let text = self.formatter.format(record, &enrichment);
            delivered += self.dispatcher.dispatch_at(record, &text, self.now).await;
        }

        if self.persist {
            let meta = self.store.save(&project.name, &current).await?;
            let export = self.store.export_markdown(&project.name, &current).await?;
            log::info!(
                "Saved {} records to {} ({})",
                meta.record_count,
                meta.location.display(),
                export.display()
            );
        }

        Ok(ProjectReport {
            project: project.name.clone(),
            fetched: current.len(),
            new_records: diff.added.len(),
            delivered,
        })
    }

    /// Commit and push the data directory.
    pub async fn publish(&self, publisher: &dyn Publisher) -> Result<PublishOutcome> {
        let date = self.now.format("%Y-%m-%d").to_string();
        publisher.publish(&date).await
    }
}

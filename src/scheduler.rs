use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::archive::{ArchiveReport, Archiver};
use crate::config::Config;
use crate::db::{ArchiveScope, Repository};
use crate::error::{AppError, Result};
use crate::feed::{sync_feed, FeedFetcher, SyncOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub feeds: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub unreachable: usize,
    pub failed: usize,
    pub articles_added: usize,
    pub comments_added: usize,
}

impl SyncSummary {
    fn record(&mut self, result: &Result<SyncOutcome>) {
        self.feeds += 1;
        match result {
            Ok(SyncOutcome::Updated(report)) => {
                self.updated += 1;
                self.articles_added += report.articles_added;
                self.comments_added += report.comments_added;
            }
            Ok(SyncOutcome::Unchanged) => self.unchanged += 1,
            Ok(SyncOutcome::Unreachable(_)) => self.unreachable += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Drives periodic synchronization of every known feed followed by an archive pass.
#[derive(Clone)]
pub struct Scheduler {
    repo: Repository,
    fetcher: FeedFetcher,
    archiver: Archiver,
    interval: Duration,
    concurrency: usize,
    recheck_dead_every: u32,
}

impl Scheduler {
    pub fn new(repo: Repository, fetcher: FeedFetcher, archiver: Archiver, config: &Config) -> Self {
        Self {
            repo,
            fetcher,
            archiver,
            interval: config.sync_interval(),
            concurrency: config.sync_concurrency.max(1),
            recheck_dead_every: config.dead_link_recheck_every,
        }
    }

    /// Synchronizes all feeds with at most `concurrency` in flight. A failing feed is
    /// logged and counted; it never stops the others.
    pub async fn sync_all(&self) -> Result<SyncSummary> {
        let urls = self.repo.feed_urls().await?;

        let results: Vec<(String, Result<SyncOutcome>)> = stream::iter(urls)
            .map(|url| async move {
                let result = sync_feed(&self.repo, &self.fetcher, &url).await;
                (url, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = SyncSummary::default();
        for (url, result) in &results {
            if let Err(err) = result {
                tracing::error!(feed = %url, error = %err, "feed synchronization failed");
            }
            summary.record(result);
        }

        tracing::info!(
            feeds = summary.feeds,
            updated = summary.updated,
            unchanged = summary.unchanged,
            unreachable = summary.unreachable,
            failed = summary.failed,
            articles_added = summary.articles_added,
            "sync pass finished"
        );
        Ok(summary)
    }

    fn archive_scope(&self, tick: u64) -> ArchiveScope {
        if self.recheck_dead_every > 0 && tick % u64::from(self.recheck_dead_every) == 0 {
            ArchiveScope::RecheckDead
        } else {
            ArchiveScope::Pending
        }
    }

    /// One scheduled pass: sync, then archive. `tick` counts passes from 0.
    pub async fn run_pass(&self, tick: u64) -> (Option<SyncSummary>, Option<ArchiveReport>) {
        let summary = match self.sync_all().await {
            Ok(summary) => Some(summary),
            Err(err) => {
                tracing::error!(error = %err, "unable to list feeds");
                None
            }
        };

        let scope = self.archive_scope(tick);
        let report = match self.archiver.run_pass(&self.repo, scope).await {
            Ok(report) => Some(report),
            Err(err) => {
                tracing::error!(error = %err, ?scope, "archive pass failed");
                None
            }
        };

        (summary, report)
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut tick: u64 = 0;

            loop {
                tokio::select! {
                    _ = cancel_rx.recv() => {
                        tracing::info!("scheduler shutdown requested");
                        break;
                    }
                    _ = ticker.tick() => {
                        tracing::info!(tick, "updating all feeds");
                        self.run_pass(tick).await;
                        tick = tick.wrapping_add(1);
                    }
                }
            }
        });

        SchedulerHandle { cancel_tx, join }
    }
}

pub struct SchedulerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the loop once the pass in progress, if any, has finished.
    pub async fn stop(self) -> Result<()> {
        let _ = self.cancel_tx.send(());
        self.join
            .await
            .map_err(|e| AppError::Other(anyhow::anyhow!("scheduler task failed: {}", e)))
    }
}

mod discovery;
mod fetcher;
mod ingest;
mod parser;

pub use discovery::{add_feed_with_discovery, normalize_url, FEED_PATHS};
pub use fetcher::{http_date, FeedFetcher, FetchOutcome, Unreachable};
pub use ingest::{ingest, IngestReport};
pub use parser::{parse_feed, FeedDocument, FeedItem};

use crate::db::Repository;
use crate::error::Result;

#[derive(Debug)]
pub enum SyncOutcome {
    Unchanged,
    Updated(IngestReport),
    Unreachable(Unreachable),
}

/// Fetches one feed and reconciles it. Network and protocol failures come back as
/// [`SyncOutcome::Unreachable`]; only storage failures are errors.
pub async fn sync_feed(repo: &Repository, fetcher: &FeedFetcher, url: &str) -> Result<SyncOutcome> {
    match fetcher.fetch(repo, url).await? {
        FetchOutcome::Unchanged => {
            tracing::debug!(feed = %url, "feed not modified");
            Ok(SyncOutcome::Unchanged)
        }
        FetchOutcome::Updated(document) => {
            let report = ingest(repo, url, &document).await?;
            tracing::debug!(
                feed = %url,
                added = report.articles_added,
                comments = report.comments_added,
                skipped = report.items_skipped,
                "feed synchronized"
            );
            Ok(SyncOutcome::Updated(report))
        }
        FetchOutcome::Unreachable(reason) => {
            match &reason {
                Unreachable::Malformed(_) => {
                    tracing::error!(feed = %url, error = %reason, "unable to parse feed")
                }
                _ => tracing::error!(feed = %url, error = %reason, "unable to get feed"),
            }
            Ok(SyncOutcome::Unreachable(reason))
        }
    }
}

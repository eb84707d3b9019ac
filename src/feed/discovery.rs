use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::Feed;

use super::fetcher::{FeedFetcher, FetchOutcome};
use super::ingest::ingest;

/// Suffixes tried, in order, when a feed is added by site address.
pub const FEED_PATHS: [&str; 4] = ["", "/rss", "/index.xml", "/feed"];

/// Adds `https://` when the input carries no http(s) scheme.
pub fn normalize_url(input: &str) -> String {
    let input = input.trim();
    if input.starts_with("https://") || input.starts_with("http://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    }
}

fn candidates(base: &str) -> Vec<String> {
    let trimmed = base.trim_end_matches('/');
    FEED_PATHS
        .iter()
        .map(|suffix| {
            if suffix.is_empty() {
                base.to_string()
            } else {
                format!("{}{}", trimmed, suffix)
            }
        })
        .collect()
}

/// Tries the fixed candidate list and stores the first URL that serves a parseable feed.
pub async fn add_feed_with_discovery(
    repo: &Repository,
    fetcher: &FeedFetcher,
    input: &str,
) -> Result<Feed> {
    let base = normalize_url(input);

    for candidate in candidates(&base) {
        tracing::debug!(candidate = %candidate, "trying feed path");
        match fetcher.fetch(repo, &candidate).await? {
            FetchOutcome::Updated(document) => {
                let report = ingest(repo, &candidate, &document).await?;
                tracing::info!(feed = %candidate, added = report.articles_added, "feed added");
                return stored_feed(repo, &candidate).await;
            }
            // Only a feed we already synced can answer 304
            FetchOutcome::Unchanged => return stored_feed(repo, &candidate).await,
            FetchOutcome::Unreachable(reason) => {
                tracing::debug!(candidate = %candidate, error = %reason, "no feed at path");
            }
        }
    }

    Err(AppError::NotFound(format!("no feed found at {}", base)))
}

async fn stored_feed(repo: &Repository, url: &str) -> Result<Feed> {
    repo.get_feed(url)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("feed {}", url)))
}

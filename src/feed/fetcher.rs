use chrono::{DateTime, Utc};
use reqwest::header::IF_MODIFIED_SINCE;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::db::Repository;
use crate::error::Result;

use super::parser::{parse_feed, FeedDocument};

/// Why a feed could not be brought up to date on this pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unreachable {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("malformed feed: {0}")]
    Malformed(String),
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// The server reported no change since the last sync.
    Unchanged,
    Updated(FeedDocument),
    Unreachable(Unreachable),
}

#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Conditional fetch keyed on the feed's stored sync time. Only reads from storage.
    pub async fn fetch(&self, repo: &Repository, url: &str) -> Result<FetchOutcome> {
        let last_updated = repo.feed_last_updated(url).await?;
        Ok(self.fetch_since(url, last_updated).await)
    }

    pub async fn fetch_since(&self, url: &str, since: Option<DateTime<Utc>>) -> FetchOutcome {
        let mut request = self.client.get(url);
        if let Some(since) = since {
            request = request.header(IF_MODIFIED_SINCE, http_date(since));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Unreachable(Unreachable::Transport(e.to_string())),
        };

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return FetchOutcome::Unchanged;
        }
        if !status.is_success() {
            return FetchOutcome::Unreachable(Unreachable::Status(status.as_u16()));
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return FetchOutcome::Unreachable(Unreachable::Transport(e.to_string())),
        };

        match parse_feed(&bytes[..]) {
            Ok(document) => FetchOutcome::Updated(document),
            Err(e) => FetchOutcome::Unreachable(Unreachable::Malformed(e.to_string())),
        }
    }
}

/// IMF-fixdate, the preferred HTTP date format (RFC 9110 §5.6.7).
pub fn http_date(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

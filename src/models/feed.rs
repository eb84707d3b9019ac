use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    /// The URL of the feed document itself (ie example.com/index.xml)
    pub url: String,
    /// The site the feed belongs to (ie https://example.com)
    pub site_url: String,
    pub title: String,
    pub description: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// Feed metadata as written by ingestion. Tags are never part of it.
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    pub url: String,
    pub title: String,
    pub description: String,
    pub synced_at: DateTime<Utc>,
}

pub fn site_url(feed_url: &str) -> String {
    match url::Url::parse(feed_url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => format!("https://{}", host),
            None => feed_url.to_string(),
        },
        Err(_) => feed_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_url_keeps_only_host() {
        assert_eq!(site_url("http://mbund.dev/index.xml"), "https://mbund.dev");
        assert_eq!(site_url("not a url"), "not a url");
    }
}

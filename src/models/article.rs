use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    /// `url` query-escaped, safe to embed in generated links.
    pub escaped_url: String,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub read: bool,
    pub dead_link: bool,
    pub archive: Option<String>,
    pub comments: Vec<CommentLink>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub url: String,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
}

/// A discussion link for an article, labelled with the title of the feed it was seen in.
///
/// Rows are keyed by the comments URL alone, so an article carried by several feeds only
/// keeps the first feed that reported a given comments URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentLink {
    pub url: String,
    pub feed_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub favorite: bool,
}

pub fn escape_url(url: &str) -> String {
    url::form_urlencoded::byte_serialize(url.as_bytes()).collect()
}

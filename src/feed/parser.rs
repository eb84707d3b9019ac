use crate::error::{AppError, Result};

/// A feed normalized from whatever syndication format the server returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDocument {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    /// Raw date text as published (RFC 2822 for RSS, RFC 3339 for Atom).
    pub pub_date: Option<String>,
    /// External discussion page, RSS `<comments>`.
    pub comments: Option<String>,
}

/// Parses RSS 2.0 first, since only RSS carries comment links, then anything `feed-rs` knows.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument> {
    match rss::Channel::read_from(bytes) {
        Ok(channel) => Ok(from_rss(channel)),
        Err(rss_err) => match feed_rs::parser::parse(bytes) {
            Ok(feed) => Ok(from_feed_rs(feed)),
            Err(err) => Err(AppError::FeedParse(format!("{}; {}", rss_err, err))),
        },
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn from_rss(channel: rss::Channel) -> FeedDocument {
    FeedDocument {
        title: channel.title().to_string(),
        description: channel.description().to_string(),
        link: non_empty(Some(channel.link())),
        items: channel
            .items()
            .iter()
            .map(|item| FeedItem {
                title: item.title().map(str::to_string),
                link: non_empty(item.link()),
                description: item.description().map(str::to_string),
                pub_date: non_empty(item.pub_date()),
                comments: non_empty(item.comments()),
            })
            .collect(),
    }
}

fn from_feed_rs(feed: feed_rs::model::Feed) -> FeedDocument {
    FeedDocument {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        description: feed.description.map(|t| t.content).unwrap_or_default(),
        link: feed.links.first().map(|l| l.href.clone()),
        items: feed
            .entries
            .into_iter()
            .map(|entry| FeedItem {
                title: entry.title.map(|t| t.content),
                link: entry.links.first().map(|l| l.href.clone()),
                description: entry.summary.map(|s| s.content),
                pub_date: entry.published.or(entry.updated).map(|dt| dt.to_rfc3339()),
                comments: None,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <link>https://example.com/</link>
    <description>An example feed</description>
    <item>
      <title>A</title>
      <link>https://example.com/a</link>
      <pubDate>Mon, 21 Oct 2024 07:28:00 GMT</pubDate>
      <comments>https://news.example.com/item?id=1</comments>
    </item>
    <item>
      <title>B</title>
      <link>https://example.com/b</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <subtitle>Atom description</subtitle>
  <link href="https://atom.example.com/"/>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2024-10-21T07:28:00Z</updated>
  <entry>
    <title>Entry</title>
    <link href="https://atom.example.com/entry"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2024-10-21T07:28:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items_with_comments() {
        let doc = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(doc.title, "Example");
        assert_eq!(doc.description, "An example feed");
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].link.as_deref(), Some("https://example.com/a"));
        assert_eq!(
            doc.items[0].comments.as_deref(),
            Some("https://news.example.com/item?id=1")
        );
        assert_eq!(
            doc.items[0].pub_date.as_deref(),
            Some("Mon, 21 Oct 2024 07:28:00 GMT")
        );
        assert_eq!(doc.items[1].comments, None);
        assert_eq!(doc.items[1].pub_date, None);
    }

    #[test]
    fn falls_back_to_atom() {
        let doc = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(doc.title, "Atom Example");
        assert_eq!(doc.items.len(), 1);
        assert_eq!(
            doc.items[0].link.as_deref(),
            Some("https://atom.example.com/entry")
        );
        assert!(doc.items[0].pub_date.is_some());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_feed(b"<html><body>not a feed</body></html>"),
            Err(AppError::FeedParse(_))
        ));
    }
}

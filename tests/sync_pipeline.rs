use feedvault::archive::Archiver;
use feedvault::db::{ArchiveScope, Repository};
use feedvault::feed::{ingest, parse_feed, sync_feed, FeedFetcher, SyncOutcome};
use reqwest::Client;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_URL: &str = "https://example.com/feed";

fn one_item_feed(comments: Option<&str>) -> String {
    let comments = comments
        .map(|url| format!("<comments>{}</comments>", url))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <link>https://example.com/</link>
    <description>Example feed</description>
    <item>
      <title>A</title>
      <link>https://example.com/a</link>
      <pubDate>Mon, 21 Oct 2024 07:28:00 GMT</pubDate>
      {}
    </item>
  </channel>
</rss>"#,
        comments
    )
}

async fn test_repo() -> (Repository, TempDir) {
    let tmpdir = tempfile::tempdir().unwrap();
    let repo = Repository::new(tmpdir.path().join("feedvault.db").to_string_lossy().as_ref())
        .await
        .unwrap();
    (repo, tmpdir)
}

#[tokio::test]
async fn repeated_ingestion_then_comment_link() {
    let (repo, _tmpdir) = test_repo().await;
    let plain = parse_feed(one_item_feed(None).as_bytes()).unwrap();

    ingest(&repo, FEED_URL, &plain).await.unwrap();
    ingest(&repo, FEED_URL, &plain).await.unwrap();
    let stats = repo.stats().await.unwrap();
    assert_eq!((stats.feeds, stats.articles, stats.comment_links), (1, 1, 0));

    let with_comments =
        parse_feed(one_item_feed(Some("https://news.example.com/item?id=1")).as_bytes()).unwrap();
    let report = ingest(&repo, FEED_URL, &with_comments).await.unwrap();
    assert_eq!(report.articles_added, 0);
    assert_eq!(report.comments_added, 1);

    let stats = repo.stats().await.unwrap();
    assert_eq!((stats.feeds, stats.articles, stats.comment_links), (1, 1, 1));

    let article = repo.get_article("https://example.com/a").await.unwrap().unwrap();
    assert_eq!(article.title, "A");
    assert_eq!(article.comments.len(), 1);
    assert_eq!(article.comments[0].feed_title, "Example");
}

#[tokio::test]
async fn tagged_article_is_searchable_and_archived() {
    let server = MockServer::start().await;
    let article_url = format!("{}/posts/rust", server.uri());
    let feed = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Blog</title><link>{base}</link><description>d</description>
<item><title>Why Rust</title><link>{article}</link></item>
<item><title>Gardening</title><link>{base}/posts/garden</link></item>
</channel></rss>"#,
        base = server.uri(),
        article = article_url
    );
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(feed, "application/rss+xml"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts/rust"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body><article><h1>Why Rust</h1><p>Because memory safety without a \
             garbage collector, fearless concurrency, and a helpful compiler.</p></article></body></html>",
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;

    let (repo, _tmpdir) = test_repo().await;
    let client = Client::new();
    let feed_url = format!("{}/feed.xml", server.uri());
    repo.add_feed(&feed_url).await.unwrap();

    let outcome = sync_feed(&repo, &FeedFetcher::new(client.clone()), &feed_url)
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::Updated(report) if report.articles_added == 2));

    repo.add_tag(&article_url, "later").await.unwrap();
    let hits = repo.search_articles("#later rust").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, article_url);
    assert!(repo.search_articles("bad tag!").await.unwrap().is_empty());

    let report = Archiver::new(client)
        .run_pass(&repo, ArchiveScope::Pending)
        .await
        .unwrap();
    assert_eq!(report.archived, 1);
    let archived = repo.get_article(&article_url).await.unwrap().unwrap();
    assert!(!archived.archive.unwrap().trim().is_empty());
    assert!(!archived.dead_link);
    assert!(repo
        .archive_candidates(ArchiveScope::Pending)
        .await
        .unwrap()
        .is_empty());
}

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::db::{ArchiveScope, Repository};
use crate::error::Result;

use super::convert::{Converter, ReadableText};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived,
    DeadLink,
    NotHtml,
    ConversionFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub archived: usize,
    pub dead_links: usize,
    pub not_html: usize,
    pub conversion_failed: usize,
}

impl ArchiveReport {
    fn record(&mut self, outcome: ArchiveOutcome) {
        match outcome {
            ArchiveOutcome::Archived => self.archived += 1,
            ArchiveOutcome::DeadLink => self.dead_links += 1,
            ArchiveOutcome::NotHtml => self.not_html += 1,
            ArchiveOutcome::ConversionFailed => self.conversion_failed += 1,
        }
    }
}

/// Keeps readable copies of tagged articles and tracks which of them stopped resolving.
#[derive(Clone)]
pub struct Archiver {
    client: Client,
    converter: Arc<dyn Converter>,
}

impl Archiver {
    pub fn new(client: Client) -> Self {
        Self::with_converter(client, Arc::new(ReadableText))
    }

    pub fn with_converter(client: Client, converter: Arc<dyn Converter>) -> Self {
        Self { client, converter }
    }

    /// One pass over the current candidates. Each candidate is tried once; failures wait
    /// for the next pass.
    pub async fn run_pass(&self, repo: &Repository, scope: ArchiveScope) -> Result<ArchiveReport> {
        let candidates = repo.archive_candidates(scope).await?;
        let mut report = ArchiveReport::default();

        for url in candidates {
            match self.archive_article(repo, &url).await {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    tracing::error!(article = %url, error = %err, "unable to record archive result");
                }
            }
        }

        tracing::info!(
            archived = report.archived,
            dead_links = report.dead_links,
            not_html = report.not_html,
            conversion_failed = report.conversion_failed,
            "archive pass finished"
        );
        Ok(report)
    }

    /// Fetches and archives a single article. Errors are storage failures only.
    pub async fn archive_article(&self, repo: &Repository, url: &str) -> Result<ArchiveOutcome> {
        let response = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(article = %url, status = response.status().as_u16(), "dead link");
                repo.mark_dead_link(url).await?;
                return Ok(ArchiveOutcome::DeadLink);
            }
            Err(err) => {
                tracing::warn!(article = %url, error = %err, "dead link");
                repo.mark_dead_link(url).await?;
                return Ok(ArchiveOutcome::DeadLink);
            }
        };

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_html(&content_type) {
            tracing::debug!(article = %url, content_type = %content_type, "not archivable");
            return Ok(ArchiveOutcome::NotHtml);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(article = %url, error = %err, "dead link");
                repo.mark_dead_link(url).await?;
                return Ok(ArchiveOutcome::DeadLink);
            }
        };

        let converter = Arc::clone(&self.converter);
        let page_url = url.to_string();
        let converted = tokio::task::spawn_blocking(move || converter.convert(&body, &page_url))
            .await
            .map_err(|e| anyhow::anyhow!("conversion task failed: {}", e))?;

        match converted {
            Ok(text) => {
                repo.save_archive(url, text).await?;
                Ok(ArchiveOutcome::Archived)
            }
            Err(err) => {
                tracing::error!(article = %url, error = %err, "error converting to markdown");
                Ok(ArchiveOutcome::ConversionFailed)
            }
        }
    }
}

fn is_html(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("text/html") || essence.eq_ignore_ascii_case("application/xhtml+xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::NewArticle;
    use chrono::Utc;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><head><title>Page</title></head><body><article>
        <h1>Archived heading</h1>
        <p>This paragraph is long enough for the readability scorer to consider it content,
           with several commas, clauses, and words that make the page look like an article.</p>
        <p>A second paragraph keeps the extraction honest, and adds more text, more commas,
           and more reasons for the scorer to pick this node as the main candidate.</p>
        </article></body></html>"#;

    struct FailingConverter;

    impl Converter for FailingConverter {
        fn convert(&self, _html: &str, _page_url: &str) -> Result<String> {
            Err(AppError::Conversion("boom".into()))
        }
    }

    async fn repo_with_article(url: &str, tags: &[&str]) -> (Repository, TempDir) {
        let tmpdir = tempfile::tempdir().unwrap();
        let repo = Repository::new(tmpdir.path().join("t.db").to_string_lossy().as_ref())
            .await
            .unwrap();
        repo.insert_article_if_absent(NewArticle {
            url: url.into(),
            title: "t".into(),
            description: String::new(),
            published_at: Utc::now(),
        })
        .await
        .unwrap();
        for tag in tags {
            repo.add_tag(url, tag).await.unwrap();
        }
        (repo, tmpdir)
    }

    #[test]
    fn html_detection_ignores_parameters_and_case() {
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("TEXT/HTML"));
        assert!(is_html("application/xhtml+xml"));
        assert!(!is_html("application/pdf"));
        assert!(!is_html(""));
    }

    #[tokio::test]
    async fn untagged_articles_are_never_fetched() {
        let server = MockServer::start().await;
        let url = format!("{}/page", server.uri());
        let (repo, _tmpdir) = repo_with_article(&url, &[]).await;

        let report = Archiver::new(Client::new())
            .run_pass(&repo, ArchiveScope::Pending)
            .await
            .unwrap();
        assert_eq!(report, ArchiveReport::default());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_status_marks_dead_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let url = format!("{}/gone", server.uri());
        let (repo, _tmpdir) = repo_with_article(&url, &["later"]).await;

        let report = Archiver::new(Client::new())
            .run_pass(&repo, ArchiveScope::Pending)
            .await
            .unwrap();
        assert_eq!(report.dead_links, 1);

        let stored = repo.get_article(&url).await.unwrap().unwrap();
        assert!(stored.dead_link);
        assert!(stored.archive.is_none());
        assert!(repo
            .archive_candidates(ArchiveScope::Pending)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn recovered_dead_link_is_archived_and_unmarked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
            .mount(&server)
            .await;
        let url = format!("{}/page", server.uri());
        let (repo, _tmpdir) = repo_with_article(&url, &["later"]).await;
        repo.mark_dead_link(&url).await.unwrap();

        let report = Archiver::new(Client::new())
            .run_pass(&repo, ArchiveScope::RecheckDead)
            .await
            .unwrap();
        assert_eq!(report.archived, 1);

        let stored = repo.get_article(&url).await.unwrap().unwrap();
        assert!(!stored.dead_link);
        let archive = stored.archive.unwrap();
        assert!(archive.contains("paragraph"));
    }

    #[tokio::test]
    async fn non_html_is_skipped_without_marking_dead() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.7", "application/pdf"))
            .mount(&server)
            .await;
        let url = format!("{}/paper.pdf", server.uri());
        let (repo, _tmpdir) = repo_with_article(&url, &["reference"]).await;

        let outcome = Archiver::new(Client::new())
            .archive_article(&repo, &url)
            .await
            .unwrap();
        assert_eq!(outcome, ArchiveOutcome::NotHtml);

        let stored = repo.get_article(&url).await.unwrap().unwrap();
        assert!(!stored.dead_link);
        assert!(stored.archive.is_none());
    }

    #[tokio::test]
    async fn conversion_failure_leaves_article_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"))
            .mount(&server)
            .await;
        let url = format!("{}/page", server.uri());
        let (repo, _tmpdir) = repo_with_article(&url, &["later"]).await;
        repo.mark_dead_link(&url).await.unwrap();

        let archiver = Archiver::with_converter(Client::new(), Arc::new(FailingConverter));
        let outcome = archiver.archive_article(&repo, &url).await.unwrap();
        assert_eq!(outcome, ArchiveOutcome::ConversionFailed);

        let stored = repo.get_article(&url).await.unwrap().unwrap();
        assert!(stored.dead_link);
        assert!(stored.archive.is_none());
    }

    #[tokio::test]
    async fn unreachable_host_marks_dead_link() {
        let url = "http://127.0.0.1:1/article";
        let (repo, _tmpdir) = repo_with_article(url, &["later"]).await;

        let outcome = Archiver::new(Client::new())
            .archive_article(&repo, url)
            .await
            .unwrap();
        assert_eq!(outcome, ArchiveOutcome::DeadLink);
        assert!(repo.get_article(url).await.unwrap().unwrap().dead_link);
    }
}

use chrono::{DateTime, Utc};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{FeedUpdate, NewArticle};

use super::parser::{FeedDocument, FeedItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub articles_added: usize,
    pub comments_added: usize,
    pub items_skipped: usize,
}

/// Reconciles a parsed document with the store.
///
/// The feed row is upserted first; a failure there aborts the whole feed. Each item is
/// then handled on its own: a bad item is logged and skipped without affecting the rest.
/// Articles and comment-links are only ever inserted when absent, so replaying the same
/// document is a no-op.
pub async fn ingest(
    repo: &Repository,
    feed_url: &str,
    document: &FeedDocument,
) -> Result<IngestReport> {
    repo.upsert_feed(FeedUpdate {
        url: feed_url.to_string(),
        title: document.title.clone(),
        description: document.description.clone(),
        synced_at: Utc::now(),
    })
    .await?;

    let mut report = IngestReport::default();

    for item in &document.items {
        let article = match article_from_item(item) {
            Ok(article) => article,
            Err(err) => {
                tracing::warn!(feed = %feed_url, error = %err, "skipping feed item");
                report.items_skipped += 1;
                continue;
            }
        };
        let article_url = article.url.clone();

        match repo.insert_article_if_absent(article).await {
            Ok(true) => report.articles_added += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(
                    feed = %feed_url,
                    article = %article_url,
                    constraint = err.is_constraint_violation(),
                    error = %err,
                    "unable to add article"
                );
                report.items_skipped += 1;
                continue;
            }
        }

        let Some(comments) = item.comments.as_deref() else {
            continue;
        };
        match repo
            .insert_comment_link_if_absent(&article_url, feed_url, comments)
            .await
        {
            Ok(true) => report.comments_added += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(
                    feed = %feed_url,
                    article = %article_url,
                    comments,
                    error = %err,
                    "unable to add comments"
                );
            }
        }
    }

    Ok(report)
}

fn article_from_item(item: &FeedItem) -> Result<NewArticle> {
    let url = item
        .link
        .clone()
        .ok_or_else(|| AppError::FeedParse("item has no link".to_string()))?;

    let published_at = match item.pub_date.as_deref() {
        Some(raw) => parse_pub_date(raw)
            .ok_or_else(|| AppError::FeedParse(format!("malformed pubDate `{}` on {}", raw, url)))?,
        None => Utc::now(),
    };

    Ok(NewArticle {
        title: item.title.clone().unwrap_or_default(),
        description: item.description.clone().unwrap_or_default(),
        published_at,
        url,
    })
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{escape_url, site_url, Article, CommentLink, Feed, FeedUpdate, NewArticle, Tag};
use crate::search;

use super::schema::SCHEMA;

const ARTICLE_COLUMNS: &str = "articles.url, articles.title, articles.description, articles.pubdate, \
     articles.tags, articles.read, articles.dead_link, articles.archive";

/// Which tagged, unarchived articles the archival worker should look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveScope {
    /// Articles not flagged as dead links.
    Pending,
    /// Also articles flagged as dead links, so recovered pages get archived.
    RecheckDead,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub feeds: i64,
    pub articles: i64,
    pub comment_links: i64,
    pub archived: i64,
    pub dead_links: i64,
}

/// Typed access to the store. Cloning is cheap and shares the same background connection.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            // Set busy timeout to 5 seconds to handle concurrent access
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Feed operations

    /// Registers a feed URL with empty metadata. Returns false when it is already known.
    pub async fn add_feed(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "INSERT INTO feeds (url) VALUES (?1) ON CONFLICT(url) DO NOTHING",
                    params![url],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    /// Inserts the feed, or refreshes title, description and sync time. Tags stay untouched.
    pub async fn upsert_feed(&self, feed: FeedUpdate) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO feeds (url, title, description, last_updated)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(url) DO UPDATE SET
                           title = excluded.title,
                           description = excluded.description,
                           last_updated = excluded.last_updated"#,
                    params![
                        feed.url,
                        feed.title,
                        feed.description,
                        feed.synced_at.to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn feed_last_updated(&self, url: &str) -> Result<Option<DateTime<Utc>>> {
        let url = url.to_string();
        let last_updated = self
            .conn
            .call(move |conn| {
                let value: Option<Option<String>> = conn
                    .query_row(
                        "SELECT last_updated FROM feeds WHERE url = ?1",
                        params![url],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value.flatten())
            })
            .await?;
        Ok(last_updated.and_then(|s| parse_datetime(&s)))
    }

    pub async fn feed_urls(&self) -> Result<Vec<String>> {
        let urls = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT url FROM feeds ORDER BY url")?;
                let urls = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await?;
        Ok(urls)
    }

    pub async fn feeds(&self) -> Result<Vec<Feed>> {
        let feeds = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT url, title, description, last_updated, tags FROM feeds ORDER BY title, url",
                )?;
                let feeds = stmt
                    .query_map([], feed_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    pub async fn get_feed(&self, url: &str) -> Result<Option<Feed>> {
        let url = url.to_string();
        let feed = self
            .conn
            .call(move |conn| {
                let feed = conn
                    .query_row(
                        "SELECT url, title, description, last_updated, tags FROM feeds WHERE url = ?1",
                        params![url],
                        feed_from_row,
                    )
                    .optional()?;
                Ok(feed)
            })
            .await?;
        Ok(feed)
    }

    /// Deletes a feed and its comment-links. Articles it produced are kept.
    pub async fn remove_feed(&self, url: &str) -> Result<()> {
        let owned = url.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM comments WHERE feed = ?1", params![owned])?;
                let removed = tx.execute("DELETE FROM feeds WHERE url = ?1", params![owned])?;
                tx.commit()?;
                Ok(removed)
            })
            .await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("feed {}", url)));
        }
        Ok(())
    }

    // Article operations

    /// Inserts the article unless its URL is already stored; existing rows keep their state.
    pub async fn insert_article_if_absent(&self, article: NewArticle) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO articles (url, title, description, pubdate)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(url) DO NOTHING"#,
                    params![
                        article.url,
                        article.title,
                        article.description,
                        article.published_at.to_rfc3339()
                    ],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn insert_comment_link_if_absent(
        &self,
        article_url: &str,
        feed_url: &str,
        comments_url: &str,
    ) -> Result<bool> {
        let (article_url, feed_url, comments_url) = (
            article_url.to_string(),
            feed_url.to_string(),
            comments_url.to_string(),
        );
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO comments (comments_url, article, feed)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(comments_url) DO NOTHING"#,
                    params![comments_url, article_url, feed_url],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    /// Stores a bookmarked page as an already-read article tagged `bookmark`.
    pub async fn add_bookmark(&self, url: &str, title: &str) -> Result<bool> {
        let (url, title) = (url.to_string(), title.to_string());
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO tags (name) VALUES ('bookmark') ON CONFLICT(name) DO NOTHING",
                    [],
                )?;
                let changed = tx.execute(
                    r#"INSERT INTO articles (url, title, description, pubdate, tags, read)
                       VALUES (?1, ?2, '', ?3, '["bookmark"]', 1)
                       ON CONFLICT(url) DO NOTHING"#,
                    params![url, title, now],
                )?;
                tx.commit()?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn mark_read(&self, url: &str) -> Result<()> {
        let owned = url.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("UPDATE articles SET read = 1 WHERE url = ?1", params![owned])?)
            })
            .await?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("article {}", url)));
        }
        Ok(())
    }

    pub async fn add_tag(&self, url: &str, tag: &str) -> Result<()> {
        self.tag_article(url, tag, false).await
    }

    pub async fn tag_and_mark_read(&self, url: &str, tag: &str) -> Result<()> {
        self.tag_article(url, tag, true).await
    }

    async fn tag_article(&self, url: &str, tag: &str, mark_read: bool) -> Result<()> {
        validate_tag(tag)?;
        let (owned_url, tag) = (url.to_string(), tag.to_string());
        let changed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                    params![tag],
                )?;
                let changed = tx.execute(
                    r#"UPDATE articles SET tags = CASE
                           WHEN EXISTS (SELECT 1 FROM json_each(articles.tags) WHERE value = ?1)
                               THEN tags
                           ELSE json_insert(tags, '$[#]', ?1)
                       END
                       WHERE url = ?2"#,
                    params![tag, owned_url],
                )?;
                if changed == 0 {
                    return Ok(0);
                }
                if mark_read {
                    tx.execute(
                        "UPDATE articles SET read = 1 WHERE url = ?1",
                        params![owned_url],
                    )?;
                }
                tx.commit()?;
                Ok(changed)
            })
            .await?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("article {}", url)));
        }
        Ok(())
    }

    pub async fn remove_tag(&self, url: &str, tag: &str) -> Result<()> {
        validate_tag(tag)?;
        let (owned_url, tag) = (url.to_string(), tag.to_string());
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"UPDATE articles SET tags = (
                           SELECT json_group_array(value)
                           FROM json_each(articles.tags)
                           WHERE value != ?1
                       )
                       WHERE url = ?2"#,
                    params![tag, owned_url],
                )?;
                Ok(changed)
            })
            .await?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("article {}", url)));
        }
        Ok(())
    }

    /// `name` adds the tag, `-name` removes it.
    pub async fn edit_tag(&self, url: &str, edit: &str) -> Result<()> {
        match edit.strip_prefix('-') {
            Some(tag) => self.remove_tag(url, tag).await,
            None => self.add_tag(url, edit).await,
        }
    }

    pub async fn tags(&self) -> Result<Vec<Tag>> {
        let tags = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT name, favorite FROM tags ORDER BY name")?;
                let tags = stmt
                    .query_map([], |row| {
                        Ok(Tag {
                            name: row.get(0)?,
                            favorite: row.get(1)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await?;
        Ok(tags)
    }

    pub async fn favorite_tags(&self) -> Result<Vec<String>> {
        Ok(self
            .tags()
            .await?
            .into_iter()
            .filter(|tag| tag.favorite)
            .map(|tag| tag.name)
            .collect())
    }

    // Article queries for the presentation layer

    pub async fn unread_articles(&self, limit: usize) -> Result<Vec<Article>> {
        self.articles_by_read_state(false, limit).await
    }

    pub async fn read_articles(&self, limit: usize) -> Result<Vec<Article>> {
        self.articles_by_read_state(true, limit).await
    }

    async fn articles_by_read_state(&self, read: bool, limit: usize) -> Result<Vec<Article>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM articles WHERE read = ?1 ORDER BY pubdate DESC LIMIT ?2",
                    ARTICLE_COLUMNS
                );
                Ok(load_articles(conn, &sql, params![read, limit])?)
            })
            .await?;
        Ok(articles)
    }

    /// Runs a free-text query. An invalid query yields no results rather than an error.
    pub async fn search_articles(&self, query: &str) -> Result<Vec<Article>> {
        let predicate = match search::compile(query) {
            Ok(predicate) => predicate,
            Err(err) => {
                tracing::warn!(query, error = %err, "rejected search query");
                return Ok(Vec::new());
            }
        };
        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM articles WHERE {} ORDER BY pubdate DESC",
                    ARTICLE_COLUMNS,
                    predicate.sql()
                );
                Ok(load_articles(
                    conn,
                    &sql,
                    params_from_iter(predicate.params().iter()),
                )?)
            })
            .await?;
        Ok(articles)
    }

    pub async fn get_article(&self, url: &str) -> Result<Option<Article>> {
        let url = url.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM articles WHERE url = ?1", ARTICLE_COLUMNS);
                let mut articles = load_articles(conn, &sql, params![url])?;
                Ok(articles.pop())
            })
            .await?;
        Ok(article)
    }

    // Archival

    pub async fn archive_candidates(&self, scope: ArchiveScope) -> Result<Vec<String>> {
        let include_dead = scope == ArchiveScope::RecheckDead;
        let urls = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT url FROM articles
                       WHERE json_array_length(tags) > 0
                         AND archive IS NULL
                         AND (dead_link = 0 OR ?1)
                       ORDER BY pubdate DESC"#,
                )?;
                let urls = stmt
                    .query_map(params![include_dead], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await?;
        Ok(urls)
    }

    pub async fn mark_dead_link(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET dead_link = 1 WHERE url = ?1",
                    params![url],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Stores the archived text and clears any earlier dead-link flag.
    pub async fn save_archive(&self, url: &str, text: String) -> Result<()> {
        let url = url.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET archive = ?1, dead_link = 0 WHERE url = ?2",
                    params![text, url],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let stats = self
            .conn
            .call(|conn| {
                let stats = conn.query_row(
                    r#"SELECT
                           (SELECT COUNT(*) FROM feeds),
                           (SELECT COUNT(*) FROM articles),
                           (SELECT COUNT(*) FROM comments),
                           (SELECT COUNT(*) FROM articles WHERE archive IS NOT NULL),
                           (SELECT COUNT(*) FROM articles WHERE dead_link = 1)"#,
                    [],
                    |row| {
                        Ok(StoreStats {
                            feeds: row.get(0)?,
                            articles: row.get(1)?,
                            comment_links: row.get(2)?,
                            archived: row.get(3)?,
                            dead_links: row.get(4)?,
                        })
                    },
                )?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }
}

fn validate_tag(tag: &str) -> Result<()> {
    if search::is_valid_word(tag) {
        Ok(())
    } else {
        Err(AppError::InvalidTag(tag.to_string()))
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn tags_from_json(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn pubdate_from_row(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unparseable pubdate `{}`", raw).into(),
        )
    })
}

fn feed_from_row(row: &Row) -> rusqlite::Result<Feed> {
    let url: String = row.get(0)?;
    Ok(Feed {
        site_url: site_url(&url),
        url,
        title: row.get(1)?,
        description: row.get(2)?,
        last_updated: row
            .get::<_, Option<String>>(3)?
            .and_then(|s| parse_datetime(&s)),
        tags: tags_from_json(row, 4)?,
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    let url: String = row.get(0)?;
    Ok(Article {
        escaped_url: escape_url(&url),
        url,
        title: row.get(1)?,
        description: row.get(2)?,
        published_at: pubdate_from_row(row, 3)?,
        tags: tags_from_json(row, 4)?,
        read: row.get(5)?,
        dead_link: row.get(6)?,
        archive: row.get(7)?,
        comments: Vec::new(),
    })
}

fn load_articles<P: rusqlite::Params>(
    conn: &rusqlite::Connection,
    sql: &str,
    params: P,
) -> rusqlite::Result<Vec<Article>> {
    let mut stmt = conn.prepare(sql)?;
    let mut articles = stmt
        .query_map(params, article_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut comments_stmt = conn.prepare_cached(
        r#"SELECT comments.comments_url, COALESCE(feeds.title, comments.feed)
           FROM comments
           LEFT JOIN feeds ON comments.feed = feeds.url
           WHERE comments.article = ?1
           ORDER BY comments.comments_url"#,
    )?;
    for article in &mut articles {
        article.comments = comments_stmt
            .query_map(params![article.url], |row| {
                Ok(CommentLink {
                    url: row.get(0)?,
                    feed_title: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
    }
    Ok(articles)
}

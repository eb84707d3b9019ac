/// Tag sets are JSON arrays stored as TEXT and edited with the SQLite JSON functions.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS feeds (
    url TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    last_updated TEXT,
    tags TEXT NOT NULL DEFAULT '[]' CHECK (json_valid(tags))
);

CREATE TABLE IF NOT EXISTS articles (
    url TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    pubdate TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]' CHECK (json_valid(tags)),
    read INTEGER NOT NULL DEFAULT 0,
    dead_link INTEGER NOT NULL DEFAULT 0,
    archive TEXT
);

CREATE INDEX IF NOT EXISTS idx_articles_read_pubdate ON articles(read, pubdate DESC);

CREATE TABLE IF NOT EXISTS comments (
    comments_url TEXT PRIMARY KEY,
    article TEXT NOT NULL,
    feed TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_article ON comments(article);
CREATE INDEX IF NOT EXISTS idx_comments_feed ON comments(feed);

CREATE TABLE IF NOT EXISTS tags (
    name TEXT PRIMARY KEY,
    favorite INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO tags (name, favorite) VALUES
    ('later', 1),
    ('favorite', 1),
    ('reference', 1),
    ('archive', 1);
"#;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Feed parsing failed: {0}")]
    FeedParse(String),

    #[error("HTML conversion failed: {0}")]
    Conversion(String),

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True when the store rejected a write because of a uniqueness, NOT NULL or CHECK rule.
    pub fn is_constraint_violation(&self) -> bool {
        let sqlite = match self {
            AppError::Sqlite(err) => Some(err),
            AppError::Database(tokio_rusqlite::Error::Rusqlite(err)) => Some(err),
            _ => None,
        };
        matches!(
            sqlite.and_then(rusqlite::Error::sqlite_error_code),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

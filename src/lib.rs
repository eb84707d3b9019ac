//! Feed synchronization, archival and search over a local SQLite store.
//!
//! The scheduler periodically fetches every known feed with a conditional GET, ingests new
//! articles and comment links idempotently, then archives tagged articles as readable text.
//! Readers query the store through [`db::Repository`].

pub mod archive;
pub mod bookmark;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod scheduler;
pub mod search;

pub use config::Config;
pub use db::Repository;
pub use error::{AppError, Result};

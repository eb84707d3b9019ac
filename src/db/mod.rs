mod repository;
mod schema;

pub use repository::{ArchiveScope, Repository, StoreStats};

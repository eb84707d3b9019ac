mod convert;
mod worker;

pub use convert::{Converter, ReadableText};
pub use worker::{ArchiveOutcome, ArchiveReport, Archiver};

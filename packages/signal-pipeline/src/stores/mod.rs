//! Storage implementations.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage (always available)
//! - `SqliteStore` - SQLite file-based storage (requires `sqlite` feature)
//! - `PostgresStore` - PostgreSQL storage (requires `postgres` feature)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
use crate::types::job::CountEntry;

/// `%needle%` for a case-insensitive LIKE, metacharacters escaped by `\`.
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn to_entries(rows: Vec<(String, i64)>) -> Vec<CountEntry> {
    rows.into_iter()
        .map(|(value, count)| CountEntry { value, count })
        .collect()
}

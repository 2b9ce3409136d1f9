//! SQLite-backed activity store: schema plus the per-entity upsert layer.

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStore, StoreStats};

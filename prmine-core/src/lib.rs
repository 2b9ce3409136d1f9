//! prmine core library: GraphQL API client, SQLite store, and sync engine.
//!
//! The main entry point is [`sync::SyncEngine`], which walks the paginated
//! pull-request feed of a repository and persists every page through
//! [`store::SqliteStore`].

pub mod api;
pub mod config;
pub mod error;
pub mod progress;
pub mod store;
pub mod sync;

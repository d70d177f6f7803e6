//! # Starwatch Store
//! SQLite persistence: repositories, subscribers, subscriptions, star history.

pub mod sqlite;

pub use sqlite::SqliteStore;

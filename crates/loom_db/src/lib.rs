//! SQLite persistence for the migration engine.
//!
//! Implements [`loom_core::MigrationStore`] on top of sqlx/SQLite. Schema
//! lives in `migrations/` and is applied on open. The claim that
//! serializes concurrent migrations of one deployment is a single
//! conditional UPDATE, so it is atomic under SQLite's writer lock.

pub mod connection;
pub mod error;
pub mod models;
pub mod queries;
pub mod store;

pub use connection::MigrationDb;
pub use error::{DbError, DbResult};
pub use store::SqliteMigrationStore;

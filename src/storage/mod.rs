//! `SQLite` persistence for aggregated playtime and monitor settings.

mod database;
mod error;
mod schema;
mod types;

pub use database::{default_database_path, Database, PlaytimeStore};
pub use error::StorageError;
pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use types::ExecutableDetails;

//! Macrogap Store: SQLite recipe catalog, nutrient lookup and vector cache table.

pub mod embedding;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;

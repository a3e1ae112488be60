//! Data models for the data-access layer.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::DatabaseType;
pub use query::{QueryParam, ResultRow, Statement};
pub use schema::{ColumnDef, ColumnKind, TableSchema, TableSchemaBuilder};

//! Awesome Web Library
//!
//! An async data-access layer over a bounded connection pool (MySQL, PostgreSQL,
//! SQLite) with portable `?` statements, transaction-safe writes and table
//! descriptors, plus the small HTTP front end that serves on top of it.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod server;

pub use config::{Config, PoolConfig};
pub use db::{Pool, Table, execute, execute_batch, select};
pub use error::{DbError, DbResult};
pub use models::{ColumnDef, QueryParam, ResultRow, Statement, TableSchema};

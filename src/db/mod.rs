//! Data-access layer.
//!
//! This module groups the connection pool, the placeholder binder, the read and
//! write executors and the table repository.

pub mod binder;
pub mod executor;
pub mod macros;
pub mod mutation;
pub mod params;
pub mod pool;
pub mod table;
pub mod types;

pub use executor::select;
pub use mutation::{execute, execute_batch};
pub use pool::{Pool, PoolStatus, ScopedConnection};
pub use table::Table;
pub use types::ToResultRow;

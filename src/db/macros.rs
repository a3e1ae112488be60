//! Backend dispatch macros.
//!
//! Pools and checked-out connections are both enums with one variant per
//! backend. These macros expand a per-variant body into the full match so call
//! sites read as one arm per backend.

/// Dispatch over the variants of [`DbPool`](crate::db::pool::DbPool).
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => p.size(),
///     Postgres(p) => p.size(),
///     SQLite(p) => p.size(),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

/// Dispatch over the variants of a checked-out connection.
///
/// The bound name is the `PoolConnection` of that backend.
#[macro_export]
macro_rules! impl_conn_dispatch {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::pool::DbConnection::$variant($c) => $body,
            )+
        }
    };
}

pub use impl_conn_dispatch;
pub use impl_db_dispatch;

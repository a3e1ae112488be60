//! Query execution.
//!
//! [`select`] runs a read statement on a checked-out connection and returns
//! decoded rows. The statement is bound first, so a placeholder/argument
//! mismatch never reaches the pool or the driver.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific fetch
//! - `postgres`: PostgreSQL-specific fetch
//! - `sqlite`: SQLite-specific fetch
//!
//! Each submodule provides identical functionality adapted to the database's type system.

use crate::db::binder;
use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::pool::Pool;
use crate::db::types::ToResultRow;
use crate::error::{DbError, DbResult};
use crate::impl_conn_dispatch;
use crate::models::{QueryParam, ResultRow, Statement};
use futures_util::{StreamExt, TryStreamExt};
use std::time::Instant;
use tracing::{debug, info};

/// Run a read statement and return up to `limit` rows (all rows when `None`
/// or `Some(0)`).
///
/// No matching rows is an empty vector, not an error. The connection goes back
/// to the pool whether or not the statement succeeds.
pub async fn select(
    pool: &Pool,
    statement: &Statement,
    limit: Option<usize>,
) -> DbResult<Vec<ResultRow>> {
    let args = statement.args();
    let sql = binder::bind(statement.sql(), args.len(), pool.backend())?;
    let fetch_limit = limit.filter(|&n| n > 0).unwrap_or(usize::MAX);

    info!(sql = %sql, args = args.len(), limit = ?limit, "SQL");

    let start = Instant::now();
    let mut conn = pool.acquire().await?;
    let rows = impl_conn_dispatch!(conn.connection(), {
        MySql(c) => mysql::fetch_rows(c, &sql, args, fetch_limit).await,
        Postgres(c) => postgres::fetch_rows(c, &sql, args, fetch_limit).await,
        SQLite(c) => sqlite::fetch_rows(c, &sql, args, fetch_limit).await,
    })
    .map_err(DbError::query)?;
    drop(conn);

    info!(rows = rows.len(), "rows returned");
    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Query finished");
    Ok(rows)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Statements without arguments go through the raw (unprepared) path; some
// statements cannot be prepared on every server.

mod mysql {
    use super::*;
    use sqlx::MySql;
    use sqlx::pool::PoolConnection;

    pub async fn fetch_rows(
        conn: &mut PoolConnection<MySql>,
        sql: &str,
        params: &[QueryParam],
        fetch_limit: usize,
    ) -> Result<Vec<ResultRow>, sqlx::Error> {
        let stream = if params.is_empty() {
            use sqlx::Executor;
            (&mut **conn).fetch(sql)
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            query.fetch(&mut **conn)
        };

        stream
            .take(fetch_limit)
            .map(|row| row.and_then(|row| row.to_result_row()))
            .try_collect()
            .await
    }
}

mod postgres {
    use super::*;
    use sqlx::Postgres;
    use sqlx::pool::PoolConnection;

    pub async fn fetch_rows(
        conn: &mut PoolConnection<Postgres>,
        sql: &str,
        params: &[QueryParam],
        fetch_limit: usize,
    ) -> Result<Vec<ResultRow>, sqlx::Error> {
        let stream = if params.is_empty() {
            use sqlx::Executor;
            (&mut **conn).fetch(sql)
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            query.fetch(&mut **conn)
        };

        stream
            .take(fetch_limit)
            .map(|row| row.and_then(|row| row.to_result_row()))
            .try_collect()
            .await
    }
}

mod sqlite {
    use super::*;
    use sqlx::Sqlite;
    use sqlx::pool::PoolConnection;

    pub async fn fetch_rows(
        conn: &mut PoolConnection<Sqlite>,
        sql: &str,
        params: &[QueryParam],
        fetch_limit: usize,
    ) -> Result<Vec<ResultRow>, sqlx::Error> {
        let stream = if params.is_empty() {
            use sqlx::Executor;
            (&mut **conn).fetch(sql)
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            query.fetch(&mut **conn)
        };

        stream
            .take(fetch_limit)
            .map(|row| row.and_then(|row| row.to_result_row()))
            .try_collect()
            .await
    }
}

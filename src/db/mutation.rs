//! Write execution with transaction control.
//!
//! A statement either runs in autocommit mode, where the server commits it on
//! its own, or inside an explicit transaction that is always committed or rolled
//! back before the connection leaves this module. A failed BEGIN, COMMIT or
//! ROLLBACK leaves the connection in an unknown state, so it is discarded
//! instead of returned to the pool.

use crate::db::binder;
use crate::db::pool::Pool;
use crate::error::{DbError, DbResult, TransactionStage};
use crate::impl_conn_dispatch;
use crate::models::{QueryParam, Statement};
use futures_util::future::BoxFuture;
use sqlx::Database;
use sqlx::pool::PoolConnection;
use tracing::{info, warn};

/// Run one write statement and return the affected-row count.
///
/// With `autocommit` false, or on a pool configured without autocommit, the
/// statement runs in its own explicit transaction. Execution failures are rolled
/// back and returned unchanged.
pub async fn execute(pool: &Pool, statement: &Statement, autocommit: bool) -> DbResult<u64> {
    let autocommit = autocommit && pool.autocommit();
    execute_statements(pool, std::slice::from_ref(statement), autocommit).await
}

/// Run several write statements in one explicit transaction.
///
/// Either every statement takes effect or none does. Returns the summed
/// affected-row count.
pub async fn execute_batch(pool: &Pool, statements: &[Statement]) -> DbResult<u64> {
    if statements.is_empty() {
        return Ok(0);
    }
    execute_statements(pool, statements, false).await
}

/// A statement rewritten for the pool's backend.
struct BoundStatement<'s> {
    sql: String,
    args: &'s [QueryParam],
}

/// Runs one bound statement on a backend connection.
type RunFn<DB> = for<'a> fn(
    &'a mut <DB as Database>::Connection,
    &'a str,
    &'a [QueryParam],
) -> BoxFuture<'a, Result<u64, sqlx::Error>>;

async fn execute_statements(
    pool: &Pool,
    statements: &[Statement],
    autocommit: bool,
) -> DbResult<u64> {
    let backend = pool.backend();
    let batch = statements
        .iter()
        .map(|s| {
            Ok(BoundStatement {
                sql: binder::bind(s.sql(), s.args().len(), backend)?,
                args: s.args(),
            })
        })
        .collect::<DbResult<Vec<_>>>()?;

    for stmt in &batch {
        info!(sql = %stmt.sql, args = stmt.args.len(), autocommit, "SQL");
    }

    let mut conn = pool.acquire().await?;
    let result = impl_conn_dispatch!(conn.connection(), {
        MySql(c) => run_batch(c, &batch, autocommit, mysql::run).await,
        Postgres(c) => run_batch(c, &batch, autocommit, postgres::run).await,
        SQLite(c) => run_batch(c, &batch, autocommit, sqlite::run).await,
    });

    match result {
        Ok(affected) => {
            info!(affected, "rows affected");
            Ok(affected)
        }
        Err(e) if e.requires_discard() => {
            warn!(error = %e, "Discarding connection after transaction failure");
            conn.discard().await;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

async fn run_batch<DB: Database>(
    conn: &mut PoolConnection<DB>,
    batch: &[BoundStatement<'_>],
    autocommit: bool,
    run: RunFn<DB>,
) -> DbResult<u64> {
    if autocommit {
        let mut affected = 0;
        for stmt in batch {
            affected += run(&mut **conn, &stmt.sql, stmt.args)
                .await
                .map_err(DbError::mutation)?;
        }
        return Ok(affected);
    }

    let mut tx = sqlx::Connection::begin(&mut **conn)
        .await
        .map_err(|e| DbError::transaction(TransactionStage::Begin, e, None))?;

    let mut affected = 0;
    for stmt in batch {
        match run(&mut *tx, &stmt.sql, stmt.args).await {
            Ok(n) => affected += n,
            Err(e) => {
                let err = DbError::mutation(e);
                warn!(error = %err, "Statement failed, rolling back");
                return match tx.rollback().await {
                    Ok(()) => Err(err),
                    Err(rollback_err) => Err(DbError::transaction(
                        TransactionStage::Rollback,
                        rollback_err,
                        Some(err),
                    )),
                };
            }
        }
    }

    tx.commit()
        .await
        .map_err(|e| DbError::transaction(TransactionStage::Commit, e, None))?;
    Ok(affected)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::MySqlConnection;

    pub fn run<'a>(
        conn: &'a mut MySqlConnection,
        sql: &'a str,
        params: &'a [QueryParam],
    ) -> BoxFuture<'a, Result<u64, sqlx::Error>> {
        Box::pin(async move {
            let result = if params.is_empty() {
                use sqlx::Executor;
                conn.execute(sql).await
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_mysql_param(query, param);
                }
                query.execute(conn).await
            };
            result.map(|r| r.rows_affected())
        })
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::PgConnection;

    pub fn run<'a>(
        conn: &'a mut PgConnection,
        sql: &'a str,
        params: &'a [QueryParam],
    ) -> BoxFuture<'a, Result<u64, sqlx::Error>> {
        Box::pin(async move {
            let result = if params.is_empty() {
                use sqlx::Executor;
                conn.execute(sql).await
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_postgres_param(query, param);
                }
                query.execute(conn).await
            };
            result.map(|r| r.rows_affected())
        })
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::SqliteConnection;

    pub fn run<'a>(
        conn: &'a mut SqliteConnection,
        sql: &'a str,
        params: &'a [QueryParam],
    ) -> BoxFuture<'a, Result<u64, sqlx::Error>> {
        Box::pin(async move {
            let result = if params.is_empty() {
                use sqlx::Executor;
                conn.execute(sql).await
            } else {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                query.execute(conn).await
            };
            result.map(|r| r.rows_affected())
        })
    }
}

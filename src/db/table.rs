//! Row-level repository over a table descriptor.
//!
//! [`Table`] turns a [`TableSchema`] into the usual find/save/update/remove
//! operations. Records are [`ResultRow`] maps keyed by column name. Filter and
//! ordering clauses are SQL fragments written by the application; any value in
//! them goes through `?` placeholders and `args`.

use crate::db::executor::select;
use crate::db::mutation::execute;
use crate::db::pool::Pool;
use crate::error::{DbError, DbResult};
use crate::models::schema::COUNT_ALIAS;
use crate::models::{QueryParam, ResultRow, Statement, TableSchema};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Table {
    pool: Pool,
    schema: Arc<TableSchema>,
}

impl Table {
    pub fn new(pool: Pool, schema: TableSchema) -> Self {
        Self {
            pool,
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Create the table if it does not exist yet.
    pub async fn create(&self) -> DbResult<()> {
        let sql = self.schema.create_table_sql(self.pool.backend());
        execute(&self.pool, &Statement::new(sql), true).await?;
        Ok(())
    }

    /// Find a record by primary key.
    pub async fn find(&self, pk: impl Into<QueryParam>) -> DbResult<Option<ResultRow>> {
        let backend = self.pool.backend();
        let sql = format!(
            "{} WHERE {} = ?",
            self.schema.select_sql(backend),
            backend.quote_ident(&self.schema.primary_key().name)
        );
        let rows = select(&self.pool, &Statement::new(sql).bind(pk), Some(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Find records matching an optional `filter`, e.g. `"name = ? AND admin = ?"`.
    pub async fn find_all(
        &self,
        filter: Option<&str>,
        args: Vec<QueryParam>,
        order_by: Option<&str>,
        limit: Option<usize>,
    ) -> DbResult<Vec<ResultRow>> {
        let mut sql = self.schema.select_sql(self.pool.backend());
        let mut args = args;
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        if let Some(order_by) = order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            let limit = i64::try_from(limit)
                .map_err(|_| DbError::configuration(format!("Invalid limit: {}", limit)))?;
            args.push(QueryParam::Int(limit));
        }
        select(&self.pool, &Statement::with_args(sql, args), None).await
    }

    /// Count records matching an optional `filter`.
    pub async fn count(&self, filter: Option<&str>, args: Vec<QueryParam>) -> DbResult<i64> {
        let mut sql = self.schema.count_sql(self.pool.backend());
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        let rows = select(&self.pool, &Statement::with_args(sql, args), Some(1)).await?;
        count_from_rows(self.schema.table(), &rows)
    }

    /// Insert a record. Columns missing from `record` take their default.
    pub async fn save(&self, record: &ResultRow) -> DbResult<u64> {
        let args = self
            .schema
            .columns()
            .iter()
            .map(|c| {
                record
                    .get(&c.name)
                    .map(QueryParam::from)
                    .unwrap_or_else(|| c.default.clone())
            })
            .collect();
        let sql = self.schema.insert_sql(self.pool.backend());
        let affected = execute(&self.pool, &Statement::with_args(sql, args), true).await?;
        if affected != 1 {
            warn!(table = %self.schema.table(), affected, "failed to insert record");
        }
        Ok(affected)
    }

    /// Update every non-key column of the record identified by its primary key.
    /// Columns missing from `record` are written as NULL.
    pub async fn update(&self, record: &ResultRow) -> DbResult<u64> {
        let pk = self.primary_key_value(record)?;
        let mut args: Vec<QueryParam> = self
            .schema
            .fields()
            .map(|c| record.get(&c.name).map(QueryParam::from).unwrap_or(QueryParam::Null))
            .collect();
        args.push(pk);
        let sql = self.schema.update_sql(self.pool.backend());
        let affected = execute(&self.pool, &Statement::with_args(sql, args), true).await?;
        if affected != 1 {
            warn!(table = %self.schema.table(), affected, "failed to update by primary key");
        }
        Ok(affected)
    }

    /// Delete a record by primary key.
    pub async fn remove(&self, pk: impl Into<QueryParam>) -> DbResult<u64> {
        let sql = self.schema.delete_sql(self.pool.backend());
        let affected = execute(&self.pool, &Statement::new(sql).bind(pk), true).await?;
        if affected != 1 {
            warn!(table = %self.schema.table(), affected, "failed to remove by primary key");
        }
        Ok(affected)
    }

    fn primary_key_value(&self, record: &ResultRow) -> DbResult<QueryParam> {
        let pk = &self.schema.primary_key().name;
        match record.get(pk).map(QueryParam::from) {
            Some(value) if !value.is_null() => Ok(value),
            _ => Err(DbError::configuration(format!(
                "Record for table '{}' has no value for primary key '{}'",
                self.schema.table(),
                pk
            ))),
        }
    }
}

fn count_from_rows(table: &str, rows: &[ResultRow]) -> DbResult<i64> {
    rows.first()
        .and_then(|row| row.get(COUNT_ALIAS))
        .and_then(|v| v.as_i64())
        .ok_or_else(|| {
            DbError::internal(format!(
                "count on '{}' returned no integer {} column",
                table, COUNT_ALIAS
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> ResultRow {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_count_reads_alias_column() {
        let rows = vec![row(json!({ "_num_": 7 }))];
        assert_eq!(count_from_rows("users", &rows).unwrap(), 7);
    }

    #[test]
    fn test_count_without_integer_column_is_an_error() {
        let missing = vec![row(json!({ "other": 7 }))];
        assert!(matches!(
            count_from_rows("users", &missing),
            Err(DbError::Internal { .. })
        ));

        let not_integer = vec![row(json!({ "_num_": "7" }))];
        assert!(matches!(
            count_from_rows("users", &not_integer),
            Err(DbError::Internal { .. })
        ));

        assert!(count_from_rows("users", &[]).is_err());
    }
}

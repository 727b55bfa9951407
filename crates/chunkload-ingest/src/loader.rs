//! Batch loading into the target store
//!
//! [`BatchSink`] is the seam between the pipeline driver and the store. The
//! SQLite implementation replaces the table on batch 0 and appends afterwards,
//! committing each batch in its own transaction: a failed batch leaves no rows
//! behind, while earlier batches stay committed.

use crate::batch::{Batch, Value};
use crate::error::LoadError;
use crate::schema::{quote_ident, TableSchema};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, Transaction};
use std::path::Path;
use tracing::{debug, error};

/// Maximum bound parameters per statement (SQLITE_MAX_VARIABLE_NUMBER)
const SQLITE_MAX_VARIABLES: usize = 32_766;

/// Destination for cleaned batches
#[async_trait]
pub trait BatchSink: Send {
    /// Write one batch atomically, returning the number of rows inserted
    ///
    /// `index` 0 replaces the table; later indexes append to it.
    async fn write_batch(&mut self, batch: &Batch, index: usize) -> Result<u64, LoadError>;
}

/// Loader writing batches into one table of a SQLite database
pub struct SqliteLoader {
    pool: SqlitePool,
    table: String,
}

impl SqliteLoader {
    /// Open (or create) the database file at `path`
    ///
    /// The pool holds a single connection; the loader is the only writer.
    pub async fn connect(path: impl AsRef<Path>, table: impl Into<String>) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool, table))
    }

    pub fn from_pool(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Release the connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Column names of the target table in declaration order; empty if the
    /// table does not exist
    pub async fn table_columns(&self) -> Result<Vec<String>, LoadError> {
        let rows = sqlx::query("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .bind(&self.table)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }

    /// Number of rows currently in the target table
    pub async fn row_count(&self) -> Result<i64, LoadError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn replace(&self, batch: &Batch) -> Result<u64, LoadError> {
        let schema = TableSchema::infer(&self.table, batch);
        let drop_sql = schema.drop_statement();
        let create_sql = schema.create_statement();

        let mut tx = self.pool.begin().await?;
        sqlx::query(&drop_sql).execute(&mut *tx).await?;
        sqlx::query(&create_sql).execute(&mut *tx).await?;
        let inserted = insert_rows(&mut tx, &self.table, batch).await?;
        tx.commit().await?;

        debug!(table = %self.table, rows = inserted, "Replaced table");
        Ok(inserted)
    }

    async fn append(&self, batch: &Batch) -> Result<u64, LoadError> {
        let existing = self.table_columns().await?;
        if existing.is_empty() {
            return Err(LoadError::MissingTable(self.table.clone()));
        }

        if existing.as_slice() != batch.columns() {
            return Err(LoadError::ColumnMismatch {
                table: self.table.clone(),
                expected: existing,
                found: batch.columns().to_vec(),
            });
        }

        let mut tx = self.pool.begin().await?;
        let inserted = insert_rows(&mut tx, &self.table, batch).await?;
        tx.commit().await?;

        debug!(table = %self.table, rows = inserted, "Appended to table");
        Ok(inserted)
    }
}

#[async_trait]
impl BatchSink for SqliteLoader {
    async fn write_batch(&mut self, batch: &Batch, index: usize) -> Result<u64, LoadError> {
        let result = if batch.columns().is_empty() {
            Err(LoadError::EmptyLayout)
        } else if index == 0 {
            self.replace(batch).await
        } else {
            self.append(batch).await
        };

        if let Err(ref e) = result {
            error!(table = %self.table, batch = index, error = %e, "Failed to insert batch");
        }
        result
    }
}

/// Insert every row of `batch` with multi-row INSERT statements
async fn insert_rows(
    tx: &mut Transaction<'static, Sqlite>,
    table: &str,
    batch: &Batch,
) -> Result<u64, LoadError> {
    if batch.is_empty() {
        return Ok(0);
    }

    let column_list = batch
        .columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let prefix = format!("INSERT INTO {} ({}) ", quote_ident(table), column_list);
    let rows_per_statement = (SQLITE_MAX_VARIABLES / batch.columns().len()).max(1);

    let mut inserted = 0;
    for chunk in batch.rows().chunks(rows_per_statement) {
        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(&prefix);

        query_builder.push_values(chunk, |mut b, row| {
            for value in row {
                match value {
                    Value::Null => b.push_bind(None::<String>),
                    Value::Text(s) => b.push_bind(s.as_str()),
                    Value::Integer(i) => b.push_bind(*i),
                    Value::Real(r) => b.push_bind(*r),
                    Value::Boolean(v) => b.push_bind(*v),
                };
            }
        });

        let result = query_builder.build().execute(&mut **tx).await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

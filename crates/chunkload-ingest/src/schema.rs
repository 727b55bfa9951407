//! Column type inference and the schema document
//!
//! Types are inferred once, from the first cleaned batch, and never
//! reconciled against later batches. A column that only holds integers in the
//! first batch stays INTEGER even if later rows carry text.

use crate::batch::{Batch, Value};
use crate::error::SchemaError;
use std::fmt;
use std::path::Path;
use tracing::{error, info};

/// SQL column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Boolean,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    /// Infer a column type from the values observed in a sample
    ///
    /// All integers → INTEGER; integers and reals → REAL; all booleans →
    /// BOOLEAN; anything else, including an empty sample, → TEXT.
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut inferred: Option<ColumnType> = None;

        for value in values {
            let observed = match value {
                Value::Integer(_) => ColumnType::Integer,
                Value::Real(_) => ColumnType::Real,
                Value::Boolean(_) => ColumnType::Boolean,
                Value::Text(_) | Value::Null => return ColumnType::Text,
            };

            inferred = Some(match (inferred, observed) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(ColumnType::Integer), ColumnType::Real)
                | (Some(ColumnType::Real), ColumnType::Integer) => ColumnType::Real,
                _ => return ColumnType::Text,
            });
        }

        inferred.unwrap_or(ColumnType::Text)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Inferred layout of the target table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<(String, ColumnType)>,
}

impl TableSchema {
    /// Infer the schema of `table` from a cleaned batch
    pub fn infer(table: impl Into<String>, batch: &Batch) -> Self {
        let columns = batch
            .columns()
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), ColumnType::infer(batch.column_values(index))))
            .collect();

        Self {
            table: table.into(),
            columns,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// `DROP TABLE IF EXISTS` statement for the table
    pub fn drop_statement(&self) -> String {
        format!("DROP TABLE IF EXISTS {};", quote_ident(&self.table))
    }

    /// `CREATE TABLE` statement, one line per column
    pub fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|(name, ty)| format!("    {} {}", quote_ident(name), ty))
            .collect::<Vec<_>>()
            .join(",\n");

        format!("CREATE TABLE {} (\n{}\n);", quote_ident(&self.table), columns)
    }

    /// Render the schema document: one DROP and one CREATE statement
    pub fn render(&self) -> String {
        format!("{}\n\n{}\n", self.drop_statement(), self.create_statement())
    }
}

/// Quote an SQL identifier unless it is a plain lower-case identifier
pub fn quote_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        },
        _ => false,
    };

    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Write the schema document to `path`, replacing any previous content
pub async fn write_schema_document(
    schema: &TableSchema,
    path: impl AsRef<Path>,
) -> Result<(), SchemaError> {
    let path = path.as_ref();
    let to_error = |source: std::io::Error| {
        error!(path = %path.display(), error = %source, "Failed to write schema document");
        SchemaError::Write {
            path: path.to_path_buf(),
            source,
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(to_error)?;
    }

    tokio::fs::write(path, schema.render()).await.map_err(to_error)?;

    info!(path = %path.display(), columns = schema.columns.len(), "Schema exported");
    Ok(())
}

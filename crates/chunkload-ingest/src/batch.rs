//! Row batches and scalar values
//!
//! A [`Batch`] is the unit that flows through the pipeline: an ordered list of
//! column names plus rows holding one [`Value`] per column, in column order.

use std::fmt;

/// Field contents read as missing data, in addition to the empty field
pub const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// A single CSV field after type detection
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing data (an empty field or a missing marker)
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
}

impl Value {
    /// Detect the type of a raw CSV field
    ///
    /// Empty fields and the exact [`MISSING_MARKERS`] are missing. Integers
    /// win over reals; infinities stay text so they survive the round trip
    /// to SQLite.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() || MISSING_MARKERS.contains(&raw) {
            return Value::Null;
        }

        if let Ok(i) = raw.parse::<i64>() {
            return Value::Integer(i);
        }

        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Value::Real(f);
            }
        }

        match raw {
            "true" | "True" | "TRUE" => Value::Boolean(true),
            "false" | "False" | "FALSE" => Value::Boolean(false),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Empty-string sentinel used in place of missing values
    pub fn empty() -> Self {
        Value::Text(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// An ordered group of rows sharing one column layout
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Batch {
    /// Create a batch, padding short rows with [`Value::Null`]
    ///
    /// Rows longer than the column list are truncated; the reader rejects
    /// such rows before they get here.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the values of one column
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }
}

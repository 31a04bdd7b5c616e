/// Query Values and Results Module
///
/// This module defines the dynamic SQL value type shared by every driver,
/// the named-placeholder binding used to keep values out of statement
/// text, and the tabular result a select materializes into.
use crate::core::{Result, SqlgateError};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Serialize, Serializer};
use std::fmt;

/// A dynamically typed SQL value.
///
/// `Value::Null` is the normalized representation of SQL NULL in results
/// and the way callers bind NULL as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(t) => write!(f, "{}", t),
            Value::Bytes(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(t) => serializer.serialize_str(t),
            Value::Bytes(b) => serializer.serialize_bytes(b),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T> From<Option<T>> for Value
where
    Value: From<T>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Value::from)
    }
}

/// Named parameters for one statement: parameter name to value.
pub type Params<'a> = &'a [(&'a str, Value)];

/// Column-ordered rows as they come back from a driver, before
/// normalization into a [`QueryResult`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// One result row: an order-preserving mapping from column name to value.
pub type Row = IndexMap<String, Value>;

/// Represents the result of a select execution.
///
/// Rows are in the order the database returned them. SQL NULL appears as
/// `Value::Null`; rows whose every column is NULL are dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data as column-name-keyed mappings
    pub rows: Vec<Row>,
    /// Number of rows returned
    pub row_count: usize,
}

impl QueryResult {
    /// Normalizes a driver-level row set into a tabular result, dropping
    /// rows that are entirely NULL.
    pub fn from_rows(set: RowSet) -> Self {
        let RowSet { columns, rows } = set;
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect::<Row>())
            .filter(|row| row.values().any(|v| !v.is_null()))
            .collect();
        let row_count = rows.len();
        QueryResult {
            columns,
            rows,
            row_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, in row order. `None` if the column does
    /// not exist in the result.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        if !self.columns.iter().any(|c| c == name) {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|row| row.get(name).unwrap_or(&Value::Null))
                .collect(),
        )
    }
}

/// Positional placeholder syntax understood by a driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PlaceholderStyle {
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
    /// `?1`, `?2`, ... (SQLite)
    Question,
}

// The first alternative swallows `::type` casts so they are never mistaken
// for placeholders. Placeholders inside quoted literals are the caller's
// responsibility, as they were in the original dict-binding scheme.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"::[A-Za-z_][A-Za-z0-9_]*|:([A-Za-z_][A-Za-z0-9_]*)")
        .expect("placeholder pattern is valid")
});

/// Rewrites `:name` placeholders into the driver's positional form and
/// collects the referenced values in position order.
///
/// A name referenced more than once shares a single position. Parameters
/// never referenced by the statement are ignored. A placeholder with no
/// bound parameter is an error; no SQL reaches the server in that case.
pub(crate) fn bind(sql: &str, params: Params, style: PlaceholderStyle) -> Result<(String, Vec<Value>)> {
    let mut ordered: Vec<(&str, Value)> = Vec::new();
    let mut missing: Option<String> = None;

    let rewritten = PLACEHOLDER.replace_all(sql, |caps: &Captures| {
        let name = match caps.get(1) {
            Some(name) => name.as_str(),
            // `::type` cast, leave untouched
            None => return caps[0].to_string(),
        };
        let position = match ordered.iter().position(|(n, _)| *n == name) {
            Some(i) => i + 1,
            None => match params.iter().find(|(n, _)| *n == name) {
                Some((n, value)) => {
                    ordered.push((*n, value.clone()));
                    ordered.len()
                }
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    return caps[0].to_string();
                }
            },
        };
        match style {
            PlaceholderStyle::Dollar => format!("${}", position),
            PlaceholderStyle::Question => format!("?{}", position),
        }
    });

    if let Some(name) = missing {
        return Err(SqlgateError::Parameter(format!(
            "no value bound for placeholder :{}",
            name
        )));
    }

    Ok((
        rewritten.into_owned(),
        ordered.into_iter().map(|(_, value)| value).collect(),
    ))
}

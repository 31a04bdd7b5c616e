/// SQLite Driver Module
///
/// Implements the driver seam on top of rusqlite, giving the session an
/// embedded backend. The credentials' database name is the path to the
/// database file; host, port, user, and password are ignored.
use crate::core::db::connection::{Connection, Credentials, Driver, Transaction};
use crate::core::db::query::{bind, Params, PlaceholderStyle, RowSet, Value};
use crate::core::{Result, SqlgateError};
use rusqlite::types::{ToSqlOutput, ValueRef};

/// Driver for SQLite database files.
#[derive(Debug, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Connection>> {
        let conn = rusqlite::Connection::open(&credentials.database)
            .map_err(|e| SqlgateError::Connection(Box::new(e)))?;
        Ok(Box::new(SqliteConnection { conn }))
    }
}

struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>> {
        // Default drop behavior is rollback, matching the seam contract.
        let tx = self.conn.transaction().map_err(execution_error)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

struct SqliteTransaction<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl Transaction for SqliteTransaction<'_> {
    fn execute(&mut self, sql: &str, params: Params) -> Result<u64> {
        if params.is_empty() {
            // Batch path: lets multi-statement DDL pass through verbatim.
            self.tx.execute_batch(sql).map_err(execution_error)?;
            return Ok(0);
        }
        let (sql, values) = bind(sql, params, PlaceholderStyle::Question)?;
        let mut statement = self.tx.prepare(&sql).map_err(execution_error)?;
        let affected = statement
            .execute(rusqlite::params_from_iter(values.iter()))
            .map_err(execution_error)?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str, params: Params) -> Result<RowSet> {
        let (sql, values) = bind(sql, params, PlaceholderStyle::Question)?;
        let mut statement = self.tx.prepare(&sql).map_err(execution_error)?;
        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let column_count = statement.column_count();

        let rows = statement
            .query_map(rusqlite::params_from_iter(values.iter()), |row| {
                let mut out = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    out.push(column_value(row.get_ref(i)?));
                }
                Ok(out)
            })
            .map_err(execution_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(execution_error)?;

        Ok(RowSet { columns, rows })
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().map_err(execution_error)
    }
}

fn execution_error(e: rusqlite::Error) -> SqlgateError {
    SqlgateError::Execution(Box::new(e))
}

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            Value::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_value_conversion() {
        assert_eq!(column_value(ValueRef::Null), Value::Null);
        assert_eq!(column_value(ValueRef::Integer(7)), Value::Int(7));
        assert_eq!(column_value(ValueRef::Real(1.5)), Value::Float(1.5));
        assert_eq!(
            column_value(ValueRef::Text(b"hi")),
            Value::Text("hi".to_string())
        );
        assert_eq!(
            column_value(ValueRef::Blob(&[1, 2])),
            Value::Bytes(vec![1, 2])
        );
    }
}

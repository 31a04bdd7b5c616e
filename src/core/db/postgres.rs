/// PostgreSQL Driver Module
///
/// Implements the driver seam on top of the blocking `postgres` client.
/// Named placeholders are rewritten to `$n` positional form before the
/// statement is prepared; values travel as bind parameters, never as text.
use crate::core::db::connection::{Connection, Credentials, Driver, Transaction};
use crate::core::db::query::{bind, Params, PlaceholderStyle, RowSet, Value};
use crate::core::{Result, SqlgateError};
use bytes::BytesMut;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::NoTls;

/// Driver for PostgreSQL servers. Connections are unencrypted; put a TLS
/// terminator in front of the server if the link is untrusted.
#[derive(Debug, Default)]
pub struct PgDriver;

impl Driver for PgDriver {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Connection>> {
        let mut config = postgres::Config::new();
        config
            .host(&credentials.host)
            .port(credentials.port)
            .dbname(&credentials.database)
            .user(&credentials.user);
        if !credentials.password.is_empty() {
            config.password(&credentials.password);
        }
        let client = config
            .connect(NoTls)
            .map_err(|e| SqlgateError::Connection(Box::new(e)))?;
        Ok(Box::new(PgConnection { client }))
    }
}

struct PgConnection {
    client: postgres::Client,
}

impl Connection for PgConnection {
    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>> {
        let tx = self.client.transaction().map_err(execution_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

struct PgTransaction<'a> {
    tx: postgres::Transaction<'a>,
}

impl Transaction for PgTransaction<'_> {
    fn execute(&mut self, sql: &str, params: Params) -> Result<u64> {
        if params.is_empty() {
            // Simple-query path: lets multi-statement DDL pass through verbatim.
            self.tx.batch_execute(sql).map_err(execution_error)?;
            return Ok(0);
        }
        let (sql, values) = bind(sql, params, PlaceholderStyle::Dollar)?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        self.tx.execute(sql.as_str(), &refs).map_err(execution_error)
    }

    fn query(&mut self, sql: &str, params: Params) -> Result<RowSet> {
        let (sql, values) = bind(sql, params, PlaceholderStyle::Dollar)?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let statement = self.tx.prepare(&sql).map_err(execution_error)?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = self.tx.query(&statement, &refs).map_err(execution_error)?;
        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| column_value(row, i)).collect())
            .collect::<Result<Vec<Vec<Value>>>>()?;
        Ok(RowSet { columns, rows })
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().map_err(execution_error)
    }
}

fn execution_error(e: postgres::Error) -> SqlgateError {
    SqlgateError::Execution(Box::new(e))
}

fn column_value(row: &postgres::Row, idx: usize) -> Result<Value> {
    let ty = row.columns()[idx].type_();

    macro_rules! get {
        ($t:ty, $wrap:expr) => {
            row.try_get::<_, Option<$t>>(idx)
                .map_err(execution_error)?
                .map_or(Value::Null, $wrap)
        };
    }

    let value = if *ty == Type::BOOL {
        get!(bool, Value::Bool)
    } else if *ty == Type::INT2 {
        get!(i16, |v| Value::Int(i64::from(v)))
    } else if *ty == Type::INT4 {
        get!(i32, |v| Value::Int(i64::from(v)))
    } else if *ty == Type::INT8 {
        get!(i64, Value::Int)
    } else if *ty == Type::FLOAT4 {
        get!(f32, |v| Value::Float(f64::from(v)))
    } else if *ty == Type::FLOAT8 {
        get!(f64, Value::Float)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        get!(String, Value::Text)
    } else if *ty == Type::BYTEA {
        get!(Vec<u8>, Value::Bytes)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get!(serde_json::Value, |v| Value::Text(v.to_string()))
    } else if *ty == Type::UUID {
        get!(uuid::Uuid, |v| Value::Text(v.to_string()))
    } else if *ty == Type::TIMESTAMP {
        get!(chrono::NaiveDateTime, |v| Value::Text(v.to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        get!(chrono::DateTime<chrono::Utc>, |v| Value::Text(v.to_rfc3339()))
    } else if *ty == Type::DATE {
        get!(chrono::NaiveDate, |v| Value::Text(v.to_string()))
    } else if *ty == Type::TIME {
        get!(chrono::NaiveTime, |v| Value::Text(v.to_string()))
    } else {
        return Err(SqlgateError::Execution(
            format!("unsupported column type: {}", ty).into(),
        ));
    };
    Ok(value)
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => {
                // Narrow to the column's width so int2/int4 columns bind cleanly.
                if *ty == Type::INT2 {
                    (*v as i16).to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    (*v as i32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Text(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Connection Management Module
///
/// This module defines the connection credentials and the driver seam the
/// session talks through. Every operation acquires a fresh connection from
/// a driver and releases it before returning; the seam is object-safe so a
/// test double can stand in for a real client library.
use crate::core::db::query::{Params, RowSet};
use crate::core::Result;
use serde::Deserialize;

/// Connection parameters for a database server.
///
/// Immutable once constructed and not validated by this layer. For the
/// SQLite backend, `database` is the path to the database file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Credentials {
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

impl Credentials {
    /// Credentials for a server on localhost:5432.
    pub fn new(
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Credentials {
            database: database.into(),
            user: user.into(),
            password: password.into(),
            host: default_host(),
            port: default_port(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// A client library capable of opening connections.
pub trait Driver {
    /// Opens a fresh connection for a single operation.
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Connection>>;
}

/// One open connection, scoped to a single operation.
///
/// Dropping the connection closes it; the session never holds one past the
/// end of an operation.
pub trait Connection {
    /// Starts a transaction for the current operation.
    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>>;
}

/// An open transaction. Dropping it without calling [`Transaction::commit`]
/// rolls it back, so a failed operation never leaves partial writes.
pub trait Transaction {
    /// Executes a statement that returns no rows, yielding the affected
    /// row count. Parameterless statements may contain multiple
    /// `;`-separated statements (DDL passthrough); those report zero rows.
    fn execute(&mut self, sql: &str, params: Params) -> Result<u64>;

    /// Executes a statement and materializes every result row.
    fn query(&mut self, sql: &str, params: Params) -> Result<RowSet>;

    /// Commits the transaction.
    fn commit(self: Box<Self>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_defaults() {
        let credentials = Credentials::new("orders", "app", "secret");
        assert_eq!(credentials.host, "localhost");
        assert_eq!(credentials.port, 5432);
        assert_eq!(credentials.database, "orders");
    }

    #[test]
    fn test_credentials_overrides() {
        let credentials = Credentials::new("orders", "app", "secret")
            .host("db.internal")
            .port(6432);
        assert_eq!(credentials.host, "db.internal");
        assert_eq!(credentials.port, 6432);
    }
}

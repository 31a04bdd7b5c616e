/// Database Session Module
///
/// A session owns connection credentials, a driver, and a retry policy.
/// Every operation acquires a fresh connection, runs inside a transaction,
/// and releases the connection on every exit path. Nothing is pooled and
/// nothing is shared between operations.
use crate::core::db::connection::{Connection, Credentials, Driver};
use crate::core::db::postgres::PgDriver;
use crate::core::db::query::{Params, QueryResult, RowSet, Value};
use crate::core::db::schema;
use crate::core::db::sqlite::SqliteDriver;
use crate::core::Result;
use crate::core::SqlgateError;
use crate::retry::RetryPolicy;
use tracing::error;

/// A per-operation database session.
///
/// Schema operations are never retried; the query and mutation operations
/// have `_with_retry` variants governed by the session's [`RetryPolicy`],
/// which defaults to five attempts with a doubling three second delay.
pub struct DatabaseSession {
    credentials: Credentials,
    driver: Box<dyn Driver>,
    retry: RetryPolicy,
}

impl DatabaseSession {
    /// Session talking to a PostgreSQL server.
    pub fn postgres(credentials: Credentials) -> Self {
        Self::with_driver(Box::new(PgDriver), credentials)
    }

    /// Session over a local SQLite database file.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::with_driver(Box::new(SqliteDriver), Credentials::new(path, "", ""))
    }

    /// Session over a caller-supplied driver.
    pub fn with_driver(driver: Box<dyn Driver>, credentials: Credentials) -> Self {
        DatabaseSession {
            credentials,
            driver,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy used by the `_with_retry` operations.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn connect(&self) -> Result<Box<dyn Connection>> {
        self.driver.connect(&self.credentials).map_err(|e| {
            error!("Error connecting to database: {}", e);
            e
        })
    }

    /// Executes raw DDL verbatim and commits. Not retried.
    pub fn apply_schema(&self, schema: &str) -> Result<()> {
        let mut conn = self.connect()?;
        let outcome = execute_and_commit(conn.as_mut(), schema, &[]);
        if let Err(e) = &outcome {
            error!("Schema statement failed: {}\nstatement: {}", e, schema);
        }
        // `conn` drops here on every path, closing the connection.
        outcome.map(|_| ())
    }

    /// Creates an index named `{table}_{column}` if it does not already
    /// exist. Not retried.
    pub fn create_index(&self, table: &str, column: &str) -> Result<()> {
        self.apply_schema(&schema::index_statement(table, column))
    }

    /// Adds a named foreign key constraint to a table. Not retried.
    pub fn add_foreign_key_constraint(
        &self,
        table: &str,
        constraint: &str,
        definition: &str,
    ) -> Result<()> {
        self.apply_schema(&schema::foreign_key_statement(table, constraint, definition))
    }

    /// Runs a parameterized select and materializes the result: rows as
    /// column-name-keyed mappings, SQL NULL normalized to [`Value::Null`],
    /// rows that are entirely NULL dropped.
    pub fn select(&self, query: &str, params: Params) -> Result<QueryResult> {
        let mut conn = self.connect()?;
        let outcome = fetch_all(conn.as_mut(), query, params);
        match outcome {
            Ok(set) => Ok(QueryResult::from_rows(set)),
            Err(e) => {
                error!(
                    "Select failed: {}\nquery: {}\nparameters: {:?}",
                    e, query, params
                );
                Err(e)
            }
        }
    }

    /// Same as [`DatabaseSession::select`], wrapped in the session's retry
    /// policy.
    pub fn select_with_retry(&self, query: &str, params: Params) -> Result<QueryResult> {
        self.retry.run(|| self.select(query, params))
    }

    /// Runs a parameterized insert/update inside a transaction and
    /// commits. With `return_generated_id`, a `RETURNING id` clause is
    /// appended and the first column of the first returned row comes back
    /// as the generated identifier.
    ///
    /// On any failure during execute, fetch, or commit, the transaction is
    /// rolled back: the identifier and the commit happen together or not
    /// at all.
    pub fn mutate(
        &self,
        query: &str,
        params: Params,
        return_generated_id: bool,
    ) -> Result<Option<i64>> {
        let mut conn = self.connect()?;
        let outcome = execute_mutation(conn.as_mut(), query, params, return_generated_id);
        if let Err(e) = &outcome {
            error!(
                "Mutation failed: {}\nquery: {}\nparameters: {:?}",
                e, query, params
            );
        }
        outcome
    }

    /// Same as [`DatabaseSession::mutate`], wrapped in the session's retry
    /// policy.
    pub fn mutate_with_retry(
        &self,
        query: &str,
        params: Params,
        return_generated_id: bool,
    ) -> Result<Option<i64>> {
        self.retry.run(|| self.mutate(query, params, return_generated_id))
    }
}

fn execute_and_commit(conn: &mut dyn Connection, sql: &str, params: Params) -> Result<u64> {
    let mut tx = conn.transaction()?;
    let affected = tx.execute(sql, params)?;
    tx.commit()?;
    Ok(affected)
}

fn fetch_all(conn: &mut dyn Connection, sql: &str, params: Params) -> Result<RowSet> {
    let mut tx = conn.transaction()?;
    // Read path: the transaction is dropped, not committed.
    tx.query(sql, params)
}

fn execute_mutation(
    conn: &mut dyn Connection,
    query: &str,
    params: Params,
    return_generated_id: bool,
) -> Result<Option<i64>> {
    let mut tx = conn.transaction()?;
    let generated = if return_generated_id {
        let sql = format!("{}\nRETURNING id", query);
        let set = tx.query(&sql, params)?;
        Some(generated_id(set)?)
    } else {
        tx.execute(query, params)?;
        None
    };
    tx.commit()?;
    Ok(generated)
}

fn generated_id(set: RowSet) -> Result<i64> {
    set.rows
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            SqlgateError::Execution("mutation returned no generated identifier".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeDriver, FakeState};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    fn fake_session() -> (DatabaseSession, Arc<FakeState>) {
        let (driver, state) = FakeDriver::new();
        let session =
            DatabaseSession::with_driver(Box::new(driver), Credentials::new("db", "user", ""))
                .with_retry_policy(RetryPolicy::new(5, Duration::ZERO, 2));
        (session, state)
    }

    fn open_connections(state: &FakeState) -> usize {
        state.open_connections.load(Ordering::SeqCst)
    }

    #[test]
    fn test_apply_schema_commits_and_releases_connection() {
        let (session, state) = fake_session();

        session.apply_schema("CREATE TABLE t (id INT)").unwrap();

        assert_eq!(
            state.committed.lock().unwrap().as_slice(),
            &["CREATE TABLE t (id INT)".to_string()]
        );
        assert_eq!(open_connections(&state), 0);
    }

    #[test]
    fn test_failed_select_releases_connection() {
        let (session, state) = fake_session();
        state.execute_failures.store(1, Ordering::SeqCst);

        let result = session.select("SELECT * FROM t", &[]);

        assert!(matches!(result, Err(SqlgateError::Execution(_))));
        assert_eq!(open_connections(&state), 0);
    }

    #[test]
    fn test_commit_failure_commits_nothing() {
        let (session, state) = fake_session();
        state.commit_failures.store(1, Ordering::SeqCst);

        let result = session.mutate("UPDATE t SET a = 1", &[], false);

        assert!(matches!(result, Err(SqlgateError::Execution(_))));
        assert!(state.committed.lock().unwrap().is_empty());
        assert_eq!(open_connections(&state), 0);
    }

    #[test]
    fn test_mutate_returns_generated_identifier() {
        let (session, state) = fake_session();
        state.push_result(RowSet {
            columns: vec!["id".to_string()],
            rows: vec![vec![Value::Int(1)]],
        });

        let id = session
            .mutate("INSERT INTO t (a) VALUES (:a)", &[("a", Value::Int(7))], true)
            .unwrap();

        assert_eq!(id, Some(1));
        let committed = state.committed.lock().unwrap();
        assert_eq!(committed.len(), 1);
        assert!(committed[0].ends_with("RETURNING id"));
    }

    #[test]
    fn test_mutate_without_identifier_returns_none() {
        let (session, state) = fake_session();

        let id = session.mutate("DELETE FROM t", &[], false).unwrap();

        assert_eq!(id, None);
        assert_eq!(
            state.committed.lock().unwrap().as_slice(),
            &["DELETE FROM t".to_string()]
        );
    }

    #[test]
    fn test_empty_returning_set_is_an_execution_error() {
        let (session, state) = fake_session();
        state.push_result(RowSet::default());

        let result = session.mutate("INSERT INTO t DEFAULT VALUES", &[], true);

        assert!(matches!(result, Err(SqlgateError::Execution(_))));
        // Nothing committed when the identifier fetch comes back empty.
        assert!(state.committed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_select_with_retry_recovers_from_transient_connect_failures() {
        let (session, state) = fake_session();
        state.connect_failures.store(2, Ordering::SeqCst);

        let result = session.select_with_retry("SELECT 1", &[]).unwrap();

        assert_eq!(result.row_count, 0);
        assert_eq!(state.connect_attempts.load(Ordering::SeqCst), 3);
        assert_eq!(open_connections(&state), 0);
    }

    #[test]
    fn test_select_with_retry_propagates_final_error() {
        let (session, state) = fake_session();
        state.connect_failures.store(usize::MAX, Ordering::SeqCst);
        let session = session.with_retry_policy(RetryPolicy::new(3, Duration::ZERO, 2));

        let result = session.select_with_retry("SELECT 1", &[]);

        assert!(matches!(result, Err(SqlgateError::Connection(_))));
        assert_eq!(state.connect_attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_schema_operations_are_not_retried() {
        let (session, state) = fake_session();
        state.connect_failures.store(1, Ordering::SeqCst);

        let result = session.apply_schema("CREATE TABLE t (id INT)");

        assert!(matches!(result, Err(SqlgateError::Connection(_))));
        assert_eq!(state.connect_attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_add_foreign_key_constraint_goes_through_schema_path() {
        let (session, state) = fake_session();

        session
            .add_foreign_key_constraint(
                "orders",
                "fk_orders_customer",
                "FOREIGN KEY (customer_id) REFERENCES tbl_example(id)",
            )
            .unwrap();

        let committed = state.committed.lock().unwrap();
        assert_eq!(committed.len(), 1);
        assert!(committed[0].starts_with("ALTER TABLE orders ADD CONSTRAINT fk_orders_customer"));
    }

    #[test]
    fn test_select_drops_all_null_rows() {
        let (session, state) = fake_session();
        state.push_result(RowSet {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![
                vec![Value::Int(1), Value::Null],
                vec![Value::Null, Value::Null],
            ],
        });

        let result = session.select("SELECT * FROM t", &[]).unwrap();

        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0].get("b"), Some(&Value::Null));
    }

    #[test]
    fn test_create_index_goes_through_schema_path() {
        let (session, state) = fake_session();

        session.create_index("tbl_example", "customer_id").unwrap();

        let committed = state.committed.lock().unwrap();
        assert_eq!(
            committed.as_slice(),
            &["CREATE INDEX IF NOT EXISTS tbl_example_customer_id \
               ON tbl_example(customer_id);"
                .to_string()]
        );
    }
}

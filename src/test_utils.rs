/// Test Utilities Module
///
/// A scriptable driver double for exercising the session without a real
/// database: it counts live connections, fails on cue, and replays canned
/// result sets. Compiled for tests only.
use crate::core::db::connection::{Connection, Credentials, Driver, Transaction};
use crate::core::db::query::{Params, RowSet};
use crate::core::{Result, SqlgateError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared observation and scripting state for a [`FakeDriver`].
///
/// The `*_failures` counters are countdowns: each scripted failure
/// consumes one unit, so `connect_failures = 2` fails the next two
/// connection attempts and then succeeds.
#[derive(Default)]
pub struct FakeState {
    pub connect_attempts: AtomicUsize,
    pub open_connections: AtomicUsize,
    pub connect_failures: AtomicUsize,
    pub execute_failures: AtomicUsize,
    pub commit_failures: AtomicUsize,
    /// Statements that made it through a successful commit, in order.
    pub committed: Mutex<Vec<String>>,
    /// Canned results handed out by `query`, front first.
    pub results: Mutex<VecDeque<RowSet>>,
}

impl FakeState {
    pub fn push_result(&self, set: RowSet) {
        self.results.lock().unwrap().push_back(set);
    }
}

/// Driver double backed by a [`FakeState`].
pub struct FakeDriver {
    state: Arc<FakeState>,
}

impl FakeDriver {
    pub fn new() -> (Self, Arc<FakeState>) {
        let state = Arc::new(FakeState::default());
        (
            FakeDriver {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl Driver for FakeDriver {
    fn connect(&self, _credentials: &Credentials) -> Result<Box<dyn Connection>> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if consume(&self.state.connect_failures) {
            return Err(SqlgateError::Connection("scripted connect failure".into()));
        }
        self.state.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeConnection {
    state: Arc<FakeState>,
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.state.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Connection for FakeConnection {
    fn transaction(&mut self) -> Result<Box<dyn Transaction + '_>> {
        Ok(Box::new(FakeTransaction {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
        }))
    }
}

/// Statements stage inside the transaction and only land in
/// `FakeState::committed` when `commit` succeeds; dropping the transaction
/// discards them, mirroring rollback.
struct FakeTransaction {
    state: Arc<FakeState>,
    staged: Vec<String>,
}

impl Transaction for FakeTransaction {
    fn execute(&mut self, sql: &str, _params: Params) -> Result<u64> {
        if consume(&self.state.execute_failures) {
            return Err(SqlgateError::Execution("scripted execute failure".into()));
        }
        self.staged.push(sql.to_string());
        Ok(1)
    }

    fn query(&mut self, sql: &str, _params: Params) -> Result<RowSet> {
        if consume(&self.state.execute_failures) {
            return Err(SqlgateError::Execution("scripted query failure".into()));
        }
        self.staged.push(sql.to_string());
        Ok(self
            .state
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        if consume(&self.state.commit_failures) {
            return Err(SqlgateError::Execution("scripted commit failure".into()));
        }
        let FakeTransaction { state, staged } = *self;
        state.committed.lock().unwrap().extend(staged);
        Ok(())
    }
}

/// Decrements `counter` if positive, reporting whether a scripted failure
/// was consumed.
fn consume(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

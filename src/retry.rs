/// Retry Module
///
/// Bounded retry with fixed-then-exponential backoff for fallible
/// operations. The policy is pure configuration; the only mutable state
/// during a call is the local attempt counter and the current delay.
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Retry configuration for a fallible operation.
///
/// `max_attempts` bounds the total number of invocations of the wrapped
/// operation. The delay before attempt `k + 1` is
/// `initial_delay * backoff_multiplier^(k - 1)`; there is no jitter, so
/// the schedule is deterministic for a given configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    /// Five attempts, three seconds before the first retry, doubling after
    /// each failure.
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(3),
            backoff_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: u32) -> Self {
        RetryPolicy {
            max_attempts,
            initial_delay,
            backoff_multiplier,
        }
    }

    /// The delays slept between consecutive attempts, in order. Exposed so
    /// the backoff schedule can be inspected without sleeping through it.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let mut delay = self.initial_delay;
        (1..self.max_attempts).map(move |_| {
            let current = delay;
            delay = delay.saturating_mul(self.backoff_multiplier);
            current
        })
    }

    /// Invokes `operation` until it succeeds or `max_attempts` invocations
    /// have failed, sleeping between attempts.
    ///
    /// Each failed attempt short of the last is logged at warning level
    /// and retried after the current delay. The failure from the final
    /// attempt is returned unchanged; callers see exactly the error an
    /// unwrapped call would have produced.
    pub fn run<T, E, F>(&self, mut operation: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> std::result::Result<T, E>,
        E: std::fmt::Display,
    {
        let mut delay = self.initial_delay;
        for _ in 1..self.max_attempts {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!("{}, retrying in {:?}", err, delay);
                    thread::sleep(delay);
                    delay = delay.saturating_mul(self.backoff_multiplier);
                }
            }
        }
        operation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn immediate(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO, 2)
    }

    #[test]
    fn test_success_returns_without_further_attempts() {
        let calls = Cell::new(0u32);
        let result: Result<i32, String> = immediate(5).run(|| {
            calls.set(calls.get() + 1);
            Ok(42)
        });

        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_persistent_failure_exhausts_attempts() {
        let calls = Cell::new(0u32);
        let result: Result<(), String> = immediate(4).run(|| {
            calls.set(calls.get() + 1);
            Err(format!("attempt {}", calls.get()))
        });

        assert_eq!(calls.get(), 4);
        // The final attempt's error comes back unchanged.
        assert_eq!(result, Err("attempt 4".to_string()));
    }

    #[test]
    fn test_recovery_midway_stops_retrying() {
        let calls = Cell::new(0u32);
        let result: Result<&str, String> = immediate(5).run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err("transient".to_string())
            } else {
                Ok("recovered")
            }
        });

        assert_eq!(result, Ok("recovered"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_zero_attempts_degrades_to_single_invocation() {
        let calls = Cell::new(0u32);
        let _: Result<(), String> = immediate(0).run(|| {
            calls.set(calls.get() + 1);
            Err("nope".to_string())
        });

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_delay_schedule_is_geometric() {
        let policy = RetryPolicy::new(5, Duration::from_secs(3), 2);
        let delays: Vec<_> = policy.delays().collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(3),
                Duration::from_secs(6),
                Duration::from_secs(12),
                Duration::from_secs(24),
            ]
        );
    }

    #[test]
    fn test_multiplier_one_keeps_delay_fixed() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10), 1);
        let delays: Vec<_> = policy.delays().collect();

        assert_eq!(delays, vec![Duration::from_millis(10); 3]);
    }
}

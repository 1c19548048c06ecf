//! Bounded retries for transient file-system failures.

use std::thread;
use std::time::Duration;

use log::warn;

use crate::IoError;

/// How often and how patiently transient failures are retried.
///
/// Only errors for which [`IoError::is_transient`] holds are retried; the
/// pause doubles after every failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    initial_backoff: Duration,
}

impl RetryPolicy {
    /// Default number of attempts, the first included.
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    /// Default pause before the second attempt.
    pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(50);

    /// Policy making `attempts` tries in total, at least one.
    #[must_use]
    pub fn new(attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_backoff,
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Total attempts.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `operation`, retrying transient failures.
    ///
    /// # Errors
    /// The first terminal error, or the last transient one once attempts are
    /// exhausted.
    pub fn run<T, F>(&self, label: &str, mut operation: F) -> Result<T, IoError>
    where
        F: FnMut() -> Result<T, IoError>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    warn!(
                        "{label} failed on attempt {attempt}/{}: {err}; retrying in {backoff:?}",
                        self.attempts
                    );
                    thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_BACKOFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::Cell;
    use std::io;

    fn failure(kind: io::ErrorKind) -> IoError {
        IoError::io("input.tif", io::Error::from(kind))
    }

    #[rstest]
    fn retries_transient_failures_until_success() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let result = policy.run("read", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(failure(io::ErrorKind::Interrupted))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.expect("third attempt succeeds"), 7);
        assert_eq!(calls.get(), 3);
    }

    #[rstest]
    fn gives_up_after_the_last_attempt() {
        let calls = Cell::new(0);
        let result: Result<(), IoError> = RetryPolicy::new(2, Duration::ZERO).run("read", || {
            calls.set(calls.get() + 1);
            Err(failure(io::ErrorKind::TimedOut))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[rstest]
    fn terminal_failures_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), IoError> = RetryPolicy::default().run("read", || {
            calls.set(calls.get() + 1);
            Err(failure(io::ErrorKind::NotFound))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[rstest]
    fn zero_attempts_still_runs_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
        assert_eq!(RetryPolicy::none().attempts(), 1);
    }
}

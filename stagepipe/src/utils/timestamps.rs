//! Strictly increasing timestamps for version names.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of strictly increasing integers used to disambiguate version
/// names.
pub trait VersionStamp: Send + Sync {
    /// Returns the next stamp. Every call returns a value greater than the
    /// previous one.
    fn next_stamp(&self) -> i64;
}

/// Unix-seconds stamps, bumped by one when two calls land in the same second
/// (or the wall clock steps backwards).
#[derive(Debug, Default)]
pub struct UnixSecondsStamp {
    last: AtomicI64,
}

impl UnixSecondsStamp {
    /// Creates a new stamp source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_after(&self, now: i64) -> i64 {
        let mut previous = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(previous + 1);
            match self
                .last
                .compare_exchange(previous, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => previous = actual,
            }
        }
    }
}

impl VersionStamp for UnixSecondsStamp {
    fn next_stamp(&self) -> i64 {
        self.next_after(Utc::now().timestamp())
    }
}

//! One-shot completion signal with a bounded wait.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Signalled by the last consumer to finish, awaited by the producer.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    /// Re-arms the signal for a new session.
    pub(crate) fn reinit(&self) {
        *self.done.lock() = false;
    }

    /// Marks the signal done and wakes every waiter.
    pub(crate) fn complete(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cond.notify_all();
    }

    /// Waits until the signal is done or `timeout` elapses.
    ///
    /// Returns true if the signal completed.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut done = self.done.lock();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while !*done {
                self.cond.wait(&mut done);
            }
            return true;
        };

        while !*done {
            if self.cond.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }
}

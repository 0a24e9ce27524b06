//! Counting synchronization primitive with symmetric notify/wait.
//!
//! A `CountingGate` wraps a signed counter behind a `Mutex`/`Condvar` pair,
//! the same building blocks the rest of the workspace reaches for when it
//! needs a blocking handoff between threads. `new(init)` sets the internal
//! counter to `-init`, modeling a gate that stays closed until `init`
//! notifications have arrived. Three idioms fall out of that one
//! constructor:
//!
//! - releaser: `CountingGate::new(1)`, one `notify(1)` opens it
//! - many-notify: `CountingGate::new(1)`, each `notify(1)` releases one
//!   waiter out of a group
//! - barrier: `CountingGate::new(n)`, `wait(n)` blocks until `n` separate
//!   `notify(1)` calls have arrived

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub struct CountingGate {
    count: Mutex<i64>,
    cv: Condvar,
}

impl CountingGate {
    pub fn new(init: i64) -> Self {
        Self {
            count: Mutex::new(-init),
            cv: Condvar::new(),
        }
    }

    /// Increment the counter by `k` and wake one waiter if `k == 1`, else
    /// wake all of them.
    pub fn notify(&self, k: i64) {
        let mut count = self.count.lock().unwrap();
        *count += k;
        if k > 1 {
            self.cv.notify_all();
        } else {
            self.cv.notify_one();
        }
    }

    /// Block until the counter is non-negative, then subtract `k`.
    pub fn wait(&self, k: i64) {
        let mut count = self.count.lock().unwrap();
        count = self.cv.wait_while(count, |c| *c < 0).unwrap();
        *count -= k;
    }

    /// Non-blocking variant of `wait(1)`.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().unwrap();
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    pub fn available(&self) -> bool {
        *self.count.lock().unwrap() > 0
    }

    /// Bounded variant of `wait(1)`; returns whether it succeeded before the
    /// timeout elapsed.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let count = self.count.lock().unwrap();
        let (mut count, result) = self
            .cv
            .wait_timeout_while(count, timeout, |c| *c <= 0)
            .unwrap();
        if !result.timed_out() {
            *count -= 1;
            true
        } else {
            false
        }
    }

    pub fn wait_until(&self, deadline: Instant) -> bool {
        let now = Instant::now();
        if deadline <= now {
            return self.try_wait();
        }
        self.wait_for(deadline - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn barrier_waits_for_n_notifications() {
        let gate = Arc::new(CountingGate::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            handles.push(thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                gate.notify(1);
            }));
        }
        gate.wait(4);
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn releaser_blocks_until_notified() {
        let gate = Arc::new(CountingGate::new(1));
        let waiter_gate = Arc::clone(&gate);
        let handle = thread::spawn(move || {
            waiter_gate.wait(1);
        });
        thread::sleep(Duration::from_millis(20));
        gate.notify(1);
        handle.join().unwrap();
    }

    #[test]
    fn notify_k_releases_up_to_k_waiters() {
        let gate = Arc::new(CountingGate::new(1));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            handles.push(thread::spawn(move || {
                gate.wait(1);
            }));
        }
        gate.notify(1);
        gate.notify(1);
        gate.notify(2);
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn try_wait_is_non_blocking() {
        let gate = CountingGate::new(0);
        assert!(!gate.try_wait());
        gate.notify(1);
        assert!(gate.try_wait());
        assert!(!gate.try_wait());
    }

    #[test]
    fn wait_for_times_out_without_notification() {
        let gate = CountingGate::new(1);
        assert!(!gate.wait_for(Duration::from_millis(20)));
    }

    #[test]
    fn wait_for_succeeds_when_notified_in_time() {
        let gate = Arc::new(CountingGate::new(1));
        let notifier = Arc::clone(&gate);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            notifier.notify(1);
        });
        assert!(gate.wait_for(Duration::from_millis(200)));
    }
}

//! Cooperative cancellation and progress reporting for long-running walks.
//!
//! A [`CancellationToken`] is a cheap cloneable handle over shared atomics. The host (a CLI,
//! a GUI, a test) holds one clone and may request a stop or read progress at any time; the
//! parser holds another and polls [`CancellationToken::is_cancelled`] once per iteration of
//! every unbounded walk. When a stop is requested the walk returns what it has collected so
//! far, never a half-decoded record.
//!
//! # Examples
//!
//! ```rust
//! use pescope::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let host = token.clone();
//!
//! host.cancel();
//! assert!(token.is_cancelled());
//!
//! token.reset();
//! assert!(!host.is_cancelled());
//! ```

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

#[derive(Debug, Default)]
struct TokenState {
    stop: AtomicBool,
    current: AtomicU64,
    total: AtomicU64,
    status: Mutex<String>,
}

/// Shared stop flag with progress counters and a status line.
///
/// The parser only ever reads the stop flag and writes progress; the host writes the stop
/// flag. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates a token in the running state with zeroed progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that every walk observing this token stops at its next iteration.
    pub fn cancel(&self) {
        self.state.stop.store(true, Ordering::Release);
    }

    /// Clears a previous stop request.
    pub fn reset(&self) {
        self.state.stop.store(false, Ordering::Release);
    }

    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.stop.load(Ordering::Acquire)
    }

    /// Publishes the progress of the current operation.
    pub fn set_progress(&self, current: u64, total: u64) {
        self.state.current.store(current, Ordering::Relaxed);
        self.state.total.store(total, Ordering::Relaxed);
    }

    /// Returns `(current, total)` as last published.
    #[must_use]
    pub fn progress(&self) -> (u64, u64) {
        (
            self.state.current.load(Ordering::Relaxed),
            self.state.total.load(Ordering::Relaxed),
        )
    }

    /// Replaces the human readable status line.
    pub fn set_status(&self, status: &str) {
        if let Ok(mut guard) = self.state.status.lock() {
            guard.clear();
            guard.push_str(status);
        }
    }

    /// Returns a copy of the status line.
    #[must_use]
    pub fn status(&self) -> String {
        self.state
            .status
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();

        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());

        other.set_progress(3, 10);
        assert_eq!(token.progress(), (3, 10));

        other.set_status("walking imports");
        assert_eq!(token.status(), "walking imports");
    }

    #[test]
    fn cancel_from_other_thread() {
        let token = CancellationToken::new();
        let host = token.clone();

        thread::spawn(move || host.cancel()).join().unwrap();
        assert!(token.is_cancelled());

        token.reset();
        assert!(!token.is_cancelled());
    }
}

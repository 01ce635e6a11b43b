//! Cancellation token for cooperative teardown
//!
//! Deferred work can hold a clone of the session's token and check it before
//! touching the display container. Closing the viewer cancels the token
//! synchronously, so a callback that fires after teardown becomes a no-op.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared cancellation flag for one viewer session
///
/// Clones share the same underlying state via Arc; cancelling any clone is
/// observed by all of them. Cancellation is idempotent.
///
/// # Example
///
/// ```
/// use vellum_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let watcher_token = token.clone();
///
/// token.cancel();
/// assert!(watcher_token.is_cancelled());
/// ```
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token in the non-cancelled state.
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether `cancel()` has been called on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_basic() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();
        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_token_cancel_idempotent() {
        let token = CancellationToken::new();

        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_token_default() {
        let token = CancellationToken::default();
        assert!(!token.is_cancelled());
    }
}

//! Cancellation tokens for concurrent manifest loading.
//!
//! A token is shared by every task of one load. The first task that fails
//! cancels it; the others observe the flag before fanning out further.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A cancellation token for terminating a tree of concurrent tasks.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals every holder of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Checks if this token is still active.
    ///
    /// Returns `Some(())` if still active, `None` if cancelled.
    /// This enables use with the `?` operator for early returns.
    #[inline]
    pub fn is_active(&self) -> Option<()> {
        if self.is_cancelled() {
            None
        } else {
            Some(())
        }
    }
}

/// Single-slot error cell: the first recorded error wins.
#[derive(Debug)]
pub struct FirstError<E> {
    slot: Mutex<Option<E>>,
}

impl<E> Default for FirstError<E> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<E> FirstError<E> {
    /// Stores `error` if the slot is empty. Returns true if it was stored.
    pub fn record(&self, error: E) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(error);
        true
    }

    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn into_inner(self) -> Option<E> {
        self.slot.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_is_active() {
        let token = CancellationToken::new();
        assert!(token.is_active().is_some());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_seen_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(clone.is_active().is_none());
    }

    #[test]
    fn first_error_wins() {
        let cell = FirstError::default();
        assert!(!cell.is_set());
        assert!(cell.record("first"));
        assert!(!cell.record("second"));
        assert_eq!(cell.into_inner(), Some("first"));
    }
}

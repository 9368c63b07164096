//! Cooperative cancellation tokens
//!
//! A token represents one in-flight animation sequence. Cancellation is
//! cooperative: flipping the shared flag does nothing by itself; every
//! animation step checks its token at the next resumption point and halts.
//!
//! A `TokenSlot` owns the notion of "the current sequence" for one entity.
//! Issuing a new token cancels the previous one and bumps the monotonic
//! sequence id, so a step still executing under a stale token detects the
//! mismatch even if its cancelled flag was somehow missed.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    seq: u64,
}

/// Cancellation/identity marker for one animation sequence
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    fn new(seq: u64) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                seq,
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Monotonic sequence id this token was issued under
    pub fn seq(&self) -> u64 {
        self.inner.seq
    }
}

/// The current-sequence slot for one animated entity
pub struct TokenSlot {
    current: Mutex<Option<CancelToken>>,
    next_seq: AtomicU64,
}

impl TokenSlot {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Start a new sequence: the previous token (if any) is cancelled the
    /// instant the new one is issued.
    pub fn issue(&self) -> CancelToken {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let token = CancelToken::new(seq);
        let mut current = self.current.lock();
        if let Some(prev) = current.take() {
            prev.cancel();
        }
        *current = Some(token.clone());
        token
    }

    /// A token is live while it is uncancelled and still the slot's current
    /// sequence. A seq mismatch means the token is stale and must halt.
    pub fn is_live(&self, token: &CancelToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        self.current
            .lock()
            .as_ref()
            .is_some_and(|t| t.seq() == token.seq())
    }

    /// Completed sequences clear the slot so the entity reads as idle.
    /// No-op when `token` has already been superseded.
    pub fn finish(&self, token: &CancelToken) {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|t| t.seq() == token.seq()) {
            *current = None;
        }
    }

    /// Cancel whatever sequence is active and clear the slot.
    pub fn cancel_active(&self) {
        if let Some(token) = self.current.lock().take() {
            token.cancel();
        }
    }

    /// True while a sequence is in flight.
    pub fn has_active(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl Default for TokenSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_cancels_previous() {
        let slot = TokenSlot::new();
        let first = slot.issue();
        assert!(slot.is_live(&first));

        let second = slot.issue();
        assert!(first.is_cancelled());
        assert!(!slot.is_live(&first));
        assert!(slot.is_live(&second));
        assert!(second.seq() > first.seq());
    }

    #[test]
    fn test_finish_clears_only_current() {
        let slot = TokenSlot::new();
        let first = slot.issue();
        let second = slot.issue();

        // Stale finish does nothing.
        slot.finish(&first);
        assert!(slot.has_active());

        slot.finish(&second);
        assert!(!slot.has_active());
    }

    #[test]
    fn test_cancel_active() {
        let slot = TokenSlot::new();
        let token = slot.issue();
        slot.cancel_active();
        assert!(token.is_cancelled());
        assert!(!slot.has_active());
        assert!(!slot.is_live(&token));
    }
}

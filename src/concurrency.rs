//! Cooperative cancellation and yielding (§5).
//!
//! An inference call is a pure function from `(data, options)` to
//! `(posterior, diagnostics)`; long operations (EM, router WAIC scoring)
//! poll a `CancellationToken` and notify a `YieldSink` at the suspension
//! points the spec names (every `batch_size = 64` points within an EM
//! iteration and at the end of every iteration; every 1000 WAIC draws).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::Error;

/// A cheap `Arc<AtomicBool>` flag a caller can flip from another thread (or
/// from within a single-threaded event loop between turns) to request that
/// a long-running fit abort at its next yield point.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(Error::Cancelled)` without touching any caller state if
    /// cancellation has been requested.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Notified at each cooperative suspension point. The default, no-op impl is
/// what a bare library call gets; a caller embedding an external event loop
/// supplies its own to stay responsive during EM or router WAIC scoring.
pub trait YieldSink {
    fn on_yield(&mut self) {}
}

/// The default sink: does nothing. Library-internal loops are given
/// `&mut NoopYieldSink` when the caller does not provide one.
#[derive(Debug, Default)]
pub struct NoopYieldSink;

impl YieldSink for NoopYieldSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_is_observed() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(token.check(), Err(Error::Cancelled));
    }

    #[test]
    fn clone_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}

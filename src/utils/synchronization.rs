//! Synchronization utilities for multi-threaded operations.
//!
//! # Key Components
//!
//! - [`CancellationToken`] - Cooperative cancellation flag shared between a requester and
//!   the worker running an analysis pass

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{Error, Result};

/// A cooperative cancellation handle.
///
/// Clones share the same flag: cancelling any clone cancels all of them. The analysis
/// polls the token between instructions and call sites and unwinds with
/// [`Error::Cancelled`] once it fires. Cancellation is sticky; a token cannot be reset.
///
/// # Examples
///
/// ```rust
/// use throwscope::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker = token.clone();
///
/// assert!(worker.check().is_ok());
/// token.cancel();
/// assert!(worker.is_cancelled());
/// assert!(worker.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every pass observing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once [`CancellationToken::cancel`] was called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(Error::Cancelled)` if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] after the token fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::GenerateError;

/// Largest estimated token count sent to a backend
pub const MAX_TOKENS: usize = 60_000;

/// Rough token estimate: one token per four characters, rounded up
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Reject diffs whose estimate exceeds [`MAX_TOKENS`]
pub fn check_size(diff: &str) -> Result<usize, GenerateError> {
    let estimated = estimate_tokens(diff);
    if estimated > MAX_TOKENS {
        return Err(GenerateError::oversize(estimated));
    }
    Ok(estimated)
}

/// Single-permit, non-queueing flag marking a generation as running.
pub struct InProgress {
    busy: AtomicBool,
}

static GLOBAL: InProgress = InProgress::new();

impl InProgress {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// The process-wide flag used by the command surface
    pub fn global() -> &'static InProgress {
        &GLOBAL
    }

    /// Returns `None` when another generation holds the flag.
    pub fn try_acquire(&self) -> Option<InProgressGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InProgressGuard { flag: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Default for InProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the flag when dropped, on every exit path.
pub struct InProgressGuard<'a> {
    flag: &'a InProgress,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
    }
}

/// Cooperative cancellation flag shared with the Ctrl-C handler
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn check(&self) -> Result<(), GenerateError> {
        if self.is_cancelled() {
            log::info!("Operation cancelled by the user");
            return Err(GenerateError::Cancelled);
        }
        Ok(())
    }
}

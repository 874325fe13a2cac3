//! Single-flight guard for scan work.
//!
//! At most one scan may be validating or committing per session. A second
//! caller is rejected immediately rather than queued.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Single-permit semaphore shared by every workflow step of one session.
#[derive(Debug, Clone)]
pub struct InFlightGuard {
    semaphore: Arc<Semaphore>,
}

/// Held while a step runs; dropping it frees the session.
#[derive(Debug)]
pub struct InFlightPermit {
    _permit: OwnedSemaphorePermit,
}

impl InFlightGuard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// `None` when another step holds the permit.
    #[must_use]
    pub fn try_enter(&self) -> Option<InFlightPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        Some(InFlightPermit { _permit: permit })
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_entry_is_rejected_until_release() {
        let guard = InFlightGuard::new();
        let first = guard.try_enter().expect("free guard");
        assert!(guard.is_busy());
        assert!(guard.try_enter().is_none());
        drop(first);
        assert!(!guard.is_busy());
        assert!(guard.try_enter().is_some());
    }
}

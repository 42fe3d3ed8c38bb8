//! Pause/resume gate
//!
//! An explicit tri-state replaces the original one-slot-channel dance while
//! keeping its observable semantics: only one pause may be pending at a
//! time, and resume is rejected unless a pause is pending or the dispatcher
//! is parked. The dispatcher consults the gate at chunk boundaries only, so
//! in-flight probes are never wasted.

use std::sync::Mutex;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseState {
    /// No pause pending
    Idle,
    /// Pause requested, dispatcher has not reached a chunk boundary yet
    Requested,
    /// Dispatcher is parked awaiting resume
    Parked,
}

/// Pause coordination between operator calls and the dispatcher
#[derive(Debug)]
pub(crate) struct PauseGate {
    state: Mutex<PauseState>,
    notify: Notify,
}

impl PauseGate {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(PauseState::Idle),
            notify: Notify::new(),
        }
    }

    /// Operator pause; `false` when a pause is already pending or parked
    pub(crate) fn request(&self) -> bool {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *state == PauseState::Idle {
            *state = PauseState::Requested;
            true
        } else {
            false
        }
    }

    /// Operator resume; `false` when no pause is pending or parked
    pub(crate) fn release(&self) -> bool {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *state == PauseState::Idle {
            false
        } else {
            *state = PauseState::Idle;
            self.notify.notify_waiters();
            true
        }
    }

    /// Dispatcher chunk-boundary check: consume a pending request and park
    pub(crate) fn take_park(&self) -> bool {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *state == PauseState::Requested {
            *state = PauseState::Parked;
            true
        } else {
            false
        }
    }

    /// Wait while parked; `false` when woken by cancellation instead of
    /// resume
    pub(crate) async fn wait_released(&self, cancel: &CancellationToken) -> bool {
        loop {
            // Arm the waiter before re-checking so a release between the
            // check and the await cannot be missed
            let notified = self.notify.notified();

            {
                let state = self
                    .state
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if *state != PauseState::Parked {
                    return true;
                }
            }

            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// Only one pause may be pending; a second request is rejected until
    /// resume clears the gate.
    #[test]
    fn test_single_pending_pause() {
        let gate = PauseGate::new();
        assert!(gate.request());
        assert!(!gate.request());
        assert!(gate.release());
        assert!(gate.request());
    }

    /// Resume without a pending pause is rejected.
    #[test]
    fn test_release_requires_pending_pause() {
        let gate = PauseGate::new();
        assert!(!gate.release());
    }

    /// A resume that lands before the dispatcher parks cancels the pause.
    #[test]
    fn test_release_before_park() {
        let gate = PauseGate::new();
        assert!(gate.request());
        assert!(gate.release());
        assert!(!gate.take_park());
    }

    /// Parked dispatchers wake on resume.
    #[tokio::test]
    async fn test_park_and_release() {
        let gate = Arc::new(PauseGate::new());
        assert!(gate.request());
        assert!(gate.take_park());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_released(&CancellationToken::new()).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(gate.release());

        let resumed = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(resumed);
    }

    /// Cancellation wakes a parked dispatcher without a resume.
    #[tokio::test]
    async fn test_cancellation_wakes_parked() {
        let gate = Arc::new(PauseGate::new());
        assert!(gate.request());
        assert!(gate.take_park());

        let cancel = CancellationToken::new();
        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.wait_released(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let resumed = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!resumed);
    }
}

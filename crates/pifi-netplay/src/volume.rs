use std::time::Duration;

use tokio::time::Instant;

/// Extra time a released slider stays locked after the last poll interval.
const RELEASE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockState {
    Free,
    Held,
    Releasable { since: Instant },
}

/// Keeps polled volume values from yanking a slider the user is moving.
///
/// A drag grabs the lock. Letting go marks it releasable, and it frees
/// itself once a full poll interval plus a grace period has passed, so a
/// poll that was already in flight cannot overwrite the new value.
#[derive(Debug, Clone, Copy)]
pub struct VolumeLock {
    state: LockState,
    release_after: Duration,
}

impl VolumeLock {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: LockState::Free,
            release_after: poll_interval + RELEASE_GRACE,
        }
    }

    pub fn grab(&mut self) {
        self.state = LockState::Held;
    }

    pub fn mark_releasable(&mut self, now: Instant) {
        if self.state == LockState::Held {
            self.state = LockState::Releasable { since: now };
        }
    }

    /// Whether a polled value may be applied at `now`.
    pub fn accepts(&mut self, now: Instant) -> bool {
        match self.state {
            LockState::Free => true,
            LockState::Held => false,
            LockState::Releasable { since } => {
                if now.duration_since(since) >= self.release_after {
                    self.state = LockState::Free;
                    true
                } else {
                    false
                }
            }
        }
    }
}

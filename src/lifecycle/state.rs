use super::status::ActivityStatus;
use crate::core::{Millis, NEVER};
use serde::{Deserialize, Serialize};

/// Stored lifecycle data of one resource.
///
/// `committed_status` is what side effects have actually been applied for.
/// The live status is never stored; it is derived from `last_activity` on
/// every query. `next_wake` is only a scheduling hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleState {
    pub last_activity: Millis,
    pub committed_status: ActivityStatus,
    pub next_wake: Millis,
}

impl LifecycleState {
    pub fn new(last_activity: Millis, committed_status: ActivityStatus, next_wake: Millis) -> Self {
        Self {
            last_activity,
            committed_status,
            next_wake,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.committed_status.is_terminal()
    }

    /// Moves `last_activity` forward; older timestamps are ignored.
    pub(crate) fn touch(&mut self, now: Millis) -> bool {
        if now > self.last_activity {
            self.last_activity = now;
            true
        } else {
            false
        }
    }

    pub(crate) fn terminate(&mut self) {
        self.committed_status = ActivityStatus::Culled;
        self.next_wake = NEVER;
    }
}

use crate::config::CullingConfig;
use crate::core::{Millis, NEVER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a resource sits in its lifecycle. Ordered by how far it has decayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Active,
    Dormant,
    Culled,
}

impl ActivityStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivityStatus::Culled)
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityStatus::Active => f.write_str("active"),
            ActivityStatus::Dormant => f.write_str("dormant"),
            ActivityStatus::Culled => f.write_str("culled"),
        }
    }
}

/// Status implied by the time elapsed since `last_activity`.
///
/// A resource sitting exactly on a threshold has already crossed it.
pub fn compute_status(now: Millis, last_activity: Millis, config: &CullingConfig) -> ActivityStatus {
    let elapsed = now.saturating_sub(last_activity);
    if elapsed >= config.total_lifetime_ms {
        ActivityStatus::Culled
    } else if elapsed >= config.lifetime_ms {
        ActivityStatus::Dormant
    } else {
        ActivityStatus::Active
    }
}

/// Latest instant by which the entity has to be reconciled again.
///
/// Active resources wake exactly when they would turn dormant. Dormant
/// ones are re-checked every grace period instead of precisely at the
/// cull threshold.
pub fn compute_next_wake(
    status: ActivityStatus,
    last_activity: Millis,
    config: &CullingConfig,
    now: Millis,
) -> Millis {
    match status {
        ActivityStatus::Culled => NEVER,
        ActivityStatus::Dormant => now.saturating_add(config.dormant_grace_ms),
        ActivityStatus::Active => last_activity.saturating_add(config.lifetime_ms),
    }
}

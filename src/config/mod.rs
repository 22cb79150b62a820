// ============================================================================
// Lifecycle thresholds
// ============================================================================
//
// One `CullingConfig` applies to every resource of a class. A
// `CullingPolicy` maps class names to their configs with a fallback.
//
// ============================================================================

pub mod duration;

use crate::core::{Capability, CullError, Millis, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub use duration::parse_duration_ms;

/// Thresholds driving the active -> dormant -> culled lifecycle of one resource class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CullingConfig {
    /// Milliseconds without activity after which a resource goes dormant.
    #[serde(rename = "lifetime", deserialize_with = "duration::deserialize_ms")]
    pub lifetime_ms: Millis,
    /// Milliseconds without activity after which a resource is culled.
    #[serde(rename = "total_lifetime", deserialize_with = "duration::deserialize_ms")]
    pub total_lifetime_ms: Millis,
    /// How long to wait before re-checking a dormant resource.
    #[serde(rename = "dormant_grace", deserialize_with = "duration::deserialize_ms")]
    pub dormant_grace_ms: Millis,
    /// Permission an actor needs for its activity to refresh the resource.
    #[serde(default)]
    pub refresh_capability: Capability,
}

impl CullingConfig {
    pub fn new(lifetime_ms: Millis, total_lifetime_ms: Millis, dormant_grace_ms: Millis) -> Self {
        Self {
            lifetime_ms,
            total_lifetime_ms,
            dormant_grace_ms,
            refresh_capability: Capability::default(),
        }
    }

    /// Set the dormancy threshold
    pub fn lifetime(mut self, ms: Millis) -> Self {
        self.lifetime_ms = ms;
        self
    }

    /// Set the cull threshold
    pub fn total_lifetime(mut self, ms: Millis) -> Self {
        self.total_lifetime_ms = ms;
        self
    }

    /// Set the dormant re-check interval
    pub fn dormant_grace(mut self, ms: Millis) -> Self {
        self.dormant_grace_ms = ms;
        self
    }

    /// Set the capability required for activity to count
    pub fn refresh_capability(mut self, capability: Capability) -> Self {
        self.refresh_capability = capability;
        self
    }

    /// Rejects thresholds that would make a resource permanently culled or
    /// leave no dormant window.
    pub fn validate(&self) -> Result<()> {
        if self.lifetime_ms < 0 {
            return Err(CullError::InvalidConfig(format!(
                "lifetime must not be negative (got {}ms)",
                self.lifetime_ms
            )));
        }
        if self.total_lifetime_ms < 0 {
            return Err(CullError::InvalidConfig(format!(
                "total_lifetime must not be negative (got {}ms)",
                self.total_lifetime_ms
            )));
        }
        if self.dormant_grace_ms < 0 {
            return Err(CullError::InvalidConfig(format!(
                "dormant_grace must not be negative (got {}ms)",
                self.dormant_grace_ms
            )));
        }
        if self.lifetime_ms >= self.total_lifetime_ms {
            return Err(CullError::InvalidConfig(format!(
                "lifetime ({}ms) must be shorter than total_lifetime ({}ms)",
                self.lifetime_ms, self.total_lifetime_ms
            )));
        }
        Ok(())
    }
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self::new(
            14 * 86_400_000, // two weeks
            28 * 86_400_000,
            86_400_000,
        )
    }
}

/// Per-class lifecycle thresholds with a fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CullingPolicy {
    #[serde(default)]
    pub default: CullingConfig,
    #[serde(default)]
    pub classes: HashMap<String, CullingConfig>,
}

impl CullingPolicy {
    pub fn new(default: CullingConfig) -> Self {
        Self {
            default,
            classes: HashMap::new(),
        }
    }

    /// Add or replace the thresholds of one class
    pub fn with_class(mut self, class: impl Into<String>, config: CullingConfig) -> Self {
        self.classes.insert(class.into(), config);
        self
    }

    /// Thresholds for `class`, or the default when the class has none.
    pub fn for_class(&self, class: &str) -> &CullingConfig {
        self.classes.get(class).unwrap_or(&self.default)
    }

    pub fn validate(&self) -> Result<()> {
        self.default
            .validate()
            .map_err(|err| CullError::InvalidConfig(format!("default: {}", err)))?;

        let mut names = self.classes.keys().collect::<Vec<_>>();
        names.sort();
        for name in names {
            self.classes[name]
                .validate()
                .map_err(|err| CullError::InvalidConfig(format!("class '{}': {}", name, err)))?;
        }
        Ok(())
    }

    /// Parse and validate a policy from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(json)
            .map_err(|err| CullError::InvalidConfig(format!("policy json: {}", err)))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            CullError::InvalidConfig(format!("read {}: {}", path.display(), err))
        })?;
        Self::from_json_str(&text)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Wake time of an entity that never needs to be reconciled again.
pub const NEVER: Millis = i64::MAX;

/// Identity of a monitored resource as known to the storage backend.
///
/// Resources that have not been written yet carry [`ResourceId::TRANSIENT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub i64);

impl ResourceId {
    pub const TRANSIENT: ResourceId = ResourceId(-1);

    /// Returns true once the resource has a real storage id.
    #[inline]
    pub fn is_persisted(&self) -> bool {
        self.0 != Self::TRANSIENT.0
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_persisted() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "#transient")
        }
    }
}

/// Key of one lifecycle state machine inside a scheduler.
///
/// Distinct from [`ResourceId`] because every transient resource shares
/// the same storage id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LifecycleId(Uuid);

impl LifecycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LifecycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LifecycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block position of a resource. Field order defines the scheduling
/// tie-break: world, then x, y, z.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Location {
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

/// Whoever performed an observed action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(pub String);

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permission node an actor must hold on a resource for its activity to count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability(pub String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Capability {
    fn default() -> Self {
        Self::new("lifecycle.refresh")
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a resource was destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyCause {
    /// Removed by the lifecycle after exceeding its total lifetime.
    LifecycleCull,
    /// Broken or removed by an actor.
    Player,
    /// Removed by an administrative cleanup.
    Cleanup,
    Other(String),
}

impl fmt::Display for DestroyCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestroyCause::LifecycleCull => f.write_str("lifecycle cull"),
            DestroyCause::Player => f.write_str("player"),
            DestroyCause::Cleanup => f.write_str("cleanup"),
            DestroyCause::Other(reason) => f.write_str(reason),
        }
    }
}

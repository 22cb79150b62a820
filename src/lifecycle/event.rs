use crate::core::{Actor, DestroyCause};
use serde::{Deserialize, Serialize};

/// Something that happened to a resource, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceEvent {
    /// An interaction was observed. Without an actor nothing can be
    /// checked for permission and the event is ignored.
    Activity { actor: Option<Actor> },
    /// The resource left the world, for any reason.
    Destroyed { cause: DestroyCause },
    /// Any other lifecycle notification (creation, load, unload).
    Lifecycle,
}

impl ResourceEvent {
    pub fn activity(actor: impl Into<String>) -> Self {
        ResourceEvent::Activity {
            actor: Some(Actor::new(actor)),
        }
    }

    pub fn destroyed(cause: DestroyCause) -> Self {
        ResourceEvent::Destroyed { cause }
    }

    pub fn is_lifecycle_event(&self) -> bool {
        !matches!(self, ResourceEvent::Activity { .. })
    }
}

/// Side effect applied by a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Deactivated,
    Reactivated,
    Culled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event: ResourceEvent =
            serde_json::from_str(r#"{"kind": "activity", "actor": "alice"}"#).unwrap();
        assert_eq!(event, ResourceEvent::activity("alice"));

        let event: ResourceEvent =
            serde_json::from_str(r#"{"kind": "destroyed", "cause": "player"}"#).unwrap();
        assert_eq!(event, ResourceEvent::destroyed(DestroyCause::Player));
        assert!(event.is_lifecycle_event());
    }
}

pub mod event;
pub mod machine;
pub mod state;
pub mod status;

pub use event::{ResourceEvent, Transition};
pub use machine::{DormantCulling, PersistOutcome};
pub use state::LifecycleState;
pub use status::{ActivityStatus, compute_next_wake, compute_status};

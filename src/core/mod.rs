pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CullError, Result};
pub use types::{Actor, Capability, DestroyCause, LifecycleId, Location, Millis, NEVER, ResourceId};

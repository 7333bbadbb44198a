//! Best-effort push channel from running tasks to live observers.

mod channel;

pub use channel::{ObservationPayload, ObserverRegistry};

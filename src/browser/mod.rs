//! Browser automation module: engine lifecycle, sessions and snapshots.

mod driver;
mod engine;
mod session;
mod snapshot;
mod stealth;

#[cfg(test)]
pub(crate) mod testkit;

pub use driver::{CdpPage, DriverError, PageDriver};
pub use engine::{BrowserEngine, EngineConfig, EngineError};
pub use session::{AutomationSession, SessionError, SessionManager, SessionMode, SessionProvider};
pub use snapshot::Snapshot;
pub use stealth::{random_user_agent, STEALTH_INIT_SCRIPT};

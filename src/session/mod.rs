//! AT command session
//!
//! Wires the line receiver, the deferred work tokens and the mode guard
//! into a single session object, [`AtHost`].

pub mod error;
pub mod host;
pub mod mode_guard;
pub mod trigger;

pub use error::{AtHostError, SessionState};
pub use host::AtHost;
pub use mode_guard::{GuardState, ModeGuard};
pub use trigger::DispatchTrigger;

//! Session handling
//!
//! The login gate and line routing applied to every connection.

pub mod protocol;
pub mod state;

pub use protocol::{LineOutcome, SessionProtocol};
pub use state::SessionPhase;

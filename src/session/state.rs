//! Session state machine
//!
//! A connection starts anonymous and becomes identified on its first
//! successful `#login`. There is no way back: the identified state lasts
//! until the connection goes away.

use crate::registry::ConnectionEntry;

/// Login phase of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, no login yet; nothing is relayed on its behalf
    Anonymous,
    /// Logged in with a fixed identifier
    Identified,
}

impl SessionPhase {
    /// Current phase of a connection
    pub fn of(entry: &ConnectionEntry) -> Self {
        if entry.is_identified() {
            SessionPhase::Identified
        } else {
            SessionPhase::Anonymous
        }
    }
}

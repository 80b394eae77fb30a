//! Registry error types
//!
//! Error types for connection registry operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No live connection with this ID
    ConnectionNotFound(u64),
    /// Connection already carries a login identifier
    AlreadyLoggedIn(String),
    /// Connection is closed or its writer has gone away
    ConnectionClosed(u64),
    /// Outbound queue was full; the connection has been aborted
    QueueFull(u64),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::ConnectionNotFound(id) => write!(f, "Connection not found: {}", id),
            RegistryError::AlreadyLoggedIn(login_id) => {
                write!(f, "Connection already logged in as {}", login_id)
            }
            RegistryError::ConnectionClosed(id) => write!(f, "Connection closed: {}", id),
            RegistryError::QueueFull(id) => {
                write!(f, "Outbound queue full, connection {} dropped", id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

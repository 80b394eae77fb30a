//! Client configuration

use crate::protocol::constants::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_MAX_LINE_LENGTH};

/// Client configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identifier sent with `#login` right after connecting
    pub login_id: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Longest accepted line from the server
    pub max_line_length: usize,

    /// Capacity of the event channel
    pub event_buffer: usize,
}

impl ClientConfig {
    /// Create a config for `login_id` against the default host and port
    pub fn new(login_id: impl Into<String>) -> Self {
        Self {
            login_id: login_id.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            event_buffer: 256,
        }
    }

    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// The login line sent on connect
    pub fn login_line(&self) -> String {
        format!("#login {}", self.login_id)
    }
}

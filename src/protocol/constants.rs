//! Wire protocol constants

/// Default TCP port for the relay
pub const DEFAULT_PORT: u16 = 5555;

/// Default host clients connect to
pub const DEFAULT_HOST: &str = "localhost";

/// Maximum accepted line length in bytes (excluding the terminator)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8191;

/// Lines that may wait for a connection's writer before it is dropped
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1024;

/// Prefix that marks a client line as the login command
pub const LOGIN_COMMAND: &str = "#login";

/// Prefix that marks an operator or client console line as a command
pub const COMMAND_PREFIX: char = '#';

/// Separator between the sender identity and the relayed text
pub const SENDER_SEPARATOR: &str = "> ";

/// Sender label used for operator broadcasts
pub const SERVER_SENDER: &str = "SERVER msg";

//! Error types for the chat relay

use std::fmt;
use std::io;

use crate::protocol::codec::CodecError;
use crate::registry::RegistryError;
use crate::server::control::ControlError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error on a socket or the console
    Io(io::Error),
    /// Wire protocol error
    Protocol(ProtocolError),
    /// Connection registry error
    Registry(RegistryError),
    /// Operator command could not be applied
    Control(ControlError),
    /// Connection was closed
    ConnectionClosed,
    /// Client is already connected to a server
    AlreadyConnected,
}

/// Errors raised while framing or interpreting wire lines
#[derive(Debug)]
pub enum ProtocolError {
    /// Line framing failed
    Codec(CodecError),
    /// Message arrived in a state where it is not allowed
    UnexpectedMessage(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Control(e) => write!(f, "Control error: {}", e),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::AlreadyConnected => write!(f, "Already connected"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Codec(e) => write!(f, "{}", e),
            ProtocolError::UnexpectedMessage(msg) => write!(f, "Unexpected message: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(ProtocolError::Codec(e)) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Control(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(io) => Error::Io(io),
            other => Error::Protocol(ProtocolError::Codec(other)),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<ControlError> for Error {
    fn from(e: ControlError) -> Self {
        Error::Control(e)
    }
}

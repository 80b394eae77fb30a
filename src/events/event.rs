//! Notification event records

use std::fmt;
use std::net::SocketAddr;

/// Why a login attempt or pre-login message was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginRejection {
    /// Connection is already identified under this ID
    AlreadyLoggedIn(String),
    /// `#login` carried no identifier
    MissingLoginId,
    /// Chat text arrived before `#login`
    NotLoggedIn,
}

impl fmt::Display for LoginRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginRejection::AlreadyLoggedIn(id) => write!(f, "already logged in as {}", id),
            LoginRejection::MissingLoginId => write!(f, "missing login ID"),
            LoginRejection::NotLoggedIn => write!(f, "message sent before login"),
        }
    }
}

/// Lifecycle and protocol events raised by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Transport accepted a connection
    ClientConnected {
        connection_id: u64,
        peer_addr: SocketAddr,
    },
    /// Connection went away
    ClientDisconnected {
        connection_id: u64,
        peer_addr: SocketAddr,
        login_id: Option<String>,
    },
    /// Connection identified itself
    LoginSucceeded { connection_id: u64, login_id: String },
    /// Login attempt or pre-login traffic refused
    LoginRejected {
        connection_id: u64,
        reason: LoginRejection,
    },
    /// Participant message handed to the broadcast router
    MessageRelayed { login_id: String, message: String },
    /// Server began accepting connections
    ServerStarted { port: u16 },
    /// Server stopped accepting connections
    ServerStopped,
    /// Server stopped and dropped every connection
    ServerClosed,
    /// Listener failed
    ListeningException { error: String },
    /// Operation on a single connection failed
    ClientException { connection_id: u64, error: String },
}

impl ChatEvent {
    /// Short machine-readable event name
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::ClientConnected { .. } => "client-connected",
            ChatEvent::ClientDisconnected { .. } => "client-disconnected",
            ChatEvent::LoginSucceeded { .. } => "login-succeeded",
            ChatEvent::LoginRejected { .. } => "login-rejected",
            ChatEvent::MessageRelayed { .. } => "message-relayed",
            ChatEvent::ServerStarted { .. } => "server-started",
            ChatEvent::ServerStopped => "server-stopped",
            ChatEvent::ServerClosed => "server-closed",
            ChatEvent::ListeningException { .. } => "listening-exception",
            ChatEvent::ClientException { .. } => "client-exception",
        }
    }
}

/// One-line human-readable rendering used for observer notifications
impl fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatEvent::ClientConnected {
                connection_id,
                peer_addr,
            } => write!(f, "Client connected: #{} ({})", connection_id, peer_addr),
            ChatEvent::ClientDisconnected {
                connection_id,
                peer_addr,
                login_id: Some(login_id),
            } => write!(
                f,
                "Client disconnected: #{} ({}) [{}]",
                connection_id, peer_addr, login_id
            ),
            ChatEvent::ClientDisconnected {
                connection_id,
                peer_addr,
                login_id: None,
            } => write!(f, "Client disconnected: #{} ({})", connection_id, peer_addr),
            ChatEvent::LoginSucceeded { login_id, .. } => {
                write!(f, "Client logged in with ID: {}", login_id)
            }
            ChatEvent::LoginRejected {
                connection_id,
                reason,
            } => write!(f, "Login rejected for client #{}: {}", connection_id, reason),
            ChatEvent::MessageRelayed { login_id, message } => {
                write!(f, "Message received from {}: {}", login_id, message)
            }
            ChatEvent::ServerStarted { port } => {
                write!(f, "Server listening for connections on port {}", port)
            }
            ChatEvent::ServerStopped => write!(f, "Server has stopped listening for connections."),
            ChatEvent::ServerClosed => write!(f, "Server closed, all clients disconnected."),
            ChatEvent::ListeningException { error } => {
                write!(f, "Error while listening for connections: {}", error)
            }
            ChatEvent::ClientException {
                connection_id,
                error,
            } => write!(f, "Error with client #{}: {}", connection_id, error),
        }
    }
}

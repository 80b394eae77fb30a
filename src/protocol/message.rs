//! Client line classification and server reply texts
//!
//! Every inbound line is trimmed and then classified as either a login
//! attempt or chat text. The login identifier is the whole remainder after
//! the first run of whitespace, so identifiers may themselves contain spaces.

use std::fmt;

use super::constants::{LOGIN_COMMAND, SENDER_SEPARATOR, SERVER_SENDER};

/// A classified client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    /// `#login <id>` with a non-blank identifier
    Login(String),
    /// `#login` with a missing or blank identifier
    LoginUsage,
    /// Anything else, already trimmed; may be empty
    Chat(String),
}

impl ClientLine {
    /// Classify a raw line received from a client
    pub fn parse(raw: &str) -> Self {
        let line = raw.trim();

        if !line.starts_with(LOGIN_COMMAND) {
            return ClientLine::Chat(line.to_string());
        }

        match line.split_once(char::is_whitespace) {
            Some((_, rest)) if !rest.trim().is_empty() => ClientLine::Login(rest.trim().to_string()),
            _ => ClientLine::LoginUsage,
        }
    }

    /// Check if this line is any form of the login command
    pub fn is_login_command(&self) -> bool {
        matches!(self, ClientLine::Login(_) | ClientLine::LoginUsage)
    }
}

/// Unicast replies sent by the server to the originating connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Second login attempt on an identified connection
    AlreadyLoggedIn(String),
    /// Login command without an identifier
    LoginUsage,
    /// Login accepted
    Welcome(String),
    /// Chat text sent before logging in
    MustLoginFirst,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::AlreadyLoggedIn(id) => write!(f, "Error: Already logged in as {}", id),
            Reply::LoginUsage => write!(f, "Error: CMD Usage is #login <loginId>"),
            Reply::Welcome(id) => write!(f, "Login working! Welcome {}!", id),
            Reply::MustLoginFirst => write!(
                f,
                "Error: Must login with first command which is #login <loginId>!!!"
            ),
        }
    }
}

/// Format a participant message for fan-out: `<loginId>> <text>`
pub fn format_chat(login_id: &str, text: &str) -> String {
    format!("{}{}{}", login_id, SENDER_SEPARATOR, text)
}

/// Format an operator broadcast: `SERVER msg> <text>`
pub fn format_server_broadcast(text: &str) -> String {
    format_chat(SERVER_SENDER, text)
}

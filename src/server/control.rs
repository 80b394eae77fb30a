//! Operator console
//!
//! Parses operator input and applies it to a [`ChatServer`]. Lines starting
//! with `#` are admin commands (command names are case-insensitive); any
//! other line is broadcast to every client as `SERVER msg> <text>`.
//!
//! The console never ends the process itself. `#quit` closes the server and
//! returns [`ConsoleOutcome::Quit`] so the driver can exit.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::protocol::constants::COMMAND_PREFIX;
use crate::protocol::format_server_broadcast;
use crate::router::BroadcastRouter;
use crate::server::handler::ConnectionHandler;
use crate::server::listener::ChatServer;

/// Error type for control surface operations
///
/// `Display` renders the text shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// `start` while already listening
    AlreadyListening,
    /// Binding the listening socket failed
    StartFailed(String),
    /// `stop` while not listening
    AlreadyStopped,
    /// Accept loop could not be shut down cleanly
    StopFailed(String),
    /// `setport` while listening
    PortChangeWhileListening,
    /// `setport` without an argument
    MissingPort,
    /// `setport` argument is not a number
    InvalidPort(String),
    /// `setport` argument is a number outside the port range
    PortOutOfRange(i64),
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::AlreadyListening => write!(f, "Server already listening."),
            ControlError::StartFailed(_) => write!(f, "Start failed."),
            ControlError::AlreadyStopped => write!(f, "Already stopped."),
            ControlError::StopFailed(_) => write!(f, "Error closing."),
            ControlError::PortChangeWhileListening => {
                write!(f, "Cannot change port while server is open. Use #close first.")
            }
            ControlError::MissingPort => write!(f, "Usage: #setport <port>"),
            ControlError::InvalidPort(_) => write!(f, "Port must be a number."),
            ControlError::PortOutOfRange(_) => write!(f, "Port must be between 0 and 65535."),
        }
    }
}

impl std::error::Error for ControlError {}

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Quit,
    Stop,
    Close,
    SetPort(Option<String>),
    Start,
    GetPort,
    Status,
    Unknown(String),
}

impl AdminCommand {
    /// Parse a console line; `None` if it is not a command
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with(COMMAND_PREFIX) {
            return None;
        }

        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().map(str::to_string);

        let command = match name.as_str() {
            "#quit" => AdminCommand::Quit,
            "#stop" => AdminCommand::Stop,
            "#close" => AdminCommand::Close,
            "#setport" => AdminCommand::SetPort(arg),
            "#start" => AdminCommand::Start,
            "#getport" => AdminCommand::GetPort,
            "#status" => AdminCommand::Status,
            _ => AdminCommand::Unknown(name),
        };

        Some(command)
    }
}

/// Parse a `#setport` argument
pub fn parse_port(arg: Option<&str>) -> std::result::Result<u16, ControlError> {
    let arg = arg.map(str::trim).ok_or(ControlError::MissingPort)?;
    let value: i64 = arg
        .parse()
        .map_err(|_| ControlError::InvalidPort(arg.to_string()))?;

    u16::try_from(value).map_err(|_| ControlError::PortOutOfRange(value))
}

/// Result of one console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOutcome {
    /// Show this line to the operator
    Display(String),
    /// Nothing to show; events report the result
    Silent,
    /// Server closed, driver should exit
    Quit,
}

/// Operator console bound to a server
pub struct ServerConsole<H: ConnectionHandler> {
    server: Arc<ChatServer<H>>,
    router: BroadcastRouter,
}

impl<H: ConnectionHandler> ServerConsole<H> {
    pub fn new(server: Arc<ChatServer<H>>, router: BroadcastRouter) -> Self {
        Self { server, router }
    }

    /// Handle one line of operator input
    pub async fn handle_line(&self, line: &str) -> ConsoleOutcome {
        match AdminCommand::parse(line) {
            Some(command) => self.submit_admin_command(command).await,
            None => self.submit_broadcast(line).await,
        }
    }

    /// Broadcast operator text to every client, unprefixed by any login
    pub async fn submit_broadcast(&self, text: &str) -> ConsoleOutcome {
        self.router.broadcast_system(text).await;
        ConsoleOutcome::Display(format_server_broadcast(text))
    }

    /// Apply an admin command
    pub async fn submit_admin_command(&self, command: AdminCommand) -> ConsoleOutcome {
        tracing::debug!(command = ?command, "Admin command");

        let result = match command {
            AdminCommand::Quit => {
                if let Err(e) = self.server.close().await {
                    tracing::warn!(error = %e, "Close on quit failed");
                }
                return ConsoleOutcome::Quit;
            }
            AdminCommand::Stop => self.server.stop().await.map(|_| None),
            AdminCommand::Close => self.server.close().await.map(|_| None),
            AdminCommand::Start => self.server.start().await.map(|_| None),
            AdminCommand::SetPort(arg) => self.set_port(arg.as_deref()).await,
            AdminCommand::GetPort => Ok(Some(format!("Port: {}", self.server.port().await))),
            AdminCommand::Status => Ok(Some(self.server.status().await.to_string())),
            AdminCommand::Unknown(_) => Ok(Some("Unknown command.".to_string())),
        };

        match result {
            Ok(Some(text)) => ConsoleOutcome::Display(text),
            Ok(None) => ConsoleOutcome::Silent,
            Err(e) => {
                tracing::debug!(error = ?e, "Admin command failed");
                ConsoleOutcome::Display(e.to_string())
            }
        }
    }

    async fn set_port(&self, arg: Option<&str>) -> std::result::Result<Option<String>, ControlError> {
        // Refuse while open before looking at the argument
        if self.server.is_listening().await {
            return Err(ControlError::PortChangeWhileListening);
        }

        let port = parse_port(arg)?;
        self.server.set_port(port).await?;
        Ok(Some(format!("Port set to {}", self.server.port().await)))
    }

    /// Read operator lines until `#quit` or end of input
    ///
    /// Each displayed line is written to `output` prefixed with `> `.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await? {
            match self.handle_line(&line).await {
                ConsoleOutcome::Display(text) => {
                    output.write_all(format!("> {}\n", text).as_bytes()).await?;
                    output.flush().await?;
                }
                ConsoleOutcome::Silent => {}
                ConsoleOutcome::Quit => return Ok(()),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChatEvent, EventSink};
    use crate::registry::ConnectionRegistry;
    use crate::server::config::ServerConfig;
    use crate::session::SessionProtocol;

    fn console() -> (ServerConsole<SessionProtocol>, Arc<ChatServer<SessionProtocol>>, Arc<EventSink>) {
        let events = Arc::new(EventSink::new());
        let protocol = SessionProtocol::new(Arc::new(ConnectionRegistry::new()), Arc::clone(&events));
        let router = protocol.router().clone();
        let server = Arc::new(ChatServer::new(
            ServerConfig::with_port(0).host("127.0.0.1"),
            protocol,
        ));
        (ServerConsole::new(Arc::clone(&server), router), server, events)
    }

    fn display(text: &str) -> ConsoleOutcome {
        ConsoleOutcome::Display(text.to_string())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(AdminCommand::parse("#quit"), Some(AdminCommand::Quit));
        assert_eq!(AdminCommand::parse("#STOP"), Some(AdminCommand::Stop));
        assert_eq!(AdminCommand::parse("  #close  "), Some(AdminCommand::Close));
        assert_eq!(
            AdminCommand::parse("#setport 9000"),
            Some(AdminCommand::SetPort(Some("9000".into())))
        );
        assert_eq!(AdminCommand::parse("#setport"), Some(AdminCommand::SetPort(None)));
        assert_eq!(AdminCommand::parse("#start"), Some(AdminCommand::Start));
        assert_eq!(AdminCommand::parse("#GetPort"), Some(AdminCommand::GetPort));
        assert_eq!(AdminCommand::parse("#status"), Some(AdminCommand::Status));
        assert_eq!(
            AdminCommand::parse("#reboot now"),
            Some(AdminCommand::Unknown("#reboot".into()))
        );
        assert_eq!(AdminCommand::parse("hello everyone"), None);
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port(Some("9000")), Ok(9000));
        assert_eq!(parse_port(Some(" 0 ")), Ok(0));
        assert_eq!(parse_port(None), Err(ControlError::MissingPort));
        assert_eq!(
            parse_port(Some("abc")),
            Err(ControlError::InvalidPort("abc".into()))
        );
        assert_eq!(parse_port(Some("70000")), Err(ControlError::PortOutOfRange(70000)));
        assert_eq!(parse_port(Some("-1")), Err(ControlError::PortOutOfRange(-1)));
    }

    #[test]
    fn test_operator_texts() {
        assert_eq!(
            ControlError::PortChangeWhileListening.to_string(),
            "Cannot change port while server is open. Use #close first."
        );
        assert_eq!(ControlError::AlreadyStopped.to_string(), "Already stopped.");
        assert_eq!(ControlError::StartFailed("x".into()).to_string(), "Start failed.");
        assert_eq!(ControlError::StopFailed("x".into()).to_string(), "Error closing.");
    }

    #[tokio::test]
    async fn test_setport_scenario() {
        let (console, server, _events) = console();
        server.start().await.unwrap();

        assert_eq!(
            console.handle_line("#setport 9000").await,
            display("Cannot change port while server is open. Use #close first.")
        );
        assert_eq!(console.handle_line("#getport").await, display("Port: 0"));

        assert_eq!(console.handle_line("#stop").await, ConsoleOutcome::Silent);
        assert_eq!(console.handle_line("#setport 9000").await, display("Port set to 9000"));
        assert_eq!(console.handle_line("#getport").await, display("Port: 9000"));
    }

    #[tokio::test]
    async fn test_setport_errors_while_stopped() {
        let (console, _server, _events) = console();

        assert_eq!(console.handle_line("#setport").await, display("Usage: #setport <port>"));
        assert_eq!(
            console.handle_line("#setport abc").await,
            display("Port must be a number.")
        );
        assert_eq!(console.handle_line("#getport").await, display("Port: 0"));
    }

    #[tokio::test]
    async fn test_start_stop_commands() {
        let (console, _server, events) = console();
        let (_, mut rx) = events.subscribe_channel();

        assert_eq!(console.handle_line("#stop").await, display("Already stopped."));
        assert_eq!(console.handle_line("#start").await, ConsoleOutcome::Silent);
        assert_eq!(console.handle_line("#start").await, display("Server already listening."));
        assert_eq!(console.handle_line("#close").await, ConsoleOutcome::Silent);

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|n| n.event.kind())
            .collect();
        assert_eq!(kinds, ["server-started", "server-stopped", "server-closed"]);
    }

    #[tokio::test]
    async fn test_unknown_and_quit() {
        let (console, server, events) = console();
        let (_, mut rx) = events.subscribe_channel();
        server.start().await.unwrap();

        assert_eq!(console.handle_line("#frobnicate").await, display("Unknown command."));
        assert_eq!(console.handle_line("#quit").await, ConsoleOutcome::Quit);
        assert!(!server.is_listening().await);

        let last = std::iter::from_fn(|| rx.try_recv().ok()).last().unwrap();
        assert_eq!(last.event, ChatEvent::ServerClosed);
    }

    #[tokio::test]
    async fn test_broadcast_line() {
        let (console, server, _events) = console();
        let registry = Arc::clone(server.handler().registry());
        let addr = "127.0.0.1:40000".parse().unwrap();
        let (_entry, mut rx) = registry.register(1, addr).await;

        assert_eq!(
            console.handle_line("maintenance at noon").await,
            display("SERVER msg> maintenance at noon")
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            crate::registry::Outbound::Line(Arc::from("SERVER msg> maintenance at noon"))
        );
    }

    #[tokio::test]
    async fn test_run_reads_until_quit() {
        let (console, _server, _events) = console();
        let input: &[u8] = b"#getport\n#bogus\n#quit\n#getport\n";
        let mut output = Vec::new();

        console.run(input, &mut output).await.unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "> Port: 0\n> Unknown command.\n"
        );
    }
}

//! Chat client
//!
//! Connects to a relay, logs in immediately, and reports everything the
//! server sends as [`ClientEvent`]s. Also interprets the client console
//! commands (`#logoff`, `#sethost`, ...) via [`ChatClient::handle_input`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::{Error, Result};
use crate::protocol::LineCodec;
use crate::server::control::parse_port;

use super::command::ClientCommand;
use super::config::ClientConfig;

/// Events from the chat client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connected and login line sent
    Connected,
    /// Line received from the server
    Message(String),
    /// Server closed the connection without a prior logoff
    Closed,
    /// Reading from the server failed
    Error(String),
    /// Client logged off
    Disconnected,
}

/// Result of one console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    /// Show this line to the user
    Display(String),
    /// Nothing to show
    Silent,
    /// Client disconnected, driver should exit
    Quit,
    /// Show this line, then the driver should exit
    Terminate(String),
}

struct Session {
    writer: FramedWrite<OwnedWriteHalf, LineCodec>,
    reader: JoinHandle<()>,
    logging_off: Arc<AtomicBool>,
    /// Set by the reader before it reports the end of the connection
    ended: Arc<AtomicBool>,
}

impl Session {
    fn is_live(&self) -> bool {
        !self.ended.load(Ordering::Acquire) && !self.reader.is_finished()
    }
}

/// Line-oriented chat client
///
/// # Example
/// ```no_run
/// use chat_relay::client::{ChatClient, ClientConfig};
///
/// # async fn example() -> chat_relay::error::Result<()> {
/// let config = ClientConfig::new("alice").host("127.0.0.1");
/// let (mut client, mut events) = ChatClient::new(config);
///
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// client.connect().await?;
/// client.send_line("hello").await?;
/// # Ok(())
/// # }
/// ```
pub struct ChatClient {
    config: ClientConfig,
    event_tx: mpsc::Sender<ClientEvent>,
    session: Option<Session>,
}

impl ChatClient {
    /// Create a new client.
    ///
    /// Returns the client and a receiver for events.
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(config.event_buffer.max(1));

        let client = Self {
            config,
            event_tx: tx,
            session: None,
        };

        (client, rx)
    }

    /// Connect and send `#login <loginId>`.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let socket = TcpStream::connect((self.config.host.as_str(), self.config.port)).await?;
        socket.set_nodelay(true)?;
        let (read_half, write_half) = socket.into_split();

        let codec = LineCodec::with_max_length(self.config.max_line_length);
        let mut writer = FramedWrite::new(write_half, codec.clone());
        let mut reader = FramedRead::new(read_half, codec);

        let logging_off = Arc::new(AtomicBool::new(false));
        let ended = Arc::new(AtomicBool::new(false));
        let events = self.event_tx.clone();
        let flag = Arc::clone(&logging_off);
        let done = Arc::clone(&ended);

        let reader = tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(line) => {
                        if events.send(ClientEvent::Message(line)).await.is_err() {
                            done.store(true, Ordering::Release);
                            return;
                        }
                    }
                    Err(e) => {
                        done.store(true, Ordering::Release);
                        if !flag.load(Ordering::Acquire) {
                            let _ = events.send(ClientEvent::Error(e.to_string())).await;
                        }
                        return;
                    }
                }
            }

            done.store(true, Ordering::Release);
            if !flag.load(Ordering::Acquire) {
                let _ = events.send(ClientEvent::Closed).await;
            }
        });

        tracing::debug!(host = %self.config.host, port = self.config.port, "Connected to server");
        let _ = self.event_tx.send(ClientEvent::Connected).await;

        writer.send(self.config.login_line()).await?;

        self.session = Some(Session {
            writer,
            reader,
            logging_off,
            ended,
        });

        Ok(())
    }

    /// Send one line to the server.
    ///
    /// Fails with `ConnectionClosed` once the server has closed the connection.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.reap();
        let session = self.session.as_mut().ok_or(Error::ConnectionClosed)?;
        session.writer.send(line).await?;
        Ok(())
    }

    /// Disconnect without reporting a server-side close.
    pub async fn logoff(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Err(Error::ConnectionClosed);
        };

        session.logging_off.store(true, Ordering::Release);
        let closed = SinkExt::<String>::close(&mut session.writer).await;
        session.reader.abort();

        let _ = self.event_tx.send(ClientEvent::Disconnected).await;
        closed.map_err(Error::from)
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .map(Session::is_live)
            .unwrap_or(false)
    }

    /// Server host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Server port
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Handle one line of user input: a client command or a chat line
    pub async fn handle_input(&mut self, line: &str) -> ClientOutcome {
        let Some(command) = ClientCommand::parse(line) else {
            return match self.send_line(line).await {
                Ok(()) => ClientOutcome::Silent,
                Err(e) => {
                    tracing::warn!(error = %e, "Send failed");
                    ClientOutcome::Terminate(
                        "Could not send message to server.  Terminating client.".to_string(),
                    )
                }
            };
        };

        self.reap();

        match command {
            ClientCommand::Quit => {
                let _ = self.logoff().await;
                ClientOutcome::Quit
            }
            ClientCommand::Logoff => {
                if !self.is_connected() {
                    return display("Already logged off.");
                }
                match self.logoff().await {
                    Ok(()) => display("Logged off."),
                    Err(e) => display(&format!("Error closing connection: {}", e)),
                }
            }
            ClientCommand::SetHost(host) => {
                if self.is_connected() {
                    return display("Error: must log off first.");
                }
                match host {
                    Some(host) => {
                        self.config.host = host;
                        display(&format!("Host set to: {}", self.config.host))
                    }
                    None => display("Usage: #sethost <host>"),
                }
            }
            ClientCommand::SetPort(port) => {
                if self.is_connected() {
                    return display("Error: must log off first.");
                }
                match parse_port(port.as_deref()) {
                    Ok(port) => {
                        self.config.port = port;
                        display(&format!("Port set to: {}", self.config.port))
                    }
                    Err(e) => display(&e.to_string()),
                }
            }
            ClientCommand::Login => {
                if self.is_connected() {
                    return display("Already connected.");
                }
                match self.connect().await {
                    Ok(()) => display(&format!(
                        "Logged in to {}:{}",
                        self.config.host, self.config.port
                    )),
                    Err(e) => display(&format!("Error opening connection: {}", e)),
                }
            }
            ClientCommand::GetHost => display(&format!("Host: {}", self.config.host)),
            ClientCommand::GetPort => display(&format!("Port: {}", self.config.port)),
            ClientCommand::Unknown(_) => display("Unknown command."),
        }
    }

    /// Drop a session whose reader has already ended
    fn reap(&mut self) {
        if self.session.as_ref().is_some_and(|s| !s.is_live()) {
            self.session = None;
        }
    }
}

fn display(text: &str) -> ClientOutcome {
    ClientOutcome::Display(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commands_while_disconnected() {
        let (mut client, _events) = ChatClient::new(ClientConfig::new("alice"));

        assert_eq!(client.handle_input("#logoff").await, display("Already logged off."));
        assert_eq!(
            client.handle_input("#sethost 127.0.0.1").await,
            display("Host set to: 127.0.0.1")
        );
        assert_eq!(client.handle_input("#sethost").await, display("Usage: #sethost <host>"));
        assert_eq!(client.handle_input("#setport 6000").await, display("Port set to: 6000"));
        assert_eq!(client.handle_input("#setport x").await, display("Port must be a number."));
        assert_eq!(client.handle_input("#setport").await, display("Usage: #setport <port>"));
        assert_eq!(client.handle_input("#gethost").await, display("Host: 127.0.0.1"));
        assert_eq!(client.handle_input("#getport").await, display("Port: 6000"));
        assert_eq!(client.handle_input("#what").await, display("Unknown command."));
    }

    #[tokio::test]
    async fn test_send_while_disconnected_fails() {
        let (mut client, _events) = ChatClient::new(ClientConfig::new("alice"));

        assert!(matches!(
            client.send_line("hello").await,
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(
            client.handle_input("hello").await,
            ClientOutcome::Terminate(
                "Could not send message to server.  Terminating client.".into()
            )
        );
    }

    #[tokio::test]
    async fn test_quit_while_disconnected() {
        let (mut client, _events) = ChatClient::new(ClientConfig::new("alice"));

        assert_eq!(client.handle_input("#quit").await, ClientOutcome::Quit);
    }
}

//! Session protocol
//!
//! Classifies each inbound line and enforces the login gate:
//!
//! ```text
//!                 #login <id>  (slot empty)
//!   ┌───────────┐ ─────────────────────────► ┌────────────┐
//!   │ Anonymous │                            │ Identified │ ──► chat text: "<id>> <text>" to all
//!   └───────────┘                            └────────────┘
//!     │  #login (blank)  → usage reply           │  #login ... → "already logged in" reply
//!     │  chat text       → reply, then close     │
//! ```
//!
//! Replies go to the originating connection only. Nothing is ever broadcast
//! for a login line, and nothing is broadcast on behalf of an anonymous
//! connection. Chat text from an identified connection is relayed even when
//! it is empty, and the sender receives its own line back.

use std::sync::Arc;

use crate::error::Error;
use crate::events::{ChatEvent, EventSink, LoginRejection};
use crate::protocol::{ClientLine, Reply};
use crate::registry::{ConnectionEntry, ConnectionRegistry, RegistryError};
use crate::router::BroadcastRouter;
use crate::server::handler::ConnectionHandler;
use crate::stats::RelayCounters;

use super::state::SessionPhase;

/// What a single inbound line resulted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Connection became identified
    LoggedIn(String),
    /// Login refused, or chat text refused before login
    Rejected(LoginRejection),
    /// Chat text relayed to every connection
    Relayed,
    /// Connection is closing; line dropped
    Ignored,
}

/// Login gate and message routing for all connections
pub struct SessionProtocol {
    registry: Arc<ConnectionRegistry>,
    router: BroadcastRouter,
    events: Arc<EventSink>,
    counters: Arc<RelayCounters>,
}

impl SessionProtocol {
    /// Create the protocol over a registry, publishing to `events`
    pub fn new(registry: Arc<ConnectionRegistry>, events: Arc<EventSink>) -> Self {
        let counters = Arc::new(RelayCounters::new());
        let router = BroadcastRouter::new(
            Arc::clone(&registry),
            Arc::clone(&events),
            Arc::clone(&counters),
        );

        Self {
            registry,
            router,
            events,
            counters,
        }
    }

    /// Router used for participant and operator broadcasts
    pub fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    /// Event sink this protocol publishes to
    pub fn events(&self) -> &Arc<EventSink> {
        &self.events
    }

    /// Apply one inbound line from `conn`
    pub async fn handle_line(&self, conn: &ConnectionEntry, raw: &str) -> LineOutcome {
        if conn.is_closed() {
            return LineOutcome::Ignored;
        }

        let line = ClientLine::parse(raw);

        match (SessionPhase::of(conn), line) {
            (SessionPhase::Identified, line) if line.is_login_command() => {
                let current = conn.login_id().unwrap_or_default().to_string();
                self.reject_duplicate_login(conn, current)
            }
            (SessionPhase::Anonymous, ClientLine::LoginUsage) => {
                self.reply(conn, &Reply::LoginUsage);
                self.reject(conn, LoginRejection::MissingLoginId)
            }
            (SessionPhase::Anonymous, ClientLine::Login(login_id)) => {
                match conn.try_login(login_id) {
                    Ok(login_id) => {
                        let login_id = login_id.to_string();
                        self.reply(conn, &Reply::Welcome(login_id.clone()));
                        self.counters.login_succeeded();

                        tracing::info!(connection_id = conn.id, login_id = %login_id, "Client logged in");
                        self.events.notify(ChatEvent::LoginSucceeded {
                            connection_id: conn.id,
                            login_id: login_id.clone(),
                        });

                        LineOutcome::LoggedIn(login_id)
                    }
                    // Lost a race against another login line on this connection
                    Err(RegistryError::AlreadyLoggedIn(current)) => {
                        self.reject_duplicate_login(conn, current)
                    }
                    Err(e) => {
                        self.client_exception(conn, &e.to_string());
                        LineOutcome::Ignored
                    }
                }
            }
            (SessionPhase::Anonymous, ClientLine::Chat(_)) => {
                self.reply(conn, &Reply::MustLoginFirst);
                let outcome = self.reject(conn, LoginRejection::NotLoggedIn);

                if let Err(e) = conn.close() {
                    self.client_exception(conn, &format!("error closing connection: {}", e));
                }

                outcome
            }
            (SessionPhase::Identified, ClientLine::Chat(text)) => {
                let login_id = conn.login_id().unwrap_or_default();

                self.router.broadcast_chat(login_id, &text).await;
                self.counters.message_relayed();

                self.events.notify(ChatEvent::MessageRelayed {
                    login_id: login_id.to_string(),
                    message: text,
                });

                LineOutcome::Relayed
            }
            // Login commands on an identified connection are handled by the first arm
            (SessionPhase::Identified, ClientLine::Login(_) | ClientLine::LoginUsage) => {
                LineOutcome::Ignored
            }
        }
    }

    fn reject_duplicate_login(&self, conn: &ConnectionEntry, current: String) -> LineOutcome {
        self.reply(conn, &Reply::AlreadyLoggedIn(current.clone()));
        self.reject(conn, LoginRejection::AlreadyLoggedIn(current))
    }

    fn reject(&self, conn: &ConnectionEntry, reason: LoginRejection) -> LineOutcome {
        self.counters.login_rejected();

        tracing::warn!(connection_id = conn.id, reason = %reason, "Login rejected");
        self.events.notify(ChatEvent::LoginRejected {
            connection_id: conn.id,
            reason: reason.clone(),
        });

        LineOutcome::Rejected(reason)
    }

    fn reply(&self, conn: &ConnectionEntry, reply: &Reply) {
        // Peer may have gone between reading the line and replying
        if let Err(e) = conn.send(Arc::from(reply.to_string())) {
            tracing::debug!(connection_id = conn.id, error = %e, "Reply not delivered");
        }
    }

    fn client_exception(&self, conn: &ConnectionEntry, error: &str) {
        tracing::warn!(connection_id = conn.id, error = %error, "Client exception");
        self.events.notify(ChatEvent::ClientException {
            connection_id: conn.id,
            error: error.to_string(),
        });
    }
}

impl ConnectionHandler for SessionProtocol {
    fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    fn counters(&self) -> &Arc<RelayCounters> {
        &self.counters
    }

    async fn on_client_connected(&self, conn: &Arc<ConnectionEntry>) {
        self.counters.connection_accepted();

        tracing::debug!(connection_id = conn.id, peer = %conn.peer_addr, "Client connected");
        self.events.notify(ChatEvent::ClientConnected {
            connection_id: conn.id,
            peer_addr: conn.peer_addr,
        });
    }

    async fn on_message(&self, conn: &Arc<ConnectionEntry>, line: &str) {
        self.handle_line(conn, line).await;
    }

    async fn on_client_disconnected(&self, conn: &Arc<ConnectionEntry>) {
        tracing::debug!(
            connection_id = conn.id,
            login_id = conn.login_id().unwrap_or("-"),
            duration_ms = conn.connected_at.elapsed().as_millis() as u64,
            "Client disconnected"
        );
        self.events.notify(ChatEvent::ClientDisconnected {
            connection_id: conn.id,
            peer_addr: conn.peer_addr,
            login_id: conn.login_id().map(str::to_string),
        });
    }

    async fn on_client_exception(&self, conn: &Arc<ConnectionEntry>, error: &Error) {
        self.client_exception(conn, &error.to_string());
    }

    async fn on_listening_started(&self, port: u16) {
        self.events.notify(ChatEvent::ServerStarted { port });
    }

    async fn on_listening_stopped(&self) {
        self.events.notify(ChatEvent::ServerStopped);
    }

    async fn on_server_closed(&self) {
        self.events.notify(ChatEvent::ServerClosed);
    }

    async fn on_listening_exception(&self, error: &Error) {
        self.events.notify(ChatEvent::ListeningException {
            error: error.to_string(),
        });
    }
}

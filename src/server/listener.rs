//! Chat server listener
//!
//! Owns the listening socket and the accept loop, and exposes the control
//! surface the operator console drives: start, stop, close and port
//! changes. The port and the listening flag sit behind one async mutex
//! that is held across the whole of a start, so a port change racing a
//! start is always decided one way: it either lands before the bind or is
//! rejected because the server is listening.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::protocol::LineCodec;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::control::ControlError;
use crate::server::handler::ConnectionHandler;
use crate::stats::ServerStats;

/// Chat relay server
pub struct ChatServer<H: ConnectionHandler> {
    shared: Arc<Shared<H>>,
    state: Mutex<ListenerState>,
}

/// State shared with the accept loop and connection tasks
struct Shared<H: ConnectionHandler> {
    config: ServerConfig,
    handler: Arc<H>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

/// Listening endpoint state, mutated only through the control surface
struct ListenerState {
    port: u16,
    local_addr: Option<SocketAddr>,
    accept_task: Option<AcceptTask>,
}

struct AcceptTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl<H: ConnectionHandler> ChatServer<H> {
    /// Create a new server with the given configuration and handler
    ///
    /// The server is created stopped; call [`start`](Self::start) to listen.
    pub fn new(config: ServerConfig, handler: H) -> Self {
        Self::with_handler(config, Arc::new(handler))
    }

    /// Create a new server around a shared handler
    pub fn with_handler(config: ServerConfig, handler: Arc<H>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let port = config.port;

        Self {
            shared: Arc::new(Shared {
                config,
                handler,
                next_connection_id: AtomicU64::new(1),
                connection_semaphore,
            }),
            state: Mutex::new(ListenerState {
                port,
                local_addr: None,
                accept_task: None,
            }),
        }
    }

    /// Get the connection handler
    pub fn handler(&self) -> &Arc<H> {
        &self.shared.handler
    }

    /// Begin accepting connections on the current port
    pub async fn start(&self) -> Result<(), ControlError> {
        let mut state = self.state.lock().await;

        if state.accept_task.is_some() {
            return Err(ControlError::AlreadyListening);
        }

        let host = self.shared.config.host.as_str();
        let listener = match TcpListener::bind((host, state.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(host = host, port = state.port, error = %e, "Failed to bind");
                let message = e.to_string();
                self.shared
                    .handler
                    .on_listening_exception(&Error::Io(e))
                    .await;
                return Err(ControlError::StartFailed(message));
            }
        };

        let local_addr = listener.local_addr().ok();
        tracing::info!(host = host, port = state.port, addr = ?local_addr, "Chat server listening");

        // Port 0 binds an ephemeral port; report the one actually in use
        let bound_port = local_addr.map(|a| a.port()).unwrap_or(state.port);
        self.shared.handler.on_listening_started(bound_port).await;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            shared.accept_loop(listener, shutdown_rx).await;
        });

        state.local_addr = local_addr;
        state.accept_task = Some(AcceptTask {
            shutdown: shutdown_tx,
            handle,
        });

        Ok(())
    }

    /// Stop accepting new connections; existing connections stay open
    pub async fn stop(&self) -> Result<(), ControlError> {
        let mut state = self.state.lock().await;

        if state.accept_task.is_none() {
            return Err(ControlError::AlreadyStopped);
        }

        self.stop_locked(&mut state).await
    }

    /// Stop listening (if listening) and close every connection
    pub async fn close(&self) -> Result<(), ControlError> {
        let mut state = self.state.lock().await;

        let stopped = if state.accept_task.is_some() {
            self.stop_locked(&mut state).await
        } else {
            Ok(())
        };

        let failures = self.shared.handler.registry().close_all().await;
        for (entry, e) in &failures {
            // Writer already gone; the connection is on its way out anyway
            tracing::debug!(connection_id = entry.id, error = %e, "Close skipped");
        }

        tracing::info!("Chat server closed");
        self.shared.handler.on_server_closed().await;

        stopped
    }

    async fn stop_locked(&self, state: &mut ListenerState) -> Result<(), ControlError> {
        let Some(task) = state.accept_task.take() else {
            return Ok(());
        };
        state.local_addr = None;

        // Accept loop may have exited on its own already
        let _ = task.shutdown.send(());
        let joined = task.handle.await;

        tracing::info!(port = state.port, "Chat server stopped listening");
        self.shared.handler.on_listening_stopped().await;

        joined.map_err(|e| ControlError::StopFailed(e.to_string()))
    }

    /// Change the port; only allowed while stopped
    pub async fn set_port(&self, port: u16) -> Result<(), ControlError> {
        let mut state = self.state.lock().await;

        if state.accept_task.is_some() {
            return Err(ControlError::PortChangeWhileListening);
        }

        state.port = port;
        tracing::debug!(port = port, "Port changed");
        Ok(())
    }

    /// Configured port
    pub async fn port(&self) -> u16 {
        self.state.lock().await.port
    }

    /// Check if the server is accepting connections
    pub async fn is_listening(&self) -> bool {
        self.state.lock().await.accept_task.is_some()
    }

    /// Address actually bound while listening
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.state.lock().await.local_addr
    }

    /// Snapshot of server statistics
    pub async fn status(&self) -> ServerStats {
        let (listening, port) = {
            let state = self.state.lock().await;
            (state.accept_task.is_some(), state.port)
        };
        let registry = self.shared.handler.registry();

        ServerStats {
            listening,
            port,
            active_connections: registry.len().await,
            identified_connections: registry.identified_count().await,
            ..self.shared.handler.counters().snapshot()
        }
    }
}

impl<H: ConnectionHandler> Shared<H> {
    async fn accept_loop(self: Arc<Self>, listener: TcpListener, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::debug!("Accept loop shutting down");
                    return;
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                        self.handler.on_listening_exception(&Error::Io(e)).await;
                    }
                },
            }
        }
    }

    async fn handle_connection(self: &Arc<Self>, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::warn!(connection_id = connection_id, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let (entry, outbound) = self
            .handler
            .registry()
            .register_with_capacity(connection_id, peer_addr, self.config.outbound_capacity)
            .await;
        let codec = LineCodec::with_max_length(self.config.max_line_length);
        let handler = Arc::clone(&self.handler);

        tokio::spawn(async move {
            let _permit = permit;
            let connection = Connection::new(entry, outbound, socket, codec, handler);

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    connection_id = connection_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(connection_id = connection_id, "Connection task finished");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChatEvent, EventSink};
    use crate::registry::ConnectionRegistry;
    use crate::session::SessionProtocol;

    fn server() -> (ChatServer<SessionProtocol>, Arc<EventSink>) {
        let events = Arc::new(EventSink::new());
        let protocol = SessionProtocol::new(Arc::new(ConnectionRegistry::new()), Arc::clone(&events));
        let config = ServerConfig::with_port(0).host("127.0.0.1");
        (ChatServer::new(config, protocol), events)
    }

    #[tokio::test]
    async fn test_start_stop() {
        let (server, events) = server();
        let (_, mut rx) = events.subscribe_channel();

        assert!(!server.is_listening().await);
        server.start().await.unwrap();
        assert!(server.is_listening().await);
        let bound = server.local_addr().await.unwrap();

        assert_eq!(server.start().await, Err(ControlError::AlreadyListening));

        server.stop().await.unwrap();
        assert!(!server.is_listening().await);
        assert!(server.local_addr().await.is_none());
        assert_eq!(server.stop().await, Err(ControlError::AlreadyStopped));

        // Configured port is 0; the event carries the ephemeral port
        let started = rx.recv().await.unwrap();
        assert_eq!(started.event, ChatEvent::ServerStarted { port: bound.port() });
        assert_eq!(
            started.line,
            format!("Server listening for connections on port {}", bound.port())
        );
        assert_eq!(rx.recv().await.unwrap().event, ChatEvent::ServerStopped);
    }

    #[tokio::test]
    async fn test_set_port_only_while_stopped() {
        let (server, _events) = server();

        server.set_port(9000).await.unwrap();
        assert_eq!(server.port().await, 9000);

        server.set_port(0).await.unwrap();
        server.start().await.unwrap();

        assert_eq!(
            server.set_port(9001).await,
            Err(ControlError::PortChangeWhileListening)
        );
        assert_eq!(server.port().await, 0);

        server.stop().await.unwrap();
        server.set_port(9001).await.unwrap();
        assert_eq!(server.port().await, 9001);
    }

    #[tokio::test]
    async fn test_close_when_stopped() {
        let (server, events) = server();
        let (_, mut rx) = events.subscribe_channel();

        server.close().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().event, ChatEvent::ServerClosed);
    }

    #[tokio::test]
    async fn test_start_failure_reports_exception() {
        let (first, _events) = server();
        first.start().await.unwrap();
        let taken = first.local_addr().await.unwrap().port();

        let (second, events) = server();
        let (_, mut rx) = events.subscribe_channel();
        second.set_port(taken).await.unwrap();

        assert!(matches!(
            second.start().await,
            Err(ControlError::StartFailed(_))
        ));
        assert!(!second.is_listening().await);
        assert!(matches!(
            rx.recv().await.unwrap().event,
            ChatEvent::ListeningException { .. }
        ));
    }

    #[tokio::test]
    async fn test_status() {
        let (server, _events) = server();
        server.set_port(7777).await.unwrap();

        let status = server.status().await;
        assert!(!status.listening);
        assert_eq!(status.port, 7777);
        assert_eq!(status.active_connections, 0);
    }
}

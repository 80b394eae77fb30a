//! Connection entry types
//!
//! This module defines the per-connection state stored in the registry.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::error::RegistryError;

/// Work queued for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write one line to the peer
    Line(Arc<str>),
    /// Flush queued lines, then shut the connection down
    Close,
}

/// Entry for a single live connection in the registry
///
/// The transport owns the socket; the entry only carries metadata and the
/// sending half of the connection's outbound queue. The queue is bounded: a
/// peer that stops reading until the queue fills is aborted, dropping
/// whatever was still queued for it.
#[derive(Debug)]
pub struct ConnectionEntry {
    /// Connection ID assigned at accept time
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// When the connection was accepted
    pub connected_at: Instant,

    /// Login identifier, set at most once
    login_id: OnceLock<String>,

    /// Set once a close has been requested
    closed: AtomicBool,

    /// Outbound queue to the connection's writer
    tx: mpsc::Sender<Outbound>,

    /// Cancelled when the connection must be dropped without flushing
    aborted: CancellationToken,
}

impl ConnectionEntry {
    /// Create a new entry and the receiving half of its outbound queue
    ///
    /// `capacity` is the number of lines that may wait for the writer.
    pub fn new(
        id: u64,
        peer_addr: SocketAddr,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let entry = Self {
            id,
            peer_addr,
            connected_at: Instant::now(),
            login_id: OnceLock::new(),
            closed: AtomicBool::new(false),
            tx,
            aborted: CancellationToken::new(),
        };

        (entry, rx)
    }

    /// Get the login identifier, if the connection has logged in
    pub fn login_id(&self) -> Option<&str> {
        self.login_id.get().map(String::as_str)
    }

    /// Check if the connection has logged in
    pub fn is_identified(&self) -> bool {
        self.login_id.get().is_some()
    }

    /// Atomically set the login identifier
    ///
    /// Exactly one caller wins; every other attempt, concurrent or later,
    /// gets `AlreadyLoggedIn` carrying the identifier that won.
    pub fn try_login(&self, login_id: String) -> Result<&str, RegistryError> {
        match self.login_id.set(login_id) {
            Ok(()) => Ok(self.login_id().unwrap_or_default()),
            Err(_) => Err(RegistryError::AlreadyLoggedIn(
                self.login_id().unwrap_or_default().to_string(),
            )),
        }
    }

    /// Queue a line for delivery to this connection
    ///
    /// A full queue aborts the connection and returns `QueueFull`.
    pub fn send(&self, line: Arc<str>) -> Result<(), RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::ConnectionClosed(self.id));
        }

        match self.tx.try_send(Outbound::Line(line)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.abort();
                Err(RegistryError::QueueFull(self.id))
            }
            Err(TrySendError::Closed(_)) => Err(RegistryError::ConnectionClosed(self.id)),
        }
    }

    /// Request the connection be closed after already queued lines are written
    ///
    /// Repeated calls are no-ops. Fails only if the writer is already gone.
    /// If the queue is full the connection is aborted instead.
    pub fn close(&self) -> Result<(), RegistryError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        match self.tx.try_send(Outbound::Close) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.abort();
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(RegistryError::ConnectionClosed(self.id)),
        }
    }

    /// Drop the connection without writing anything still queued
    pub fn abort(&self) {
        self.closed.store(true, Ordering::Release);
        self.aborted.cancel();
    }

    /// Check if the connection has been aborted
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_cancelled()
    }

    /// Resolves once the connection is aborted
    pub async fn aborted(&self) {
        self.aborted.cancelled().await
    }

    /// Check if a close has been requested
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

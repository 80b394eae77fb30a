//! Connection event handler trait
//!
//! The transport in [`ChatServer`](super::ChatServer) knows nothing about
//! logins or chat routing. It reports every lifecycle event through this
//! trait and leaves all decisions to the implementation.

use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::registry::{ConnectionEntry, ConnectionRegistry};
use crate::stats::RelayCounters;

/// Callbacks invoked by the transport
///
/// Implementations may use `async fn` for each method.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Registry the transport registers accepted connections in
    fn registry(&self) -> &Arc<ConnectionRegistry>;

    /// Counters reported by the `#status` admin command
    fn counters(&self) -> &Arc<RelayCounters>;

    /// A connection was accepted and registered
    fn on_client_connected(&self, conn: &Arc<ConnectionEntry>) -> impl Future<Output = ()> + Send;

    /// A line arrived from a connection
    fn on_message(&self, conn: &Arc<ConnectionEntry>, line: &str)
        -> impl Future<Output = ()> + Send;

    /// A connection went away and has been unregistered
    fn on_client_disconnected(&self, conn: &Arc<ConnectionEntry>)
        -> impl Future<Output = ()> + Send;

    /// Reading from or writing to a connection failed
    fn on_client_exception(
        &self,
        conn: &Arc<ConnectionEntry>,
        error: &Error,
    ) -> impl Future<Output = ()> + Send {
        let _ = (conn, error);
        async {}
    }

    /// The server began accepting connections
    fn on_listening_started(&self, port: u16) -> impl Future<Output = ()> + Send {
        let _ = port;
        async {}
    }

    /// The server stopped accepting connections
    fn on_listening_stopped(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// The server stopped and dropped every connection
    fn on_server_closed(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Binding or accepting failed
    fn on_listening_exception(&self, error: &Error) -> impl Future<Output = ()> + Send {
        let _ = error;
        async {}
    }
}

//! Line-oriented multi-client chat relay
//!
//! Clients connect over TCP, identify themselves once with
//! `#login <loginId>`, and every line they send afterwards is relayed to all
//! connected clients as `<loginId>> <text>`. An operator console can
//! broadcast `SERVER msg> <text>` lines and start, stop or close the server.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use chat_relay::{ChatServer, ConnectionRegistry, EventSink, ServerConfig, SessionProtocol};
//!
//! # async fn example() -> Result<(), chat_relay::ControlError> {
//! let events = Arc::new(EventSink::new());
//! let protocol = SessionProtocol::new(Arc::new(ConnectionRegistry::new()), events);
//! let server = ChatServer::new(ServerConfig::with_port(5555), protocol);
//!
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod events;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod stats;

pub use client::{ChatClient, ClientConfig, ClientEvent};
pub use error::{Error, Result};
pub use events::{ChatEvent, EventSink, Observer};
pub use registry::ConnectionRegistry;
pub use router::BroadcastRouter;
pub use server::{ChatServer, ConnectionHandler, ControlError, ServerConfig, ServerConsole};
pub use session::SessionProtocol;
pub use stats::ServerStats;

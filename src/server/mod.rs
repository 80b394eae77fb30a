//! Chat server
//!
//! - [`ChatServer`]: TCP transport, accept loop and control surface
//! - [`ConnectionHandler`]: callbacks the transport drives
//! - [`ServerConsole`]: operator command console

pub mod config;
pub mod connection;
pub mod control;
pub mod handler;
pub mod listener;

pub use config::ServerConfig;
pub use control::{AdminCommand, ConsoleOutcome, ControlError, ServerConsole};
pub use handler::ConnectionHandler;
pub use listener::ChatServer;

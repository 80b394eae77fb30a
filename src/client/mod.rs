//! Chat client
//!
//! Provides the client side of the relay:
//! - Connecting and logging in with a login id
//! - Receiving relayed lines as events
//! - Client console commands (`#logoff`, `#sethost`, `#login`, ...)

pub mod command;
pub mod config;
pub mod connector;

pub use command::ClientCommand;
pub use config::ClientConfig;
pub use connector::{ChatClient, ClientEvent, ClientOutcome};

//! Connection registry
//!
//! Tracks every live connection together with its login identifier and the
//! queue feeding its socket writer.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ConnectionRegistry>
//!                   ┌──────────────────────────────┐
//!                   │ connections: HashMap<u64,    │
//!                   │   ConnectionEntry {          │
//!                   │     login_id: OnceLock,      │
//!                   │     tx: mpsc::Sender<..>,    │
//!                   │   }                          │
//!                   │ >                            │
//!                   └──────────────┬───────────────┘
//!                                  │
//!          ┌───────────────────────┼───────────────────────┐
//!          ▼                       ▼                       ▼
//!     [Connection]            [Connection]            [Connection]
//!     rx.recv() ──► TCP       rx.recv() ──► TCP       rx.recv() ──► TCP
//! ```
//!
//! The login slot is a `OnceLock`, so the check-and-set performed on
//! `#login` is a single atomic step: of two racing login lines on the same
//! connection exactly one succeeds.

pub mod entry;
pub mod error;
pub mod store;

pub use entry::{ConnectionEntry, Outbound};
pub use error::RegistryError;
pub use store::ConnectionRegistry;

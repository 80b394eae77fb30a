//! Broadcast router
//!
//! Fans formatted text out to every live connection.

pub mod broadcast;

pub use broadcast::BroadcastRouter;

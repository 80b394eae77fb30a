//! Relay statistics

pub mod metrics;

pub use metrics::{RelayCounters, ServerStats};

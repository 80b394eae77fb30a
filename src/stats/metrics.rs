//! Statistics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters updated by the transport and session handling
#[derive(Debug)]
pub struct RelayCounters {
    started_at: Instant,
    total_connections: AtomicU64,
    logins: AtomicU64,
    rejected: AtomicU64,
    messages_relayed: AtomicU64,
    system_broadcasts: AtomicU64,
    delivery_failures: AtomicU64,
}

impl RelayCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            logins: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            messages_relayed: AtomicU64::new(0),
            system_broadcasts: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
        }
    }

    pub fn connection_accepted(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_succeeded(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_relayed(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn system_broadcast(&self) {
        self.system_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_failed(&self, count: u64) {
        self.delivery_failures.fetch_add(count, Ordering::Relaxed);
    }

    /// Copy the counters into a snapshot
    ///
    /// Listening state and live connection counts are owned elsewhere and
    /// filled in by the caller.
    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            system_broadcasts: self.system_broadcasts.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            ..ServerStats::default()
        }
    }
}

impl Default for RelayCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Whether the server is accepting connections
    pub listening: bool,
    /// Configured port
    pub port: u16,
    /// Current live connections
    pub active_connections: usize,
    /// Live connections that have logged in
    pub identified_connections: usize,
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Successful logins
    pub logins: u64,
    /// Refused logins and pre-login messages
    pub rejected: u64,
    /// Participant messages relayed
    pub messages_relayed: u64,
    /// Operator broadcasts
    pub system_broadcasts: u64,
    /// Per-recipient delivery failures
    pub delivery_failures: u64,
    /// Uptime
    pub uptime: Duration,
}

impl std::fmt::Display for ServerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} on port {}; clients: {} ({} logged in); relayed: {}; uptime: {}s",
            if self.listening { "Listening" } else { "Stopped" },
            self.port,
            self.active_connections,
            self.identified_connections,
            self.messages_relayed,
            self.uptime.as_secs()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_new() {
        let stats = RelayCounters::new().snapshot();
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.logins, 0);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.messages_relayed, 0);
        assert_eq!(stats.delivery_failures, 0);
        assert!(!stats.listening);
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = RelayCounters::new();
        counters.connection_accepted();
        counters.connection_accepted();
        counters.login_succeeded();
        counters.login_rejected();
        counters.message_relayed();
        counters.system_broadcast();
        counters.delivery_failed(3);

        let stats = counters.snapshot();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.logins, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.messages_relayed, 1);
        assert_eq!(stats.system_broadcasts, 1);
        assert_eq!(stats.delivery_failures, 3);
    }

    #[test]
    fn test_status_line() {
        let stats = ServerStats {
            listening: true,
            port: 5555,
            active_connections: 3,
            identified_connections: 2,
            messages_relayed: 10,
            ..ServerStats::default()
        };

        assert_eq!(
            stats.to_string(),
            "Listening on port 5555; clients: 3 (2 logged in); relayed: 10; uptime: 0s"
        );
    }
}

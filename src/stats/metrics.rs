//! Statistics for the relay server

use std::time::{Duration, Instant};

/// Server-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Total channels ever accepted
    pub total_connections: u64,
    /// Currently open control channels
    pub active_channels: u64,
    /// Currently open listeners (local plus per-peer)
    pub active_listeners: u64,
    /// Requests answered
    pub requests_handled: u64,
    /// Requests answered with an error status
    pub requests_failed: u64,
    /// Peer connections in the connection table
    pub active_peer_connections: u64,
    /// Live sessions across all channels
    pub active_sessions: u64,
    /// Streams in the registry
    pub published_streams: u64,
    /// Time since the server was last started
    pub uptime: Duration,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of requests answered with an error, 0.0 when idle
    pub fn failure_ratio(&self) -> f64 {
        if self.requests_handled == 0 {
            0.0
        } else {
            self.requests_failed as f64 / self.requests_handled as f64
        }
    }
}

/// Running counters kept by the server loop
#[derive(Debug, Clone)]
pub struct ServerCounters {
    /// Start time
    pub started_at: Instant,
    /// Total channels ever accepted
    pub total_connections: u64,
    /// Requests answered
    pub requests_handled: u64,
    /// Requests answered with an error status
    pub requests_failed: u64,
}

impl ServerCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: 0,
            requests_handled: 0,
            requests_failed: 0,
        }
    }

    /// Count an answered request
    pub fn record_request(&mut self, success: bool) {
        self.requests_handled += 1;
        if !success {
            self.requests_failed += 1;
        }
    }

    /// Restart the uptime clock
    pub fn restart(&mut self) {
        self.started_at = Instant::now();
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for ServerCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_stats_new() {
        let stats = ServerStats::new();
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_channels, 0);
        assert_eq!(stats.requests_handled, 0);
        assert_eq!(stats.published_streams, 0);
        assert_eq!(stats.failure_ratio(), 0.0);
    }

    #[test]
    fn test_counters_record_requests() {
        let mut counters = ServerCounters::new();

        counters.record_request(true);
        counters.record_request(false);
        counters.record_request(true);

        assert_eq!(counters.requests_handled, 3);
        assert_eq!(counters.requests_failed, 1);
    }

    #[test]
    fn test_failure_ratio() {
        let stats = ServerStats {
            requests_handled: 4,
            requests_failed: 1,
            ..Default::default()
        };

        assert!((stats.failure_ratio() - 0.25).abs() < f64::EPSILON);
    }
}

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters exposed on `/api/metrics`. All relaxed: these are
/// operator hints, not accounting.
#[derive(Default)]
pub struct ServerMetrics {
    ws_connections: AtomicU64,
    ws_messages: AtomicU64,
    ws_lagged: AtomicU64,
    bets_accepted: AtomicU64,
    bets_rejected: AtomicU64,
    rounds_settled: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMetricsSnapshot {
    pub ws_connections: u64,
    pub ws_messages: u64,
    pub ws_lagged: u64,
    pub bets_accepted: u64,
    pub bets_rejected: u64,
    pub rounds_settled: u64,
}

impl ServerMetrics {
    pub fn ws_connected(&self) {
        self.ws_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ws_disconnected(&self) {
        self.ws_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn inc_ws_messages(&self) {
        self.ws_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ws_lagged(&self, skipped: u64) {
        self.ws_lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn inc_bets_accepted(&self) {
        self.bets_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bets_rejected(&self) {
        self.bets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rounds_settled(&self) {
        self.rounds_settled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerMetricsSnapshot {
        ServerMetricsSnapshot {
            ws_connections: self.ws_connections.load(Ordering::Relaxed),
            ws_messages: self.ws_messages.load(Ordering::Relaxed),
            ws_lagged: self.ws_lagged.load(Ordering::Relaxed),
            bets_accepted: self.bets_accepted.load(Ordering::Relaxed),
            bets_rejected: self.bets_rejected.load(Ordering::Relaxed),
            rounds_settled: self.rounds_settled.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_in_the_snapshot() {
        let metrics = ServerMetrics::default();
        metrics.ws_connected();
        metrics.ws_connected();
        metrics.ws_disconnected();
        metrics.inc_ws_messages();
        metrics.inc_ws_lagged(5);
        metrics.inc_bets_accepted();
        metrics.inc_bets_rejected();
        metrics.inc_bets_rejected();
        metrics.inc_rounds_settled();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ws_connections, 1);
        assert_eq!(snapshot.ws_messages, 1);
        assert_eq!(snapshot.ws_lagged, 5);
        assert_eq!(snapshot.bets_accepted, 1);
        assert_eq!(snapshot.bets_rejected, 2);
        assert_eq!(snapshot.rounds_settled, 1);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let metrics = ServerMetrics::default();
        metrics.inc_bets_accepted();
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["betsAccepted"], 1);
        assert_eq!(json["wsConnections"], 0);
    }
}

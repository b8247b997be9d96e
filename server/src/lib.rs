use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;

use spintrack_engine::RoundEngine;
use spintrack_types::{
    BetReceipt, BetRejection, BetRequest, GameConfig, GameEvent, LeaderboardEntry, Round,
    SettlementResult,
};

mod api;
pub use api::Api;
pub mod config;
mod metrics;
pub use metrics::{ServerMetrics, ServerMetricsSnapshot};
mod sim;

const TICK_INTERVAL_MS: u64 = 250;

/// Milliseconds since the Unix epoch. The engine itself never reads the
/// clock; every entrypoint stamps time here.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Shared server state: the engine behind a mutex, plus everything that is
/// immutable after startup (track plan, config) cached outside it so read
/// handlers do not contend for the lock.
pub struct App {
    engine: Mutex<RoundEngine>,
    events: broadcast::Sender<GameEvent>,
    plan: spintrack_engine::TrackPlan,
    config: GameConfig,
    metrics: ServerMetrics,
    sim_enabled: bool,
}

impl App {
    pub fn new(
        engine: RoundEngine,
        events: broadcast::Sender<GameEvent>,
        sim_enabled: bool,
    ) -> Self {
        let plan = engine.plan().clone();
        let config = engine.config().clone();
        Self {
            engine: Mutex::new(engine),
            events,
            plan,
            config,
            metrics: ServerMetrics::default(),
            sim_enabled,
        }
    }

    fn engine(&self) -> MutexGuard<'_, RoundEngine> {
        self.engine.lock().expect("engine mutex poisoned")
    }

    pub fn start(&self) {
        self.engine().start(now_ms());
    }

    pub fn tick(&self) {
        self.engine().tick(now_ms());
    }

    pub fn place_bet(&self, req: BetRequest) -> Result<BetReceipt, BetRejection> {
        let result = self.engine().place_bet(req, now_ms());
        match &result {
            Ok(_) => self.metrics.inc_bets_accepted(),
            Err(_) => self.metrics.inc_bets_rejected(),
        }
        result
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    pub fn plan(&self) -> &spintrack_engine::TrackPlan {
        &self.plan
    }

    pub fn game_config(&self) -> &GameConfig {
        &self.config
    }

    pub fn track_len(&self) -> u32 {
        self.plan.track_len()
    }

    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    pub fn sim_enabled(&self) -> bool {
        self.sim_enabled
    }

    pub fn jackpot_pool(&self) -> u64 {
        self.engine().jackpot_pool()
    }

    pub fn current_round(&self) -> Option<Round> {
        self.engine().current_round().cloned()
    }

    pub fn last_result(&self) -> Option<SettlementResult> {
        self.engine().last_result().cloned()
    }

    pub fn leaderboard(&self, limit: Option<usize>) -> Vec<LeaderboardEntry> {
        let limit = limit.unwrap_or(self.config.leaderboard_limit);
        self.engine().leaderboard(limit, now_ms())
    }
}

/// Drive the engine's scheduled transitions. Timer resolution is the tick
/// interval; transitions fire on the first tick at or after their due time.
pub async fn run_ticker(app: Arc<App>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));
    loop {
        ticker.tick().await;
        app.tick();
    }
}

/// Count settlements for `/api/metrics`. Lagging is harmless here; the
/// counter is advisory.
pub async fn count_settlements(app: Arc<App>) {
    let mut events = app.subscribe();
    loop {
        match events.recv().await {
            Ok(GameEvent::RoundSettled { .. }) => app.metrics().inc_rounds_settled(),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use spintrack_engine::{LedgerStore, TrackPlan};

    fn test_app() -> App {
        let config = GameConfig {
            grid_rows: 7,
            grid_cols: 7,
            ..GameConfig::default()
        };
        let (events, _) = broadcast::channel(64);
        let mut rng = StdRng::seed_from_u64(3);
        let plan = TrackPlan::from_config(&config, &mut rng).unwrap();
        let store = LedgerStore::in_memory(config.clone());
        let engine = RoundEngine::new(config, plan, store, events.clone(), rng);
        let app = App::new(engine, events, true);
        app.start();
        app
    }

    fn bet(user: &str, slot: i64, amount: i64, msg: &str) -> BetRequest {
        BetRequest {
            user_id: user.to_string(),
            slot_id: Some(slot),
            amount: Some(amount),
            source_msg_id: Some(msg.to_string()),
            ..BetRequest::default()
        }
    }

    #[test]
    fn wagers_feed_the_bet_counters() {
        let app = test_app();
        app.place_bet(bet("alice", 5, 10, "m1")).unwrap();
        assert!(app.place_bet(bet("alice", 5, 10, "m1")).is_err());

        let snapshot = app.metrics().snapshot();
        assert_eq!(snapshot.bets_accepted, 1);
        assert_eq!(snapshot.bets_rejected, 1);
    }

    #[test]
    fn read_views_reflect_the_running_round() {
        let app = test_app();
        assert_eq!(app.track_len(), 24);
        assert!(app.last_result().is_none());

        app.place_bet(bet("alice", 5, 10, "m1")).unwrap();
        let round = app.current_round().unwrap();
        assert_eq!(round.bets.len(), 1);

        let leaderboard = app.leaderboard(None);
        assert_eq!(leaderboard[0].id, "alice");
        assert_eq!(leaderboard[0].points, 90);
    }

    #[test]
    fn subscribers_see_engine_events() {
        let app = test_app();
        let mut events = app.subscribe();
        app.place_bet(bet("alice", 5, 10, "m1")).unwrap();
        let first = events.try_recv().unwrap();
        assert_eq!(first.kind(), "round_started");
        let second = events.try_recv().unwrap();
        assert_eq!(second.kind(), "bet_accepted");
    }
}

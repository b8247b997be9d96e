//! The round state machine. Owns the lifecycle `waiting_bets -> betting ->
//! spinning -> settled -> waiting_bets (new round)`, accepts wager
//! submissions, composes spin outcomes, settles payouts, and distributes
//! the jackpot pool.
//!
//! Timers are explicit [`ScheduledCommand`] values held in a single slot
//! and fired by [`RoundEngine::tick`]. Every command re-validates
//! `(round_id, expected_status)` against the current round before acting;
//! a stale command is a silent no-op. That re-validation is the system's
//! only concurrency guard: callers serialize access (one logical thread of
//! control) and every handler runs to completion.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::Rng;
use tokio::sync::broadcast;

use spintrack_types::{
    Bet, BetReceipt, BetRejection, BetRequest, GameConfig, GameEvent, IdleReason, LeaderboardEntry,
    LedgerReason, LightMode, LuckSpin, Payout, PlanEntry, PoolPayout, Round, RoundMode, RoundState,
    RoundStatus, SettlementHighlight, SettlementResult, SpinDirectionMode, SpinOutcome,
};

use crate::ledger::LedgerStore;
use crate::payout::PayoutEngine;
use crate::selector;
use crate::spin::{run_spin, target_steps};
use crate::track::TrackPlan;

/// What a due command does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduledAction {
    CloseBetting,
    Settle,
    StartRound,
}

/// A deferred state transition. Carries the round it was scheduled
/// against and the status that round must still be in for the command to
/// be honored.
#[derive(Clone, Debug)]
pub struct ScheduledCommand {
    pub due_at: u64,
    pub round_id: u64,
    pub expected: RoundStatus,
    pub action: ScheduledAction,
}

pub struct RoundEngine {
    config: GameConfig,
    plan: TrackPlan,
    store: LedgerStore,
    payout: PayoutEngine,
    events: broadcast::Sender<GameEvent>,
    rng: StdRng,
    round_seq: u64,
    pending: Option<ScheduledCommand>,
}

impl RoundEngine {
    /// Build an engine over a validated config and track plan. The round
    /// sequence resumes above any round the store already knows about, so
    /// ids stay monotonic across restarts.
    pub fn new(
        config: GameConfig,
        plan: TrackPlan,
        store: LedgerStore,
        events: broadcast::Sender<GameEvent>,
        rng: StdRng,
    ) -> Self {
        let payout = PayoutEngine::new(config.clone(), plan.jackpot);
        let mut round_seq = 0;
        if let Some(round) = store.current_round() {
            round_seq = round_seq.max(round.id);
        }
        if let Some(result) = store.last_result() {
            round_seq = round_seq.max(result.round_id);
        }
        Self {
            config,
            plan,
            store,
            payout,
            events,
            rng,
            round_seq,
            pending: None,
        }
    }

    pub fn start(&mut self, now_ms: u64) {
        self.start_round(now_ms);
    }

    /// Drop any pending transition. Nothing fires after this until the
    /// engine is started again.
    pub fn shutdown(&mut self) {
        self.pending = None;
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn plan(&self) -> &TrackPlan {
        &self.plan
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.store.current_round()
    }

    pub fn last_result(&self) -> Option<&SettlementResult> {
        self.store.last_result()
    }

    pub fn jackpot_pool(&self) -> u64 {
        self.store.jackpot_pool()
    }

    pub fn leaderboard(&mut self, limit: usize, now_ms: u64) -> Vec<LeaderboardEntry> {
        self.store.leaderboard(limit, now_ms)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// When the next scheduled transition is due, if any.
    pub fn pending_due(&self) -> Option<u64> {
        self.pending.as_ref().map(|cmd| cmd.due_at)
    }

    /// Fire the pending command once its time has come. A command whose
    /// round id or expected status no longer matches the current round is
    /// discarded without any mutation or broadcast.
    pub fn tick(&mut self, now_ms: u64) {
        let Some(cmd) = self.pending.take() else {
            return;
        };
        if now_ms < cmd.due_at {
            self.pending = Some(cmd);
            return;
        }
        let valid = self
            .store
            .current_round()
            .map(|round| round.id == cmd.round_id && round.status() == cmd.expected)
            .unwrap_or(false);
        if !valid {
            return;
        }
        match cmd.action {
            ScheduledAction::CloseBetting => self.close_betting(now_ms),
            ScheduledAction::Settle => self.settle(now_ms),
            ScheduledAction::StartRound => self.start_round(now_ms),
        }
    }

    /// Submit a wager against the current round.
    ///
    /// The request carries either an explicit plan, the legacy single
    /// `slot_id`/`amount` pair, or `reuse_last_bet`. Entries are validated
    /// up front and the plan total is checked against the balance; entries
    /// then apply independently with per-entry dedupe keys
    /// `"{source_msg_id}-{index}"`. A rejection on the first entry fails
    /// the whole call; a duplicate after at least one success is skipped.
    pub fn place_bet(
        &mut self,
        req: BetRequest,
        now_ms: u64,
    ) -> Result<BetReceipt, BetRejection> {
        let (round_id, was_waiting) = match self.store.current_round() {
            Some(round) if round.is_open() => {
                (round.id, round.status() == RoundStatus::WaitingBets)
            }
            _ => return Err(BetRejection::BetClosed),
        };

        let user_id = req.user_id.trim();
        if user_id.is_empty() {
            return Err(BetRejection::InvalidUser);
        }
        let user_id = user_id.to_string();

        let reused = req.reuse_last_bet;
        let entries = if reused {
            let stored = self.store.last_bet_plan(&user_id);
            if stored.is_empty() {
                return Err(BetRejection::NoLastBet);
            }
            self.validate_stored_plan(&stored)?
        } else if let Some(plan) = &req.bet_plan {
            if plan.is_empty() {
                return Err(BetRejection::InvalidBetPlan);
            }
            let mut entries = Vec::with_capacity(plan.len());
            for raw in plan {
                entries.push(self.validate_entry(raw.slot_id, raw.amount)?);
            }
            entries
        } else if let (Some(slot_id), Some(amount)) = (req.slot_id, req.amount) {
            vec![self.validate_entry(slot_id, amount)?]
        } else {
            return Err(BetRejection::InvalidBetPlan);
        };

        let required: u64 = entries
            .iter()
            .map(|entry| entry.amount)
            .fold(0u64, u64::saturating_add);
        let current = self.store.balance(&user_id, now_ms);
        if current < 0 || (current as u64) < required {
            return Err(BetRejection::InsufficientPoints { current, required });
        }

        let source_id = match &req.source_msg_id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => format!("{user_id}-{now_ms}-{}", self.rng.gen::<u32>()),
        };

        let mut accepted: Vec<PlanEntry> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let key = format!("{source_id}-{index}");
            let bet = Bet {
                user_id: user_id.clone(),
                slot_id: entry.slot_id,
                amount: entry.amount,
                source_msg_id: key,
            };
            match self.store.add_bet(round_id, bet, now_ms) {
                Ok(()) => {}
                Err(rejection) if index == 0 => return Err(rejection),
                Err(_) => continue,
            }
            self.store
                .add_ledger(&user_id, -(entry.amount as i64), LedgerReason::Bet, now_ms);
            let pool = self.store.add_jackpot_contribution(entry.amount, now_ms);
            if was_waiting && accepted.is_empty() {
                self.activate_betting(round_id, now_ms);
            }
            accepted.push(*entry);
            self.emit(GameEvent::BetAccepted {
                round_id,
                user_id: user_id.clone(),
                slot_id: entry.slot_id,
                amount: entry.amount,
                jackpot_pool: pool,
            });
        }

        if !reused {
            self.store.set_last_bet_plan(&user_id, entries, now_ms);
        }

        Ok(BetReceipt {
            round_id,
            accepted,
            reused,
            jackpot_pool: self.store.jackpot_pool(),
        })
    }

    fn validate_entry(&self, slot_id: i64, amount: i64) -> Result<PlanEntry, BetRejection> {
        let track_len = i64::from(self.plan.track_len());
        if slot_id < 0 || slot_id >= track_len {
            return Err(BetRejection::InvalidSlot(slot_id));
        }
        if amount <= 0 {
            return Err(BetRejection::InvalidAmount(amount));
        }
        Ok(PlanEntry {
            slot_id: slot_id as u32,
            amount: amount as u64,
        })
    }

    fn validate_stored_plan(&self, stored: &[PlanEntry]) -> Result<Vec<PlanEntry>, BetRejection> {
        let mut entries = Vec::with_capacity(stored.len());
        for entry in stored {
            entries.push(self.validate_entry(i64::from(entry.slot_id), entry.amount as i64)?);
        }
        Ok(entries)
    }

    fn emit(&self, event: GameEvent) {
        let _ = self.events.send(event);
    }

    fn start_round(&mut self, now_ms: u64) {
        self.pending = None;
        self.round_seq += 1;
        let round = Round::new(self.round_seq, now_ms);
        let round_id = round.id;
        self.store.create_round(round, now_ms);
        self.emit(GameEvent::RoundWaitingBets {
            round_id,
            waiting_since: now_ms,
            reason: None,
        });
    }

    /// First accepted wager of a waiting round: stamp the deadline, tell
    /// the world, and arm the close-betting command.
    fn activate_betting(&mut self, round_id: u64, now_ms: u64) {
        let deadline = now_ms + self.config.bet_window_secs * 1_000;
        {
            let Some(round) = self.store.current_round_mut() else {
                return;
            };
            if round.id != round_id || round.status() != RoundStatus::WaitingBets {
                return;
            }
            round.state = RoundState::Betting {
                bet_start: now_ms,
                bet_deadline: deadline,
            };
        }
        self.store.touch(now_ms);
        self.emit(GameEvent::RoundStarted {
            round_id,
            bet_deadline: deadline,
            bet_window_sec: self.config.bet_window_secs,
        });
        self.pending = Some(ScheduledCommand {
            due_at: deadline,
            round_id,
            expected: RoundStatus::Betting,
            action: ScheduledAction::CloseBetting,
        });
    }

    fn close_betting(&mut self, now_ms: u64) {
        let Some(round) = self.store.current_round() else {
            return;
        };
        let round_id = round.id;

        if round.bets.is_empty() {
            if let Some(round) = self.store.current_round_mut() {
                round.state = RoundState::WaitingBets {
                    waiting_since: now_ms,
                    reason: Some(IdleReason::NoValidBet),
                };
            }
            self.store.touch(now_ms);
            self.emit(GameEvent::RoundWaitingBets {
                round_id,
                waiting_since: now_ms,
                reason: Some(IdleReason::NoValidBet),
            });
            return;
        }

        let outcome = self.compose_outcome();
        if let Some(round) = self.store.current_round_mut() {
            round.state = RoundState::Spinning {
                outcome: outcome.clone(),
            };
        }
        self.store.touch(now_ms);
        self.emit(GameEvent::RoundSpin {
            round_id,
            mode: outcome.mode,
            light_mode: outcome.light_mode,
            marker_count: outcome.marker_count,
            spin: outcome.primary.clone(),
            respins: outcome.respins.clone(),
            luck: outcome.luck.clone(),
        });
        self.pending = Some(ScheduledCommand {
            due_at: now_ms + self.config.spin_duration_secs * 1_000,
            round_id,
            expected: RoundStatus::Spinning,
            action: ScheduledAction::Settle,
        });
    }

    /// Roll everything random about the round: direction, mode, markers,
    /// the primary spin, respin chain, and the luck bonus.
    fn compose_outcome(&mut self) -> SpinOutcome {
        let len = self.plan.track_len();
        let direction: i8 = match self.config.spin_direction {
            SpinDirectionMode::Clockwise => 1,
            SpinDirectionMode::Counter => -1,
            SpinDirectionMode::Random => {
                if self.rng.gen_bool(0.5) {
                    1
                } else {
                    -1
                }
            }
        };
        let mode = selector::pick_round_mode(
            &mut self.rng,
            &self.config.round_modes,
            &self.config.round_mode_weights,
        );

        let (marker_count, primary) = if mode == RoundMode::King {
            // Target spin: land a lone marker exactly on the chosen
            // jackpot slot after a few full loops.
            let target = selector::pick_king_target(&mut self.rng, self.plan.jackpot);
            let start = self.rng.gen_range(0..len);
            let loops: u64 = self.rng.gen_range(2..=4);
            let steps = target_steps(len, start, direction, target) + u64::from(len) * loops;
            (1, run_spin(len, start, direction, 1, steps))
        } else {
            let marker_count = selector::pick_marker_count(
                &mut self.rng,
                &self.config.marker_counts,
                &self.config.marker_count_weights,
            );
            let start = self.rng.gen_range(0..len);
            let loops: u64 = self.rng.gen_range(2..=4);
            let steps = u64::from(len) * loops + u64::from(self.rng.gen_range(0..len));
            (marker_count, run_spin(len, start, direction, marker_count, steps))
        };

        let mut respins = Vec::new();
        if primary
            .final_slots
            .iter()
            .any(|slot| self.plan.is_respin_slot(*slot))
        {
            let count = self
                .rng
                .gen_range(self.config.respin_min..=self.config.respin_max);
            for _ in 0..count {
                let start = self.rng.gen_range(0..len);
                let steps = u64::from(len) + u64::from(self.rng.gen_range(0..len));
                respins.push(run_spin(len, start, direction, 1, steps));
            }
        }

        let luck = if matches!(mode, RoundMode::Normal | RoundMode::King) {
            self.compose_luck_spin(direction)
        } else {
            None
        };

        let light_mode = if mode == RoundMode::Train {
            LightMode::Train
        } else if luck.is_some() {
            LightMode::Shining
        } else {
            LightMode::Normal
        };

        SpinOutcome {
            mode,
            light_mode,
            marker_count,
            primary,
            respins,
            luck,
        }
    }

    fn compose_luck_spin(&mut self, direction: i8) -> Option<LuckSpin> {
        let luck_mode =
            selector::pick_luck_mode(&mut self.rng, &self.config.normal_luck_mode_weights)?;
        let targets = self.plan.luck_set(luck_mode);
        if targets.is_empty() {
            return None;
        }
        let target = targets[self.rng.gen_range(0..targets.len())];
        let len = self.plan.track_len();
        let start = self.rng.gen_range(0..len);
        let steps = target_steps(len, start, direction, target) + u64::from(len);
        Some(LuckSpin {
            mode: luck_mode,
            spin: run_spin(len, start, direction, 1, steps),
        })
    }

    fn settle(&mut self, now_ms: u64) {
        let (round_id, bets, outcome) = match self.store.current_round() {
            Some(round) => {
                let Some(outcome) = round.state.outcome().cloned() else {
                    return;
                };
                (round.id, round.bets.clone(), outcome)
            }
            None => return,
        };

        if let Some(round) = self.store.current_round_mut() {
            round.state = RoundState::Settled {
                outcome: outcome.clone(),
                settled_at: now_ms,
            };
        }
        self.store.touch(now_ms);

        let mut participants: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for bet in &bets {
            if seen.insert(bet.user_id.as_str()) {
                participants.push(bet.user_id.clone());
            }
        }

        let mut points_before: HashMap<String, i64> = HashMap::new();
        for user in &participants {
            let balance = self.store.balance(user, now_ms);
            points_before.insert(user.clone(), balance);
        }

        let mut win_points: HashMap<String, i64> = HashMap::new();

        let payouts_main = self.payout.apply_bets(
            &mut self.store,
            &bets,
            &outcome.primary.final_slots,
            LedgerReason::Win,
            now_ms,
        );
        accumulate_wins(&mut win_points, &payouts_main);

        let mut payouts_respins: Vec<Payout> = Vec::new();
        for respin in &outcome.respins {
            let payouts = self.payout.apply_bets(
                &mut self.store,
                &bets,
                &respin.final_slots,
                LedgerReason::Respin,
                now_ms,
            );
            accumulate_wins(&mut win_points, &payouts);
            payouts_respins.extend(payouts);
        }
        if let Some(luck) = &outcome.luck {
            let payouts = self.payout.apply_bets(
                &mut self.store,
                &bets,
                &luck.spin.final_slots,
                LedgerReason::Respin,
                now_ms,
            );
            accumulate_wins(&mut win_points, &payouts);
            payouts_respins.extend(payouts);
        }

        let (jackpot_pool_payouts, jackpot_pool_paid) =
            self.distribute_pool(&bets, &outcome, &mut win_points, now_ms);

        for user in &participants {
            self.store.maybe_grant_bonus(user, now_ms);
        }

        let mut highlights: Vec<SettlementHighlight> = Vec::new();
        for user in &participants {
            let win = win_points.get(user).copied().unwrap_or(0);
            if win <= 0 {
                continue;
            }
            let points_after = self.store.balance(user, now_ms);
            highlights.push(SettlementHighlight {
                user_id: user.clone(),
                points_before: points_before.get(user).copied().unwrap_or(0),
                win_points: win,
                points_after,
            });
        }
        highlights.sort_by(|a, b| {
            b.win_points
                .cmp(&a.win_points)
                .then(b.points_after.cmp(&a.points_after))
                .then(a.user_id.cmp(&b.user_id))
        });
        highlights.truncate(self.config.settlement_highlight_limit);

        let leaderboard = self
            .store
            .leaderboard(self.config.leaderboard_limit, now_ms);
        let result = SettlementResult {
            round_id,
            mode: outcome.mode,
            light_mode: outcome.light_mode,
            marker_count: outcome.marker_count,
            final_slots: outcome.primary.final_slots.clone(),
            respins: outcome.respins.clone(),
            luck: outcome.luck.clone(),
            payouts_main,
            payouts_respins,
            jackpot_pool_payouts,
            jackpot_pool_paid,
            settlement_highlights: highlights,
            settled_at: now_ms,
        };
        self.store.set_last_result(result.clone(), now_ms);

        self.emit(GameEvent::RoundSettled {
            round_id,
            jackpot_pool: self.store.jackpot_pool(),
            leaderboard,
            settlement_highlights: result.settlement_highlights.clone(),
            auto_next_round_in_sec: self.config.settle_pause_secs,
            result,
        });
        self.pending = Some(ScheduledCommand {
            due_at: now_ms + self.config.settle_pause_secs * 1_000,
            round_id,
            expected: RoundStatus::Settled,
            action: ScheduledAction::StartRound,
        });
    }

    /// Split the pool among bets on the pool slot (or either jackpot slot
    /// when the feature is disabled), proportional to wager amounts. Floor
    /// every share except the last, which takes the exact remainder, so
    /// the paid total always equals the pool. The pool resets only when
    /// something was paid.
    fn distribute_pool(
        &mut self,
        bets: &[Bet],
        outcome: &SpinOutcome,
        win_points: &mut HashMap<String, i64>,
        now_ms: u64,
    ) -> (Vec<PoolPayout>, u64) {
        let candidates: Vec<&Bet> = if self.config.pool_jackpot_enabled {
            let target = self.payout.pool_jackpot_slot();
            if self.config.pool_jackpot_require_hit && !outcome.winning_slots().contains(&target) {
                Vec::new()
            } else {
                bets.iter().filter(|bet| bet.slot_id == target).collect()
            }
        } else {
            bets.iter()
                .filter(|bet| self.plan.jackpot.contains(bet.slot_id))
                .collect()
        };

        let mut payouts = Vec::new();
        let mut paid: u64 = 0;
        if candidates.is_empty() {
            return (payouts, paid);
        }
        let pool = self.store.jackpot_pool();
        if pool == 0 {
            return (payouts, paid);
        }

        let total: u64 = candidates.iter().map(|bet| bet.amount).sum();
        let mut remainder = pool;
        let last = candidates.len() - 1;
        for (index, bet) in candidates.iter().enumerate() {
            let share = if index == last {
                remainder
            } else {
                ((u128::from(pool) * u128::from(bet.amount)) / u128::from(total)) as u64
            };
            remainder -= share;
            if share == 0 {
                continue;
            }
            self.store
                .add_ledger(&bet.user_id, share as i64, LedgerReason::JackpotPool, now_ms);
            paid += share;
            payouts.push(PoolPayout {
                user_id: bet.user_id.clone(),
                delta: share as i64,
            });
            *win_points.entry(bet.user_id.clone()).or_default() += share as i64;
        }
        if paid > 0 {
            self.store.reset_jackpot_pool(now_ms);
        }
        (payouts, paid)
    }
}

fn accumulate_wins(win_points: &mut HashMap<String, i64>, payouts: &[Payout]) {
    for payout in payouts {
        if payout.delta > 0 {
            *win_points.entry(payout.user_id.clone()).or_default() += payout.delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use spintrack_types::api::BetPlanEntry;
    use spintrack_types::Spin;

    const T0: u64 = 1_000;

    fn test_config() -> GameConfig {
        GameConfig {
            grid_rows: 7,
            grid_cols: 7,
            respin_slots: vec![1, 2],
            ..GameConfig::default()
        }
    }

    fn engine_with(config: GameConfig) -> (RoundEngine, broadcast::Receiver<GameEvent>) {
        let (tx, rx) = broadcast::channel(256);
        let mut rng = StdRng::seed_from_u64(7);
        let plan = TrackPlan::from_config(&config, &mut rng).unwrap();
        let store = LedgerStore::in_memory(config.clone());
        (RoundEngine::new(config, plan, store, tx, rng), rx)
    }

    fn started() -> (RoundEngine, broadcast::Receiver<GameEvent>) {
        let (mut engine, rx) = engine_with(test_config());
        engine.start(T0);
        (engine, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<GameEvent>) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn single_bet(user: &str, slot: i64, amount: i64, msg: &str) -> BetRequest {
        BetRequest {
            user_id: user.to_string(),
            slot_id: Some(slot),
            amount: Some(amount),
            source_msg_id: Some(msg.to_string()),
            ..BetRequest::default()
        }
    }

    fn fixed_outcome(final_slots: Vec<u32>) -> SpinOutcome {
        SpinOutcome {
            mode: RoundMode::Normal,
            light_mode: LightMode::Normal,
            marker_count: 1,
            primary: Spin {
                start_index: 0,
                direction: 1,
                marker_count: 1,
                offset: 24,
                steps: 48,
                final_slots,
            },
            respins: Vec::new(),
            luck: None,
        }
    }

    /// Force the current round into `spinning` with a known outcome and
    /// arm the settle command so `tick` drives settlement.
    fn force_spinning(engine: &mut RoundEngine, outcome: SpinOutcome, now_ms: u64) {
        let round_id = engine.store.current_round().unwrap().id;
        engine.store.current_round_mut().unwrap().state = RoundState::Spinning { outcome };
        engine.pending = Some(ScheduledCommand {
            due_at: now_ms,
            round_id,
            expected: RoundStatus::Spinning,
            action: ScheduledAction::Settle,
        });
    }

    #[test]
    fn accepts_a_bet_and_rejects_its_duplicate() {
        let (mut engine, _rx) = started();

        let receipt = engine
            .place_bet(single_bet("alice", 5, 10, "m1"), T0)
            .unwrap();
        assert_eq!(receipt.round_id, 1);
        assert!(!receipt.reused);
        assert_eq!(receipt.accepted, vec![PlanEntry { slot_id: 5, amount: 10 }]);
        assert_eq!(engine.store.balance("alice", T0), 90);
        let round = engine.store.current_round().unwrap();
        assert_eq!(round.bets.len(), 1);
        assert_eq!(round.bets[0].slot_id, 5);

        let second = engine.place_bet(single_bet("alice", 5, 10, "m1"), T0);
        assert_eq!(second, Err(BetRejection::Duplicate));
        assert_eq!(engine.store.balance("alice", T0), 90);
        assert_eq!(engine.store.current_round().unwrap().bets.len(), 1);
    }

    #[test]
    fn first_wager_opens_the_betting_window() {
        let (mut engine, mut rx) = started();
        assert_eq!(
            engine.current_round().unwrap().status(),
            RoundStatus::WaitingBets
        );
        drain(&mut rx);

        engine
            .place_bet(single_bet("alice", 5, 10, "m1"), T0)
            .unwrap();
        let round = engine.current_round().unwrap();
        assert_eq!(round.status(), RoundStatus::Betting);
        assert_eq!(round.state.bet_deadline(), Some(T0 + 10_000));

        let kinds: Vec<&str> = drain(&mut rx).iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["round_started", "bet_accepted"]);
        assert_eq!(engine.pending_due(), Some(T0 + 10_000));
    }

    #[test]
    fn second_wager_does_not_restart_the_window() {
        let (mut engine, _rx) = started();
        engine
            .place_bet(single_bet("alice", 5, 10, "m1"), T0)
            .unwrap();
        engine
            .place_bet(single_bet("bob", 6, 10, "m2"), T0 + 4_000)
            .unwrap();
        assert_eq!(
            engine.current_round().unwrap().state.bet_deadline(),
            Some(T0 + 10_000)
        );
    }

    #[test]
    fn rejects_bets_while_spinning() {
        let (mut engine, _rx) = started();
        engine
            .place_bet(single_bet("alice", 5, 10, "m1"), T0)
            .unwrap();
        engine.tick(T0 + 10_000);
        assert_eq!(
            engine.current_round().unwrap().status(),
            RoundStatus::Spinning
        );
        assert_eq!(
            engine.place_bet(single_bet("bob", 6, 10, "m2"), T0 + 10_001),
            Err(BetRejection::BetClosed)
        );
    }

    #[test]
    fn validates_user_slot_amount_and_plan() {
        let (mut engine, _rx) = started();
        assert_eq!(
            engine.place_bet(single_bet("  ", 5, 10, "m1"), T0),
            Err(BetRejection::InvalidUser)
        );
        assert_eq!(
            engine.place_bet(single_bet("alice", -1, 10, "m1"), T0),
            Err(BetRejection::InvalidSlot(-1))
        );
        assert_eq!(
            engine.place_bet(single_bet("alice", 24, 10, "m1"), T0),
            Err(BetRejection::InvalidSlot(24))
        );
        assert_eq!(
            engine.place_bet(single_bet("alice", 5, 0, "m1"), T0),
            Err(BetRejection::InvalidAmount(0))
        );
        let no_plan = BetRequest {
            user_id: "alice".to_string(),
            source_msg_id: Some("m1".to_string()),
            ..BetRequest::default()
        };
        assert_eq!(
            engine.place_bet(no_plan, T0),
            Err(BetRejection::InvalidBetPlan)
        );
        // Nothing above touched any state.
        assert_eq!(engine.current_round().unwrap().bets.len(), 0);
        assert_eq!(
            engine.current_round().unwrap().status(),
            RoundStatus::WaitingBets
        );
    }

    #[test]
    fn plan_total_is_checked_against_the_balance() {
        let (mut engine, _rx) = started();
        let req = BetRequest {
            user_id: "alice".to_string(),
            source_msg_id: Some("m1".to_string()),
            bet_plan: Some(vec![
                BetPlanEntry { slot_id: 5, amount: 60 },
                BetPlanEntry { slot_id: 6, amount: 60 },
            ]),
            ..BetRequest::default()
        };
        assert_eq!(
            engine.place_bet(req, T0),
            Err(BetRejection::InsufficientPoints {
                current: 100,
                required: 120
            })
        );
        assert_eq!(engine.store.balance("alice", T0), 100);
        assert!(engine.store.current_round().unwrap().bets.is_empty());
    }

    #[test]
    fn plan_entries_apply_independently_after_the_first() {
        let (mut engine, mut rx) = started();
        // Pre-seed the dedupe key the second entry will collide with.
        engine
            .store
            .add_bet(
                1,
                Bet {
                    user_id: "other".to_string(),
                    slot_id: 9,
                    amount: 1,
                    source_msg_id: "m9-1".to_string(),
                },
                T0,
            )
            .unwrap();
        drain(&mut rx);

        let req = BetRequest {
            user_id: "alice".to_string(),
            source_msg_id: Some("m9".to_string()),
            bet_plan: Some(vec![
                BetPlanEntry { slot_id: 5, amount: 1 },
                BetPlanEntry { slot_id: 6, amount: 1 },
                BetPlanEntry { slot_id: 7, amount: 1 },
            ]),
            ..BetRequest::default()
        };
        let receipt = engine.place_bet(req, T0).unwrap();
        assert_eq!(
            receipt.accepted,
            vec![
                PlanEntry { slot_id: 5, amount: 1 },
                PlanEntry { slot_id: 7, amount: 1 },
            ]
        );
        // Only the two accepted entries were debited.
        assert_eq!(engine.store.balance("alice", T0), 98);
        let accepted_events = drain(&mut rx)
            .iter()
            .filter(|e| e.kind() == "bet_accepted")
            .count();
        assert_eq!(accepted_events, 2);
    }

    #[test]
    fn first_entry_rejection_fails_the_whole_plan() {
        let (mut engine, _rx) = started();
        engine
            .place_bet(single_bet("alice", 5, 10, "m1"), T0)
            .unwrap();
        let retry = BetRequest {
            user_id: "alice".to_string(),
            source_msg_id: Some("m1".to_string()),
            bet_plan: Some(vec![
                BetPlanEntry { slot_id: 5, amount: 10 },
                BetPlanEntry { slot_id: 6, amount: 10 },
            ]),
            ..BetRequest::default()
        };
        assert_eq!(engine.place_bet(retry, T0), Err(BetRejection::Duplicate));
        assert_eq!(engine.store.balance("alice", T0), 90);
        assert_eq!(engine.store.current_round().unwrap().bets.len(), 1);
    }

    #[test]
    fn reuse_replays_the_last_plan_with_fresh_keys() {
        let (mut engine, _rx) = started();
        let fresh = BetRequest {
            user_id: "alice".to_string(),
            source_msg_id: Some("m1".to_string()),
            bet_plan: Some(vec![
                BetPlanEntry { slot_id: 5, amount: 10 },
                BetPlanEntry { slot_id: 6, amount: 5 },
            ]),
            ..BetRequest::default()
        };
        engine.place_bet(fresh, T0).unwrap();

        let reuse = BetRequest {
            user_id: "alice".to_string(),
            source_msg_id: Some("m2".to_string()),
            reuse_last_bet: true,
            ..BetRequest::default()
        };
        let receipt = engine.place_bet(reuse, T0 + 1_000).unwrap();
        assert!(receipt.reused);
        assert_eq!(receipt.accepted.len(), 2);
        assert_eq!(engine.store.balance("alice", T0 + 1_000), 70);
        let round = engine.store.current_round().unwrap();
        assert_eq!(round.bets.len(), 4);
        assert!(round.dedupe.contains("m2-0"));
        assert!(round.dedupe.contains("m2-1"));
    }

    #[test]
    fn reuse_without_history_is_rejected() {
        let (mut engine, _rx) = started();
        let reuse = BetRequest {
            user_id: "alice".to_string(),
            source_msg_id: Some("m1".to_string()),
            reuse_last_bet: true,
            ..BetRequest::default()
        };
        assert_eq!(engine.place_bet(reuse, T0), Err(BetRejection::NoLastBet));
    }

    #[test]
    fn window_closing_with_zero_bets_reverts_to_waiting() {
        let (mut engine, mut rx) = started();
        // Force an armed betting window that never saw a wager.
        engine.store.current_round_mut().unwrap().state = RoundState::Betting {
            bet_start: T0,
            bet_deadline: T0 + 10_000,
        };
        engine.pending = Some(ScheduledCommand {
            due_at: T0 + 10_000,
            round_id: 1,
            expected: RoundStatus::Betting,
            action: ScheduledAction::CloseBetting,
        });
        drain(&mut rx);

        engine.tick(T0 + 10_000);
        match &engine.current_round().unwrap().state {
            RoundState::WaitingBets { reason, .. } => {
                assert_eq!(*reason, Some(IdleReason::NoValidBet));
            }
            state => panic!("unexpected state {state:?}"),
        }
        assert!(engine.pending_due().is_none());
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            GameEvent::RoundWaitingBets { reason, .. } => {
                assert_eq!(*reason, Some(IdleReason::NoValidBet));
            }
            event => panic!("unexpected event {event:?}"),
        }
    }

    #[test]
    fn idle_round_reopens_on_the_next_wager() {
        let (mut engine, _rx) = started();
        engine.store.current_round_mut().unwrap().state = RoundState::Betting {
            bet_start: T0,
            bet_deadline: T0 + 10_000,
        };
        engine.pending = Some(ScheduledCommand {
            due_at: T0 + 10_000,
            round_id: 1,
            expected: RoundStatus::Betting,
            action: ScheduledAction::CloseBetting,
        });
        engine.tick(T0 + 10_000);

        let t1 = T0 + 20_000;
        engine
            .place_bet(single_bet("alice", 5, 10, "m1"), t1)
            .unwrap();
        let round = engine.current_round().unwrap();
        assert_eq!(round.id, 1);
        assert_eq!(round.status(), RoundStatus::Betting);
        assert_eq!(round.state.bet_deadline(), Some(t1 + 10_000));
    }

    #[test]
    fn stale_commands_are_silent_no_ops() {
        let (mut engine, mut rx) = started();
        engine
            .place_bet(single_bet("alice", 5, 10, "m1"), T0)
            .unwrap();
        drain(&mut rx);

        // Wrong round id.
        engine.pending = Some(ScheduledCommand {
            due_at: T0,
            round_id: 99,
            expected: RoundStatus::Betting,
            action: ScheduledAction::CloseBetting,
        });
        engine.tick(T0 + 1);
        assert_eq!(
            engine.current_round().unwrap().status(),
            RoundStatus::Betting
        );
        assert!(drain(&mut rx).is_empty());

        // Wrong expected status.
        engine.pending = Some(ScheduledCommand {
            due_at: T0,
            round_id: 1,
            expected: RoundStatus::Spinning,
            action: ScheduledAction::Settle,
        });
        engine.tick(T0 + 2);
        assert_eq!(
            engine.current_round().unwrap().status(),
            RoundStatus::Betting
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn tick_before_the_deadline_does_nothing() {
        let (mut engine, _rx) = started();
        engine
            .place_bet(single_bet("alice", 5, 10, "m1"), T0)
            .unwrap();
        engine.tick(T0 + 9_999);
        assert_eq!(
            engine.current_round().unwrap().status(),
            RoundStatus::Betting
        );
        assert_eq!(engine.pending_due(), Some(T0 + 10_000));
    }

    #[test]
    fn shutdown_cancels_the_pending_transition() {
        let (mut engine, _rx) = started();
        engine
            .place_bet(single_bet("alice", 5, 10, "m1"), T0)
            .unwrap();
        engine.shutdown();
        engine.tick(T0 + 60_000);
        assert_eq!(
            engine.current_round().unwrap().status(),
            RoundStatus::Betting
        );
    }

    #[test]
    fn winning_bet_pays_the_normal_multiplier() {
        let (mut engine, _rx) = started();
        engine
            .place_bet(single_bet("alice", 7, 10, "m1"), T0)
            .unwrap();
        force_spinning(&mut engine, fixed_outcome(vec![7]), T0 + 16_000);
        engine.tick(T0 + 16_000);

        let result = engine.last_result().unwrap().clone();
        assert_eq!(result.payouts_main.len(), 1);
        assert_eq!(result.payouts_main[0].delta, 20);
        assert_eq!(result.payouts_main[0].multiplier, 2);
        assert_eq!(result.payouts_main[0].reason, LedgerReason::Win);
        assert_eq!(engine.store.balance("alice", T0 + 16_000), 110);

        let highlight = &result.settlement_highlights[0];
        assert_eq!(highlight.user_id, "alice");
        assert_eq!(highlight.points_before, 90);
        assert_eq!(highlight.win_points, 20);
        assert_eq!(highlight.points_after, 110);
    }

    #[test]
    fn pool_splits_evenly_with_exact_conservation() {
        // 7x7 perimeter auto-pick: big = 3, small = 9.
        let (mut engine, _rx) = started();
        assert_eq!(engine.plan.jackpot.big, 3);
        engine
            .place_bet(single_bet("ann", 3, 20, "m1"), T0)
            .unwrap();
        engine
            .place_bet(single_bet("ben", 3, 20, "m2"), T0)
            .unwrap();
        // floor(6000 * 0.02) = 120 into the pool.
        engine.store.add_jackpot_contribution(6_000, T0);
        let pool_before = engine.jackpot_pool();
        assert!(pool_before >= 120);

        force_spinning(&mut engine, fixed_outcome(vec![3]), T0 + 16_000);
        engine.tick(T0 + 16_000);

        let result = engine.last_result().unwrap();
        assert_eq!(result.jackpot_pool_paid, pool_before);
        assert_eq!(result.jackpot_pool_payouts.len(), 2);
        let shares: i64 = result.jackpot_pool_payouts.iter().map(|p| p.delta).sum();
        assert_eq!(shares as u64, pool_before);
        // The pool slot pays no flat multiplier; the pool is the prize.
        assert!(result.payouts_main.is_empty());
        assert_eq!(engine.jackpot_pool(), 0);

        // Equal stakes tie on win and after-points; user id breaks it.
        assert_eq!(result.settlement_highlights[0].user_id, "ann");
        assert_eq!(result.settlement_highlights[1].user_id, "ben");
    }

    #[test]
    fn uneven_pool_split_gives_the_remainder_to_the_last_winner() {
        let (mut engine, _rx) = started();
        engine
            .place_bet(single_bet("ann", 3, 10, "m1"), T0)
            .unwrap();
        engine
            .place_bet(single_bet("ben", 3, 20, "m2"), T0)
            .unwrap();
        engine.store.add_jackpot_contribution(5_000, T0);
        let pool = engine.jackpot_pool();

        force_spinning(&mut engine, fixed_outcome(vec![3]), T0 + 16_000);
        engine.tick(T0 + 16_000);

        let result = engine.last_result().unwrap();
        let paid: i64 = result.jackpot_pool_payouts.iter().map(|p| p.delta).sum();
        assert_eq!(paid as u64, pool);
        assert_eq!(result.jackpot_pool_payouts[0].delta, (pool / 3) as i64);
    }

    #[test]
    fn pool_requires_a_hit_when_configured() {
        let (mut engine, _rx) = started();
        engine
            .place_bet(single_bet("ann", 3, 20, "m1"), T0)
            .unwrap();
        engine.store.add_jackpot_contribution(6_000, T0);
        let pool = engine.jackpot_pool();

        // Winning slot misses the pool slot entirely.
        force_spinning(&mut engine, fixed_outcome(vec![7]), T0 + 16_000);
        engine.tick(T0 + 16_000);

        let result = engine.last_result().unwrap();
        assert_eq!(result.jackpot_pool_paid, 0);
        assert!(result.jackpot_pool_payouts.is_empty());
        assert_eq!(engine.jackpot_pool(), pool);
    }

    #[test]
    fn disabled_pool_feature_splits_across_both_jackpot_slots() {
        let config = GameConfig {
            pool_jackpot_enabled: false,
            ..test_config()
        };
        let (mut engine, _rx) = engine_with(config);
        engine.start(T0);
        engine
            .place_bet(single_bet("ann", 3, 20, "m1"), T0)
            .unwrap();
        engine
            .place_bet(single_bet("ben", 9, 20, "m2"), T0)
            .unwrap();
        engine.store.add_jackpot_contribution(6_000, T0);
        let pool = engine.jackpot_pool();

        // Legacy behavior pays pool candidates even without a hit.
        force_spinning(&mut engine, fixed_outcome(vec![0]), T0 + 16_000);
        engine.tick(T0 + 16_000);

        let result = engine.last_result().unwrap();
        assert_eq!(result.jackpot_pool_paid, pool);
        assert_eq!(result.jackpot_pool_payouts.len(), 2);
    }

    #[test]
    fn losing_everything_triggers_the_zero_balance_bonus() {
        let (mut engine, _rx) = started();
        engine
            .place_bet(single_bet("alice", 8, 100, "m1"), T0)
            .unwrap();
        assert_eq!(engine.store.balance("alice", T0), 0);

        force_spinning(&mut engine, fixed_outcome(vec![7]), T0 + 16_000);
        engine.tick(T0 + 16_000);

        let result = engine.last_result().unwrap();
        assert!(result.payouts_main.is_empty());
        assert!(result.settlement_highlights.is_empty());
        assert_eq!(engine.store.balance("alice", T0 + 16_000), 10);
    }

    #[test]
    fn full_round_flow_settles_and_restarts() {
        let (mut engine, mut rx) = started();
        drain(&mut rx);
        engine
            .place_bet(single_bet("alice", 5, 10, "m1"), T0)
            .unwrap();

        engine.tick(T0 + 10_000);
        assert_eq!(
            engine.current_round().unwrap().status(),
            RoundStatus::Spinning
        );
        engine.tick(T0 + 16_000);
        assert_eq!(
            engine.current_round().unwrap().status(),
            RoundStatus::Settled
        );
        let result = engine.last_result().unwrap().clone();
        assert_eq!(result.round_id, 1);

        // Balance reconciles with the recorded payouts and pool shares.
        let won: i64 = result
            .payouts_main
            .iter()
            .chain(result.payouts_respins.iter())
            .filter(|p| p.user_id == "alice")
            .map(|p| p.delta)
            .sum::<i64>()
            + result
                .jackpot_pool_payouts
                .iter()
                .filter(|p| p.user_id == "alice")
                .map(|p| p.delta)
                .sum::<i64>();
        let balance = engine.store.balance("alice", T0 + 16_000);
        assert_eq!(balance, 90 + won);

        engine.tick(T0 + 19_000);
        let round = engine.current_round().unwrap();
        assert_eq!(round.id, 2);
        assert_eq!(round.status(), RoundStatus::WaitingBets);

        let kinds: Vec<&str> = drain(&mut rx).iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "round_started",
                "bet_accepted",
                "round_spin",
                "round_settled",
                "round_waiting_bets",
            ]
        );
    }

    #[test]
    fn king_round_lands_on_a_jackpot_slot() {
        let config = GameConfig {
            round_modes: vec![RoundMode::King],
            round_mode_weights: vec![1],
            normal_luck_mode_weights: [1, 0, 0],
            ..test_config()
        };
        let (mut engine, _rx) = engine_with(config);
        for seed in 0..20u64 {
            engine.rng = StdRng::seed_from_u64(seed);
            engine.start(T0);
            engine
                .place_bet(single_bet("alice", 5, 1, "m1"), T0)
                .unwrap();
            engine.tick(T0 + 10_000);
            let outcome = engine
                .current_round()
                .unwrap()
                .state
                .outcome()
                .unwrap()
                .clone();
            assert_eq!(outcome.mode, RoundMode::King);
            assert_eq!(outcome.marker_count, 1);
            assert_eq!(outcome.primary.final_slots.len(), 1);
            assert!(engine.plan.jackpot.contains(outcome.primary.final_slots[0]));
            assert!(outcome.luck.is_none());
            assert_eq!(outcome.light_mode, LightMode::Normal);
        }
    }

    #[test]
    fn train_round_sets_the_train_light_and_skips_luck() {
        let config = GameConfig {
            round_modes: vec![RoundMode::Train],
            round_mode_weights: vec![1],
            // Luck would always fire if trains rolled for it.
            normal_luck_mode_weights: [0, 1, 0],
            ..test_config()
        };
        let (mut engine, _rx) = engine_with(config);
        engine.start(T0);
        engine
            .place_bet(single_bet("alice", 5, 1, "m1"), T0)
            .unwrap();
        engine.tick(T0 + 10_000);
        let outcome = engine.current_round().unwrap().state.outcome().unwrap();
        assert_eq!(outcome.mode, RoundMode::Train);
        assert_eq!(outcome.light_mode, LightMode::Train);
        assert!(outcome.luck.is_none());
    }

    #[test]
    fn luck_bonus_targets_the_edge_set_and_shines() {
        let config = GameConfig {
            round_modes: vec![RoundMode::Normal],
            round_mode_weights: vec![1],
            normal_luck_mode_weights: [0, 1, 0],
            ..test_config()
        };
        let (mut engine, _rx) = engine_with(config);
        engine.start(T0);
        engine
            .place_bet(single_bet("alice", 5, 1, "m1"), T0)
            .unwrap();
        engine.tick(T0 + 10_000);
        let outcome = engine.current_round().unwrap().state.outcome().unwrap();
        assert_eq!(outcome.light_mode, LightMode::Shining);
        let luck = outcome.luck.as_ref().unwrap();
        assert_eq!(luck.mode, RoundMode::LuckLeft);
        assert_eq!(luck.spin.final_slots.len(), 1);
        assert!(engine.plan.luck_left.contains(&luck.spin.final_slots[0]));
    }

    #[test]
    fn round_ids_resume_above_persisted_state() {
        let config = test_config();
        let (tx, _rx) = broadcast::channel(16);
        let mut rng = StdRng::seed_from_u64(7);
        let plan = TrackPlan::from_config(&config, &mut rng).unwrap();
        let mut store = LedgerStore::in_memory(config.clone());
        store.create_round(Round::new(7, 0), 0);
        let mut engine = RoundEngine::new(config, plan, store, tx, rng);
        engine.start(T0);
        assert_eq!(engine.current_round().unwrap().id, 8);
    }
}

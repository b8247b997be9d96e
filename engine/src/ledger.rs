//! Wallet ledger and round registry. Balances are append-only dated entries
//! with lazy expiry pruning; debits clamp so a balance can never go
//! negative. The store owns the single current round and the jackpot pool,
//! and optionally rewrites a durable snapshot after every mutating call.
//!
//! Every time-dependent operation takes an explicit `now_ms` so the store
//! never reads the wall clock itself.

use std::collections::BTreeMap;

use spintrack_types::{
    Bet, BetRejection, GameConfig, LeaderboardEntry, LedgerEntry, LedgerReason, PlanEntry, Round,
    SettlementResult, Snapshot, UserAccount, SNAPSHOT_VERSION,
};

use crate::snapshot::Snapshotter;

pub struct LedgerStore {
    config: GameConfig,
    users: BTreeMap<String, UserAccount>,
    jackpot_pool: u64,
    current_round: Option<Round>,
    last_result: Option<SettlementResult>,
    snapshotter: Option<Snapshotter>,
}

impl LedgerStore {
    pub fn in_memory(config: GameConfig) -> Self {
        Self {
            config,
            users: BTreeMap::new(),
            jackpot_pool: 0,
            current_round: None,
            last_result: None,
            snapshotter: None,
        }
    }

    /// Rehydrate from a previously loaded snapshot and keep rewriting it
    /// after every mutation. A `None` snapshot starts empty.
    pub fn with_snapshot(
        config: GameConfig,
        snapshotter: Snapshotter,
        snapshot: Option<Snapshot>,
    ) -> Self {
        let mut store = Self::in_memory(config);
        if let Some(snapshot) = snapshot {
            store.users = snapshot.users;
            store.jackpot_pool = snapshot.jackpot_pool;
            store.current_round = snapshot.current_round;
            store.last_result = snapshot.last_result;
        }
        store.snapshotter = Some(snapshotter);
        store
    }

    fn expiry_after(&self, now_ms: u64) -> u64 {
        now_ms + self.config.point_expire_hours * 3_600_000
    }

    /// Lazily create the account with its seed credit.
    pub fn ensure_user(&mut self, user_id: &str, now_ms: u64) {
        if self.users.contains_key(user_id) {
            return;
        }
        let account = UserAccount {
            id: user_id.to_string(),
            ledger: vec![LedgerEntry {
                delta: self.config.start_points as i64,
                reason: LedgerReason::Seed,
                created_at: now_ms,
                expires_at: self.expiry_after(now_ms),
            }],
            last_bonus_at: 0,
            last_bet_plan: Vec::new(),
        };
        self.users.insert(user_id.to_string(), account);
        self.persist(now_ms);
    }

    /// Current balance: prunes that user's expired entries as a side
    /// effect, then sums what remains. Creates the account on first
    /// reference.
    pub fn balance(&mut self, user_id: &str, now_ms: u64) -> i64 {
        self.ensure_user(user_id, now_ms);
        let Some(account) = self.users.get_mut(user_id) else {
            return 0;
        };
        account.ledger.retain(|entry| entry.expires_at > now_ms);
        account.ledger.iter().map(|entry| entry.delta).sum()
    }

    /// Append a dated entry. A debit that would drive the balance below
    /// zero is reduced so the balance lands exactly on zero; the returned
    /// value is the delta actually applied, which callers must use for any
    /// bookkeeping of their own.
    pub fn add_ledger(
        &mut self,
        user_id: &str,
        delta: i64,
        reason: LedgerReason,
        now_ms: u64,
    ) -> i64 {
        let current = self.balance(user_id, now_ms);
        let actual = if i128::from(current) + i128::from(delta) < 0 {
            -current
        } else {
            delta
        };
        let entry = LedgerEntry {
            delta: actual,
            reason,
            created_at: now_ms,
            expires_at: self.expiry_after(now_ms),
        };
        if let Some(account) = self.users.get_mut(user_id) {
            account.ledger.push(entry);
        }
        self.persist(now_ms);
        actual
    }

    /// Feed the pool from an accepted wager: `floor(amount * rate)`.
    pub fn add_jackpot_contribution(&mut self, amount: u64, now_ms: u64) -> u64 {
        let rate = self.config.jackpot_pool_rate;
        if rate <= 0.0 {
            return self.jackpot_pool;
        }
        let add = (amount as f64 * rate).floor() as u64;
        if add > 0 {
            self.jackpot_pool += add;
            self.persist(now_ms);
        }
        self.jackpot_pool
    }

    pub fn jackpot_pool(&self) -> u64 {
        self.jackpot_pool
    }

    pub fn reset_jackpot_pool(&mut self, now_ms: u64) {
        self.jackpot_pool = 0;
        self.persist(now_ms);
    }

    /// Zero-balance courtesy grant, gated on the require-zero flag (the
    /// whole feature is off without it), an exactly-zero balance, and the
    /// cooldown since the user's previous bonus.
    pub fn maybe_grant_bonus(&mut self, user_id: &str, now_ms: u64) -> bool {
        if !self.config.no_point_bonus_require_zero {
            return false;
        }
        if self.balance(user_id, now_ms) != 0 {
            return false;
        }
        let cooldown_ms = self.config.no_point_bonus_cooldown_mins * 60_000;
        let last_bonus_at = self
            .users
            .get(user_id)
            .map(|account| account.last_bonus_at)
            .unwrap_or(0);
        if last_bonus_at > 0 && now_ms.saturating_sub(last_bonus_at) < cooldown_ms {
            return false;
        }
        if let Some(account) = self.users.get_mut(user_id) {
            account.last_bonus_at = now_ms;
        }
        self.add_ledger(
            user_id,
            self.config.no_point_bonus_points as i64,
            LedgerReason::Bonus,
            now_ms,
        );
        true
    }

    /// Install a fresh current round, superseding any previous one.
    pub fn create_round(&mut self, mut round: Round, now_ms: u64) {
        round.bets.clear();
        round.dedupe.clear();
        self.current_round = Some(round);
        self.persist(now_ms);
    }

    /// Register a wager against the current round. The dedupe set accepts a
    /// given `source_msg_id` at most once per round.
    pub fn add_bet(&mut self, round_id: u64, bet: Bet, now_ms: u64) -> Result<(), BetRejection> {
        let Some(round) = self.current_round.as_mut() else {
            return Err(BetRejection::RoundMismatch);
        };
        if round.id != round_id {
            return Err(BetRejection::RoundMismatch);
        }
        if round.dedupe.contains(&bet.source_msg_id) {
            return Err(BetRejection::Duplicate);
        }
        round.dedupe.insert(bet.source_msg_id.clone());
        round.bets.push(bet);
        self.persist(now_ms);
        Ok(())
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.current_round.as_ref()
    }

    /// In-place round mutation; callers follow up with [`touch`] so the
    /// change reaches the snapshot.
    ///
    /// [`touch`]: LedgerStore::touch
    pub fn current_round_mut(&mut self) -> Option<&mut Round> {
        self.current_round.as_mut()
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.persist(now_ms);
    }

    pub fn set_last_result(&mut self, result: SettlementResult, now_ms: u64) {
        self.last_result = Some(result);
        self.persist(now_ms);
    }

    pub fn last_result(&self) -> Option<&SettlementResult> {
        self.last_result.as_ref()
    }

    /// The user's most recent successfully applied plan; empty when none.
    pub fn last_bet_plan(&self, user_id: &str) -> Vec<PlanEntry> {
        self.users
            .get(user_id)
            .map(|account| account.last_bet_plan.clone())
            .unwrap_or_default()
    }

    pub fn set_last_bet_plan(&mut self, user_id: &str, plan: Vec<PlanEntry>, now_ms: u64) {
        self.ensure_user(user_id, now_ms);
        if let Some(account) = self.users.get_mut(user_id) {
            account.last_bet_plan = plan;
        }
        self.persist(now_ms);
    }

    /// Balances of every known user, highest first. The sort is stable so
    /// ties keep enumeration order (ascending user id).
    pub fn leaderboard(&mut self, limit: usize, now_ms: u64) -> Vec<LeaderboardEntry> {
        let ids: Vec<String> = self.users.keys().cloned().collect();
        let mut entries: Vec<LeaderboardEntry> = ids
            .into_iter()
            .map(|id| {
                let points = self.balance(&id, now_ms);
                LeaderboardEntry { id, points }
            })
            .collect();
        entries.sort_by(|a, b| b.points.cmp(&a.points));
        entries.truncate(limit);
        entries
    }

    fn snapshot(&self, now_ms: u64) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            updated_at: now_ms,
            jackpot_pool: self.jackpot_pool,
            last_result: self.last_result.clone(),
            current_round: self.current_round.clone(),
            users: self.users.clone(),
        }
    }

    fn persist(&self, now_ms: u64) {
        let Some(snapshotter) = &self.snapshotter else {
            return;
        };
        if let Err(err) = snapshotter.write(&self.snapshot(now_ms)) {
            tracing::warn!("Failed to persist store snapshot: {err:#}");
        }
    }
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerReason;

/// How a round's outcome is produced.
///
/// Only `normal`, `train`, and `king` can be selected as a round's primary
/// mode. `luck_left`/`luck_right` exist solely as the mode of a bonus spin
/// attached on top of a primary spin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundMode {
    Normal,
    Train,
    King,
    LuckLeft,
    LuckRight,
}

impl RoundMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundMode::Normal => "normal",
            RoundMode::Train => "train",
            RoundMode::King => "king",
            RoundMode::LuckLeft => "luck_left",
            RoundMode::LuckRight => "luck_right",
        }
    }

    /// True for the two bonus-only modes.
    pub fn is_luck(&self) -> bool {
        matches!(self, RoundMode::LuckLeft | RoundMode::LuckRight)
    }

    /// Parse a primary mode name. Luck modes are bonus-only and do not
    /// parse.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "normal" => Some(RoundMode::Normal),
            "train" => Some(RoundMode::Train),
            "king" => Some(RoundMode::King),
            _ => None,
        }
    }
}

/// Visual hint shipped with the spin so clients can stage the right effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightMode {
    Normal,
    Shining,
    Train,
}

impl LightMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightMode::Normal => "normal",
            LightMode::Shining => "shining",
            LightMode::Train => "train",
        }
    }
}

/// Lifecycle tag of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    WaitingBets,
    Betting,
    Spinning,
    Settled,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::WaitingBets => "waiting_bets",
            RoundStatus::Betting => "betting",
            RoundStatus::Spinning => "spinning",
            RoundStatus::Settled => "settled",
        }
    }
}

/// Why a round is parked in `waiting_bets`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleReason {
    NoValidBet,
}

/// A wager registered against the current round. `source_msg_id` is the
/// idempotency key: a round accepts a given key at most once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub user_id: String,
    pub slot_id: u32,
    pub amount: u64,
    pub source_msg_id: String,
}

/// Deterministic result of one wheel run. Immutable once computed; all
/// randomness lives in the caller-chosen inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spin {
    pub start_index: u32,
    /// +1 clockwise, -1 counterclockwise.
    pub direction: i8,
    pub marker_count: u32,
    /// Spacing between markers: `track_len / marker_count`.
    pub offset: u32,
    pub steps: u64,
    pub final_slots: Vec<u32>,
}

/// Bonus single-marker spin aimed at a luck edge slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuckSpin {
    pub mode: RoundMode,
    pub spin: Spin,
}

/// Everything the wheel produced for one round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinOutcome {
    pub mode: RoundMode,
    pub light_mode: LightMode,
    pub marker_count: u32,
    pub primary: Spin,
    pub respins: Vec<Spin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luck: Option<LuckSpin>,
}

impl SpinOutcome {
    /// Every slot that pays this round: primary markers, respins, and the
    /// luck bonus spin if one was attached.
    pub fn winning_slots(&self) -> HashSet<u32> {
        let mut slots: HashSet<u32> = self.primary.final_slots.iter().copied().collect();
        for respin in &self.respins {
            slots.extend(respin.final_slots.iter().copied());
        }
        if let Some(luck) = &self.luck {
            slots.extend(luck.spin.final_slots.iter().copied());
        }
        slots
    }
}

/// State-specific payload of a round. A round only ever carries the fields
/// its current status needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoundState {
    WaitingBets {
        #[serde(rename = "waitingSince")]
        waiting_since: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<IdleReason>,
    },
    Betting {
        #[serde(rename = "betStart")]
        bet_start: u64,
        #[serde(rename = "betDeadline")]
        bet_deadline: u64,
    },
    Spinning {
        outcome: SpinOutcome,
    },
    Settled {
        outcome: SpinOutcome,
        #[serde(rename = "settledAt")]
        settled_at: u64,
    },
}

impl RoundState {
    pub fn status(&self) -> RoundStatus {
        match self {
            RoundState::WaitingBets { .. } => RoundStatus::WaitingBets,
            RoundState::Betting { .. } => RoundStatus::Betting,
            RoundState::Spinning { .. } => RoundStatus::Spinning,
            RoundState::Settled { .. } => RoundStatus::Settled,
        }
    }

    pub fn outcome(&self) -> Option<&SpinOutcome> {
        match self {
            RoundState::Spinning { outcome } | RoundState::Settled { outcome, .. } => Some(outcome),
            _ => None,
        }
    }

    pub fn bet_deadline(&self) -> Option<u64> {
        match self {
            RoundState::Betting { bet_deadline, .. } => Some(*bet_deadline),
            _ => None,
        }
    }
}

/// The single current round. Owned by the ledger store, mutated by the
/// round engine, superseded when a new round starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: u64,
    pub started_at: u64,
    #[serde(flatten)]
    pub state: RoundState,
    #[serde(default)]
    pub bets: Vec<Bet>,
    /// Serialized as a list in snapshots, reconstructed as a set on load.
    #[serde(default)]
    pub dedupe: HashSet<String>,
}

impl Round {
    /// Fresh round waiting for its first wager.
    pub fn new(id: u64, now: u64) -> Self {
        Self {
            id,
            started_at: now,
            state: RoundState::WaitingBets {
                waiting_since: now,
                reason: None,
            },
            bets: Vec::new(),
            dedupe: HashSet::new(),
        }
    }

    pub fn status(&self) -> RoundStatus {
        self.state.status()
    }

    /// Whether wagers are currently accepted.
    pub fn is_open(&self) -> bool {
        matches!(
            self.status(),
            RoundStatus::WaitingBets | RoundStatus::Betting
        )
    }
}

/// One credited win. `delta` is the amount the ledger actually applied,
/// post-clamp, not the nominal `amount * multiplier`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub user_id: String,
    pub slot_id: u32,
    pub amount: u64,
    pub multiplier: u64,
    pub delta: i64,
    pub reason: LedgerReason,
}

/// One share of the distributed jackpot pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPayout {
    pub user_id: String,
    pub delta: i64,
}

/// Leaderboard row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub points: i64,
}

/// Per-winner settlement summary row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementHighlight {
    pub user_id: String,
    pub points_before: i64,
    pub win_points: i64,
    pub points_after: i64,
}

/// Snapshot of a finished round, kept as the store's "last result".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub round_id: u64,
    pub mode: RoundMode,
    pub light_mode: LightMode,
    pub marker_count: u32,
    pub final_slots: Vec<u32>,
    pub respins: Vec<Spin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub luck: Option<LuckSpin>,
    pub payouts_main: Vec<Payout>,
    pub payouts_respins: Vec<Payout>,
    pub jackpot_pool_payouts: Vec<PoolPayout>,
    pub jackpot_pool_paid: u64,
    pub settlement_highlights: Vec<SettlementHighlight>,
    pub settled_at: u64,
}

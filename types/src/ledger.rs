use serde::{Deserialize, Serialize};

/// Why a ledger entry was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// Initial grant for a newly seen user.
    Seed,
    /// Wager debit.
    Bet,
    /// Primary-spin payout.
    Win,
    /// Respin payout (luck bonus spins included).
    Respin,
    /// Payout on a jackpot slot.
    Jackpot,
    /// Share of the distributed jackpot pool.
    JackpotPool,
    /// Zero-balance courtesy grant.
    Bonus,
}

impl LedgerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::Seed => "seed",
            LedgerReason::Bet => "bet",
            LedgerReason::Win => "win",
            LedgerReason::Respin => "respin",
            LedgerReason::Jackpot => "jackpot",
            LedgerReason::JackpotPool => "jackpot_pool",
            LedgerReason::Bonus => "bonus",
        }
    }
}

/// One dated credit or debit. Immutable once written. Timestamps are
/// milliseconds since the Unix epoch; an entry stops counting toward the
/// balance once `expires_at` has passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub delta: i64,
    pub reason: LedgerReason,
    pub created_at: u64,
    pub expires_at: u64,
}

/// One remembered `(slot, amount)` pair of a wager plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub slot_id: u32,
    pub amount: u64,
}

/// A viewer wallet: append-only ledger plus repeat-bet bookkeeping.
/// Created lazily on first reference, never destroyed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub ledger: Vec<LedgerEntry>,
    /// When the zero-balance bonus last fired; 0 means never.
    #[serde(default)]
    pub last_bonus_at: u64,
    /// Most recent successfully applied plan; empty means none.
    #[serde(default)]
    pub last_bet_plan: Vec<PlanEntry>,
}

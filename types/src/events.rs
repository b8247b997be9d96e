use serde::Serialize;

use crate::round::{
    IdleReason, LeaderboardEntry, LightMode, LuckSpin, RoundMode, SettlementHighlight,
    SettlementResult, Spin,
};

/// Broadcast feed emitted by the engine. Every subscriber (websocket fanout,
/// simulator, tests) sees the same tagged payloads.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    RoundWaitingBets {
        #[serde(rename = "roundId")]
        round_id: u64,
        #[serde(rename = "waitingSince")]
        waiting_since: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<IdleReason>,
    },
    RoundStarted {
        #[serde(rename = "roundId")]
        round_id: u64,
        #[serde(rename = "betDeadline")]
        bet_deadline: u64,
        #[serde(rename = "betWindowSec")]
        bet_window_sec: u64,
    },
    BetAccepted {
        #[serde(rename = "roundId")]
        round_id: u64,
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "slotId")]
        slot_id: u32,
        amount: u64,
        #[serde(rename = "jackpotPool")]
        jackpot_pool: u64,
    },
    RoundSpin {
        #[serde(rename = "roundId")]
        round_id: u64,
        mode: RoundMode,
        #[serde(rename = "lightMode")]
        light_mode: LightMode,
        #[serde(rename = "markerCount")]
        marker_count: u32,
        spin: Spin,
        respins: Vec<Spin>,
        #[serde(skip_serializing_if = "Option::is_none")]
        luck: Option<LuckSpin>,
    },
    RoundSettled {
        #[serde(rename = "roundId")]
        round_id: u64,
        result: SettlementResult,
        #[serde(rename = "jackpotPool")]
        jackpot_pool: u64,
        leaderboard: Vec<LeaderboardEntry>,
        #[serde(rename = "settlementHighlights")]
        settlement_highlights: Vec<SettlementHighlight>,
        #[serde(rename = "autoNextRoundInSec")]
        auto_next_round_in_sec: u64,
    },
}

impl GameEvent {
    /// Stable tag, mostly for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::RoundWaitingBets { .. } => "round_waiting_bets",
            GameEvent::RoundStarted { .. } => "round_started",
            GameEvent::BetAccepted { .. } => "bet_accepted",
            GameEvent::RoundSpin { .. } => "round_spin",
            GameEvent::RoundSettled { .. } => "round_settled",
        }
    }
}

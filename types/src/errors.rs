use thiserror::Error;

/// Caller-facing wager rejections. All of these are recoverable: the round
/// and every balance stay exactly as they were, and the reason travels back
/// over whichever channel carried the request.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BetRejection {
    #[error("slot {0} is not on the track")]
    InvalidSlot(i64),
    #[error("amount {0} is not a positive integer")]
    InvalidAmount(i64),
    #[error("bet plan is empty or malformed")]
    InvalidBetPlan,
    #[error("user id is empty")]
    InvalidUser,
    #[error("insufficient points: have {current}, need {required}")]
    InsufficientPoints { current: i64, required: u64 },
    #[error("betting is closed for the current round")]
    BetClosed,
    #[error("no previous bet plan to reuse")]
    NoLastBet,
    #[error("duplicate bet message")]
    Duplicate,
    #[error("bet addressed a round that is no longer current")]
    RoundMismatch,
}

impl BetRejection {
    /// Stable machine code carried in `{ok: false, reason}` responses.
    pub fn code(&self) -> &'static str {
        match self {
            BetRejection::InvalidSlot(_) => "invalid_slot",
            BetRejection::InvalidAmount(_) => "invalid_amount",
            BetRejection::InvalidBetPlan => "invalid_bet_plan",
            BetRejection::InvalidUser => "invalid_user",
            BetRejection::InsufficientPoints { .. } => "insufficient_points",
            BetRejection::BetClosed => "bet_closed",
            BetRejection::NoLastBet => "no_last_bet",
            BetRejection::Duplicate => "duplicate",
            BetRejection::RoundMismatch => "round_mismatch",
        }
    }
}

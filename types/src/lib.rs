pub mod api;
pub mod config;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod round;
pub mod snapshot;
pub mod track;

pub use api::{BetReceipt, BetRequest};
pub use config::{GameConfig, PoolJackpotTarget, SpinDirectionMode};
pub use errors::BetRejection;
pub use events::GameEvent;
pub use ledger::{LedgerEntry, LedgerReason, PlanEntry, UserAccount};
pub use round::{
    Bet, IdleReason, LeaderboardEntry, LightMode, LuckSpin, Payout, PoolPayout, Round, RoundMode,
    RoundState, RoundStatus, SettlementHighlight, SettlementResult, Spin, SpinOutcome,
};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
pub use track::{JackpotSlots, TrackShape, TrackSlot};

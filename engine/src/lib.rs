//! Spintrack round engine.
//!
//! This crate contains the game core: the wallet ledger (`ledger`), the pure
//! spin math (`spin`), weighted selection (`selector`), track construction
//! (`track`), payout resolution (`payout`), snapshot persistence
//! (`snapshot`), and the round state machine that ties them together
//! (`round`).
//!
//! ## Determinism requirements
//! - No wall-clock reads inside the engine; every time-dependent operation
//!   takes an explicit `now_ms`.
//! - All randomness flows through the engine-owned seedable RNG; the spin
//!   math itself is pure.
//!
//! The primary entrypoint is [`RoundEngine`].

pub mod ledger;
pub mod payout;
pub mod round;
pub mod selector;
pub mod snapshot;
pub mod spin;
pub mod track;

pub use ledger::LedgerStore;
pub use payout::PayoutEngine;
pub use round::{RoundEngine, ScheduledAction, ScheduledCommand};
pub use snapshot::Snapshotter;
pub use track::TrackPlan;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::round::RoundMode;
use crate::track::TrackShape;

/// Which way the wheel travels along the track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinDirectionMode {
    #[default]
    Clockwise,
    Counter,
    /// Fresh coin flip per spin.
    Random,
}

impl SpinDirectionMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "clockwise" => Some(SpinDirectionMode::Clockwise),
            "counter" | "counterclockwise" => Some(SpinDirectionMode::Counter),
            "random" => Some(SpinDirectionMode::Random),
            _ => None,
        }
    }
}

/// Which jackpot slot the pooled prize is attached to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolJackpotTarget {
    #[default]
    Big,
    Small,
}

impl PoolJackpotTarget {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "big" => Some(PoolJackpotTarget::Big),
            "small" => Some(PoolJackpotTarget::Small),
            _ => None,
        }
    }
}

/// Every tunable the game consumes, fully enumerated. Invalid combinations
/// are rejected by [`GameConfig::validate`] before an engine is built.
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    /// Betting window length once the first wager arrives.
    pub bet_window_secs: u64,
    /// Pause between the spin broadcast and settlement.
    pub spin_duration_secs: u64,
    /// Pause between settlement and the next round.
    pub settle_pause_secs: u64,
    pub settlement_highlight_limit: usize,
    pub spin_direction: SpinDirectionMode,
    pub grid_rows: u32,
    pub grid_cols: u32,
    pub track_shape: TrackShape,
    /// Path tokens for `TrackShape::Custom`, e.g. `"0,0;0,1;12"`.
    pub track_custom_path: String,
    /// Candidate marker counts for normal/train spins, with weights.
    pub marker_counts: Vec<u32>,
    pub marker_count_weights: Vec<u64>,
    /// Selectable primary modes, with weights.
    pub round_modes: Vec<RoundMode>,
    pub round_mode_weights: Vec<u64>,
    /// Lucky sub-mode weights: none, left, right.
    pub normal_luck_mode_weights: [u64; 3],
    pub normal_mult: u64,
    /// Explicit per-slot multiplier overrides; empty table disables rule 1.
    pub slot_multipliers: HashMap<u32, u64>,
    /// With a non-empty table, slots absent from it pay 0 instead of
    /// falling through to the default multipliers.
    pub slot_multipliers_strict: bool,
    /// Fraction of every accepted wager that feeds the pool.
    pub jackpot_pool_rate: f64,
    pub jackpot_small_mult: u64,
    pub jackpot_big_mult: u64,
    /// Explicit [big, small] override; empty picks the two slots nearest
    /// the grid center.
    pub jackpot_slots: Vec<u32>,
    pub pool_jackpot_enabled: bool,
    pub pool_jackpot_slot: PoolJackpotTarget,
    /// Only distribute the pool when the target slot was actually hit.
    pub pool_jackpot_require_hit: bool,
    /// Keep the flat jackpot multiplier on the pool slot instead of
    /// replacing it with the pool payout.
    pub pool_jackpot_keep_base_mult: bool,
    /// Explicit respin trigger slots; empty picks two non-jackpot slots.
    pub respin_slots: Vec<u32>,
    pub respin_min: u32,
    pub respin_max: u32,
    pub no_point_bonus_points: u64,
    pub no_point_bonus_cooldown_mins: u64,
    /// Gate for the whole bonus feature; off means no bonus is ever paid.
    pub no_point_bonus_require_zero: bool,
    pub leaderboard_limit: usize,
    pub point_expire_hours: u64,
    /// Seed balance granted on first reference to a user.
    pub start_points: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            bet_window_secs: 10,
            spin_duration_secs: 6,
            settle_pause_secs: 3,
            settlement_highlight_limit: 12,
            spin_direction: SpinDirectionMode::Clockwise,
            grid_rows: 11,
            grid_cols: 11,
            track_shape: TrackShape::Perimeter,
            track_custom_path: String::new(),
            marker_counts: vec![1, 6, 8],
            marker_count_weights: vec![9900, 50, 50],
            round_modes: vec![RoundMode::Normal, RoundMode::Train, RoundMode::King],
            round_mode_weights: vec![80, 10, 10],
            normal_luck_mode_weights: [55, 20, 25],
            normal_mult: 2,
            slot_multipliers: HashMap::new(),
            slot_multipliers_strict: false,
            jackpot_pool_rate: 0.02,
            jackpot_small_mult: 20,
            jackpot_big_mult: 50,
            jackpot_slots: Vec::new(),
            pool_jackpot_enabled: true,
            pool_jackpot_slot: PoolJackpotTarget::Big,
            pool_jackpot_require_hit: true,
            pool_jackpot_keep_base_mult: false,
            respin_slots: Vec::new(),
            respin_min: 1,
            respin_max: 8,
            no_point_bonus_points: 10,
            no_point_bonus_cooldown_mins: 60,
            no_point_bonus_require_zero: true,
            leaderboard_limit: 100,
            point_expire_hours: 24,
            start_points: 100,
        }
    }
}

impl GameConfig {
    /// Validate internal consistency. Durations of zero are legal (useful
    /// in tests); structural mismatches are not.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.grid_rows == 0 || self.grid_cols == 0 {
            return Err("grid_rows and grid_cols must be greater than zero");
        }
        if self.marker_counts.is_empty() {
            return Err("marker_counts must not be empty");
        }
        if self.marker_counts.len() != self.marker_count_weights.len() {
            return Err("marker_counts and marker_count_weights must have the same length");
        }
        if self.marker_counts.iter().any(|count| *count == 0) {
            return Err("marker_counts entries must be greater than zero");
        }
        if self.round_modes.is_empty() {
            return Err("round_modes must not be empty");
        }
        if self.round_modes.len() != self.round_mode_weights.len() {
            return Err("round_modes and round_mode_weights must have the same length");
        }
        if self.round_modes.iter().any(|mode| mode.is_luck()) {
            return Err("round_modes must not contain luck modes");
        }
        if !self.jackpot_pool_rate.is_finite() || self.jackpot_pool_rate < 0.0 {
            return Err("jackpot_pool_rate must be a non-negative number");
        }
        if self.respin_min > self.respin_max {
            return Err("respin_min must not exceed respin_max");
        }
        if !self.jackpot_slots.is_empty() && self.jackpot_slots.len() < 2 {
            return Err("jackpot_slots override must name two slots");
        }
        if self.settlement_highlight_limit == 0 {
            return Err("settlement_highlight_limit must be greater than zero");
        }
        if self.point_expire_hours == 0 {
            return Err("point_expire_hours must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_mismatched_marker_weights() {
        let config = GameConfig {
            marker_count_weights: vec![1, 2],
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_luck_primary_modes() {
        let config = GameConfig {
            round_modes: vec![RoundMode::Normal, RoundMode::LuckLeft],
            round_mode_weights: vec![1, 1],
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_respin_range() {
        let config = GameConfig {
            respin_min: 5,
            respin_max: 2,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_pool_rate() {
        let config = GameConfig {
            jackpot_pool_rate: -0.5,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_durations_are_legal() {
        let config = GameConfig {
            bet_window_secs: 0,
            spin_duration_secs: 0,
            settle_pause_secs: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_direction_modes() {
        assert_eq!(
            SpinDirectionMode::parse("counter"),
            Some(SpinDirectionMode::Counter)
        );
        assert_eq!(
            SpinDirectionMode::parse("RANDOM"),
            Some(SpinDirectionMode::Random)
        );
        assert_eq!(SpinDirectionMode::parse("sideways"), None);
    }
}

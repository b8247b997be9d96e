//! Environment-driven game configuration.
//!
//! Every tunable has a default; unparseable values fall back rather than
//! abort. Structural problems are caught later by `GameConfig::validate`.

use std::collections::HashMap;

use spintrack_types::{GameConfig, PoolJackpotTarget, RoundMode, SpinDirectionMode, TrackShape};

fn env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_int<T: std::str::FromStr>(raw: Option<String>, fallback: T) -> T {
    raw.and_then(|value| value.parse().ok()).unwrap_or(fallback)
}

fn parse_bool(raw: Option<String>, fallback: bool) -> bool {
    match raw.as_deref() {
        Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        _ => fallback,
    }
}

fn parse_float(raw: Option<String>, fallback: f64) -> f64 {
    raw.and_then(|value| value.parse().ok())
        .filter(|value: &f64| value.is_finite())
        .unwrap_or(fallback)
}

/// Comma list of integers; unparseable tokens are dropped, an empty or
/// missing value yields the fallback.
fn parse_list<T: std::str::FromStr + Clone>(raw: Option<String>, fallback: &[T]) -> Vec<T> {
    let Some(raw) = raw else {
        return fallback.to_vec();
    };
    let parsed: Vec<T> = raw
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse().ok())
        .collect();
    if parsed.is_empty() {
        fallback.to_vec()
    } else {
        parsed
    }
}

/// Comma list of slot ids; missing means "no override".
fn parse_slots(raw: Option<String>) -> Vec<u32> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// Comma list of primary mode names; unknown names are dropped.
fn parse_modes(raw: Option<String>, fallback: &[RoundMode]) -> Vec<RoundMode> {
    let Some(raw) = raw else {
        return fallback.to_vec();
    };
    let parsed: Vec<RoundMode> = raw
        .split(',')
        .map(str::trim)
        .filter_map(RoundMode::parse)
        .collect();
    if parsed.is_empty() {
        fallback.to_vec()
    } else {
        parsed
    }
}

/// Exactly three weights (none, left, right); anything else keeps the
/// fallback.
fn parse_luck_weights(raw: Option<String>, fallback: [u64; 3]) -> [u64; 3] {
    let parsed = parse_list::<u64>(raw, &fallback);
    match <[u64; 3]>::try_from(parsed) {
        Ok(weights) => weights,
        Err(_) => fallback,
    }
}

/// `slot:mult` pairs, e.g. `"3:50,9:20"`. Malformed pairs are dropped.
fn parse_multiplier_table(raw: Option<String>) -> HashMap<u32, u64> {
    let Some(raw) = raw else {
        return HashMap::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let (slot, mult) = token.split_once(':')?;
            Some((slot.trim().parse().ok()?, mult.trim().parse().ok()?))
        })
        .collect()
}

/// Assemble a [`GameConfig`] from the process environment.
pub fn from_env() -> GameConfig {
    let defaults = GameConfig::default();
    GameConfig {
        bet_window_secs: parse_int(env("BET_WINDOW_SEC"), defaults.bet_window_secs),
        spin_duration_secs: parse_int(env("SPIN_DURATION_SEC"), defaults.spin_duration_secs),
        settle_pause_secs: parse_int(env("SETTLE_PAUSE_SEC"), defaults.settle_pause_secs),
        settlement_highlight_limit: parse_int(
            env("SETTLEMENT_HIGHLIGHT_LIMIT"),
            defaults.settlement_highlight_limit,
        ),
        spin_direction: env("SPIN_DIRECTION_MODE")
            .and_then(|raw| SpinDirectionMode::parse(&raw))
            .unwrap_or(defaults.spin_direction),
        grid_rows: parse_int(env("GRID_ROWS"), defaults.grid_rows),
        grid_cols: parse_int(env("GRID_COLS"), defaults.grid_cols),
        track_shape: env("TRACK_MODE")
            .and_then(|raw| TrackShape::parse(&raw))
            .unwrap_or(defaults.track_shape),
        track_custom_path: env("TRACK_CUSTOM_PATH").unwrap_or(defaults.track_custom_path),
        marker_counts: parse_list(env("MARKER_COUNTS"), &defaults.marker_counts),
        marker_count_weights: parse_list(
            env("MARKER_COUNT_WEIGHTS"),
            &defaults.marker_count_weights,
        ),
        round_modes: parse_modes(env("ROUND_MODES"), &defaults.round_modes),
        round_mode_weights: parse_list(env("ROUND_MODE_WEIGHTS"), &defaults.round_mode_weights),
        normal_luck_mode_weights: parse_luck_weights(
            env("NORMAL_LUCK_WEIGHTS"),
            defaults.normal_luck_mode_weights,
        ),
        normal_mult: parse_int(env("NORMAL_MULT"), defaults.normal_mult),
        slot_multipliers: parse_multiplier_table(env("SLOT_MULTIPLIERS")),
        slot_multipliers_strict: parse_bool(
            env("SLOT_MULTIPLIERS_STRICT"),
            defaults.slot_multipliers_strict,
        ),
        jackpot_pool_rate: parse_float(env("JACKPOT_POOL_RATE"), defaults.jackpot_pool_rate),
        jackpot_small_mult: parse_int(env("JACKPOT_SMALL_MULT"), defaults.jackpot_small_mult),
        jackpot_big_mult: parse_int(env("JACKPOT_BIG_MULT"), defaults.jackpot_big_mult),
        jackpot_slots: parse_slots(env("JACKPOT_SLOTS")),
        pool_jackpot_enabled: parse_bool(
            env("POOL_JACKPOT_ENABLED"),
            defaults.pool_jackpot_enabled,
        ),
        pool_jackpot_slot: env("POOL_JACKPOT_SLOT")
            .and_then(|raw| PoolJackpotTarget::parse(&raw))
            .unwrap_or(defaults.pool_jackpot_slot),
        pool_jackpot_require_hit: parse_bool(
            env("POOL_JACKPOT_REQUIRE_HIT"),
            defaults.pool_jackpot_require_hit,
        ),
        pool_jackpot_keep_base_mult: parse_bool(
            env("POOL_JACKPOT_KEEP_BASE_MULT"),
            defaults.pool_jackpot_keep_base_mult,
        ),
        respin_slots: parse_slots(env("RESPIN_SLOTS")),
        respin_min: parse_int(env("RESPIN_MIN"), defaults.respin_min),
        respin_max: parse_int(env("RESPIN_MAX"), defaults.respin_max),
        no_point_bonus_points: parse_int(
            env("NO_POINT_BONUS_POINTS"),
            defaults.no_point_bonus_points,
        ),
        no_point_bonus_cooldown_mins: parse_int(
            env("NO_POINT_BONUS_COOLDOWN_MIN"),
            defaults.no_point_bonus_cooldown_mins,
        ),
        no_point_bonus_require_zero: parse_bool(
            env("NO_POINT_BONUS_REQUIRE_ZERO"),
            defaults.no_point_bonus_require_zero,
        ),
        leaderboard_limit: parse_int(env("LEADERBOARD_LIMIT"), defaults.leaderboard_limit),
        point_expire_hours: parse_int(env("POINT_EXPIRE_HOURS"), defaults.point_expire_hours),
        start_points: parse_int(env("LOCAL_START_POINTS"), defaults.start_points),
    }
}

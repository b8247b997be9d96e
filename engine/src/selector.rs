//! Weighted-random selection used to shape each round: marker count, round
//! mode, the lucky sub-mode, and the king target slot.

use rand::Rng;

use spintrack_types::{JackpotSlots, RoundMode};

/// King rounds aim at the big jackpot slot with this fixed bias over small.
const KING_TARGET_WEIGHTS: [u64; 2] = [60, 40];

/// Cumulative-weight roulette selection. A zero weight sum or an
/// items/weights length mismatch falls back deterministically to the first
/// item; `None` only when `items` is empty.
pub fn pick_weighted<'a, T>(rng: &mut impl Rng, items: &'a [T], weights: &[u64]) -> Option<&'a T> {
    let first = items.first()?;
    if weights.len() != items.len() {
        return Some(first);
    }
    let total: u64 = weights.iter().sum();
    if total == 0 {
        return Some(first);
    }
    let mut roll = rng.gen_range(0..total);
    for (item, weight) in items.iter().zip(weights) {
        if roll < *weight {
            return Some(item);
        }
        roll -= weight;
    }
    Some(first)
}

/// How many simultaneous markers the primary spin carries.
pub fn pick_marker_count(rng: &mut impl Rng, counts: &[u32], weights: &[u64]) -> u32 {
    match pick_weighted(rng, counts, weights) {
        Some(count) => *count,
        None => 1,
    }
}

pub fn pick_round_mode(rng: &mut impl Rng, modes: &[RoundMode], weights: &[u64]) -> RoundMode {
    match pick_weighted(rng, modes, weights) {
        Some(mode) => *mode,
        None => RoundMode::Normal,
    }
}

/// Roll the lucky sub-mode for a normal/king round. Weights are
/// `[none, left, right]`; `None` means no bonus spin this round.
pub fn pick_luck_mode(rng: &mut impl Rng, weights: &[u64; 3]) -> Option<RoundMode> {
    let options = [None, Some(RoundMode::LuckLeft), Some(RoundMode::LuckRight)];
    pick_weighted(rng, &options, weights).and_then(|mode| *mode)
}

pub fn pick_king_target(rng: &mut impl Rng, jackpot: JackpotSlots) -> u32 {
    let targets = [jackpot.big, jackpot.small];
    match pick_weighted(rng, &targets, &KING_TARGET_WEIGHTS) {
        Some(slot) => *slot,
        None => jackpot.big,
    }
}

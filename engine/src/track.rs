//! Track construction. Turns the configured grid into an ordered slot path
//! and derives the special positions the engine needs: the two jackpot
//! slots, the respin trigger slots, and the luck edge sets.

use std::collections::HashSet;

use rand::Rng;

use spintrack_types::{GameConfig, JackpotSlots, RoundMode, TrackShape, TrackSlot};

/// Reserved luck tables for the classic 24-slot layout (7x7 perimeter).
const LUCK_LEFT_24: [u32; 7] = [0, 18, 19, 20, 21, 22, 23];
const LUCK_RIGHT_24: [u32; 7] = [6, 7, 8, 9, 10, 11, 12];

/// Everything derived from the grid at startup. Immutable for the lifetime
/// of the engine.
#[derive(Clone, Debug)]
pub struct TrackPlan {
    pub track: Vec<TrackSlot>,
    pub rows: u32,
    pub cols: u32,
    pub jackpot: JackpotSlots,
    pub respin_slots: Vec<u32>,
    pub luck_left: Vec<u32>,
    pub luck_right: Vec<u32>,
}

impl TrackPlan {
    pub fn from_config(config: &GameConfig, rng: &mut impl Rng) -> Result<Self, &'static str> {
        let track = build_track(
            config.grid_rows,
            config.grid_cols,
            config.track_shape,
            &config.track_custom_path,
        );
        if track.len() < 2 {
            return Err("track must contain at least two slots");
        }
        let len = track.len() as u32;

        let jackpot = if config.jackpot_slots.len() >= 2 {
            let slots = JackpotSlots {
                big: config.jackpot_slots[0],
                small: config.jackpot_slots[1],
            };
            if slots.big >= len || slots.small >= len {
                return Err("jackpot_slots override is outside the track");
            }
            slots
        } else {
            pick_jackpot_slots(&track, config.grid_rows, config.grid_cols)
        };

        let respin_slots = if config.respin_slots.is_empty() {
            pick_respin_slots(rng, len, &[jackpot.big, jackpot.small], 2)
        } else {
            if config.respin_slots.iter().any(|slot| *slot >= len) {
                return Err("respin_slots override is outside the track");
            }
            config.respin_slots.clone()
        };

        let (luck_left, luck_right) = luck_edge_sets(&track);

        Ok(Self {
            track,
            rows: config.grid_rows,
            cols: config.grid_cols,
            jackpot,
            respin_slots,
            luck_left,
            luck_right,
        })
    }

    pub fn track_len(&self) -> u32 {
        self.track.len() as u32
    }

    pub fn is_respin_slot(&self, slot: u32) -> bool {
        self.respin_slots.contains(&slot)
    }

    /// Target candidates for a luck bonus spin; empty for non-luck modes.
    pub fn luck_set(&self, mode: RoundMode) -> &[u32] {
        match mode {
            RoundMode::LuckLeft => &self.luck_left,
            RoundMode::LuckRight => &self.luck_right,
            _ => &[],
        }
    }
}

/// Number the grid cells along the configured path shape.
pub fn build_track(rows: u32, cols: u32, shape: TrackShape, custom_path: &str) -> Vec<TrackSlot> {
    let cells = match shape {
        TrackShape::Perimeter => build_perimeter(rows, cols),
        TrackShape::Snake => build_snake(rows, cols),
        TrackShape::Spiral => build_spiral(rows, cols),
        TrackShape::Custom => build_custom(rows, cols, custom_path),
    };
    cells
        .into_iter()
        .enumerate()
        .map(|(id, (r, c))| TrackSlot {
            id: id as u32,
            r,
            c,
        })
        .collect()
}

fn build_perimeter(rows: u32, cols: u32) -> Vec<(u32, u32)> {
    let mut path = Vec::new();
    if rows == 0 || cols == 0 {
        return path;
    }
    for c in 0..cols {
        path.push((0, c));
    }
    for r in 1..rows {
        path.push((r, cols - 1));
    }
    if rows > 1 {
        for c in (0..cols.saturating_sub(1)).rev() {
            path.push((rows - 1, c));
        }
    }
    if cols > 1 {
        for r in (1..rows.saturating_sub(1)).rev() {
            path.push((r, 0));
        }
    }
    path
}

fn build_snake(rows: u32, cols: u32) -> Vec<(u32, u32)> {
    let mut path = Vec::new();
    for r in 0..rows {
        if r % 2 == 0 {
            for c in 0..cols {
                path.push((r, c));
            }
        } else {
            for c in (0..cols).rev() {
                path.push((r, c));
            }
        }
    }
    path
}

fn build_spiral(rows: u32, cols: u32) -> Vec<(u32, u32)> {
    let mut path = Vec::new();
    let mut top: i64 = 0;
    let mut bottom: i64 = i64::from(rows) - 1;
    let mut left: i64 = 0;
    let mut right: i64 = i64::from(cols) - 1;
    while top <= bottom && left <= right {
        for c in left..=right {
            path.push((top as u32, c as u32));
        }
        top += 1;
        for r in top..=bottom {
            path.push((r as u32, right as u32));
        }
        right -= 1;
        if top <= bottom {
            for c in (left..=right).rev() {
                path.push((bottom as u32, c as u32));
            }
            bottom -= 1;
        }
        if left <= right {
            for r in (top..=bottom).rev() {
                path.push((r as u32, left as u32));
            }
            left += 1;
        }
    }
    path
}

/// Token list, either `r,c` pairs or flat indices, separated by `;`, `|`,
/// or whitespace. Out-of-grid tokens are dropped, not an error.
fn build_custom(rows: u32, cols: u32, path_spec: &str) -> Vec<(u32, u32)> {
    let mut path = Vec::new();
    if rows == 0 || cols == 0 {
        return path;
    }
    let tokens = path_spec
        .split(|ch: char| ch == ';' || ch == '|' || ch.is_whitespace())
        .filter(|token| !token.is_empty());
    for token in tokens {
        let cell = if let Some((r_raw, c_raw)) = token.split_once(',') {
            match (r_raw.trim().parse::<i64>(), c_raw.trim().parse::<i64>()) {
                (Ok(r), Ok(c)) => Some((r, c)),
                _ => None,
            }
        } else {
            match token.parse::<i64>() {
                Ok(index) if index >= 0 => {
                    Some((index / i64::from(cols), index % i64::from(cols)))
                }
                _ => None,
            }
        };
        if let Some((r, c)) = cell {
            if r >= 0 && r < i64::from(rows) && c >= 0 && c < i64::from(cols) {
                path.push((r as u32, c as u32));
            }
        }
    }
    path
}

/// The two track slots nearest the grid center, big first. Distances use
/// doubled coordinates so the fractional center never needs floats; ties
/// keep path order.
fn pick_jackpot_slots(track: &[TrackSlot], rows: u32, cols: u32) -> JackpotSlots {
    let mut sorted: Vec<&TrackSlot> = track.iter().collect();
    sorted.sort_by_key(|slot| {
        let dr = 2 * i64::from(slot.r) - (i64::from(rows) - 1);
        let dc = 2 * i64::from(slot.c) - (i64::from(cols) - 1);
        dr * dr + dc * dc
    });
    JackpotSlots {
        big: sorted[0].id,
        small: sorted[1].id,
    }
}

/// Distinct random slots outside `exclude`. Returns fewer than `count` when
/// the track has no room.
fn pick_respin_slots(rng: &mut impl Rng, track_len: u32, exclude: &[u32], count: u32) -> Vec<u32> {
    if track_len == 0 {
        return Vec::new();
    }
    let excluded: HashSet<u32> = exclude.iter().copied().filter(|s| *s < track_len).collect();
    let available = track_len as usize - excluded.len();
    let want = (count as usize).min(available);
    let mut slots: Vec<u32> = Vec::with_capacity(want);
    while slots.len() < want {
        let candidate = rng.gen_range(0..track_len);
        if excluded.contains(&candidate) || slots.contains(&candidate) {
            continue;
        }
        slots.push(candidate);
    }
    slots
}

/// Slot ids on the leftmost/rightmost occupied column. The reserved
/// 24-slot layout uses its fixed tables.
fn luck_edge_sets(track: &[TrackSlot]) -> (Vec<u32>, Vec<u32>) {
    if track.len() == 24 {
        return (LUCK_LEFT_24.to_vec(), LUCK_RIGHT_24.to_vec());
    }
    let (Some(min_col), Some(max_col)) = (
        track.iter().map(|slot| slot.c).min(),
        track.iter().map(|slot| slot.c).max(),
    ) else {
        return (Vec::new(), Vec::new());
    };
    let left = track
        .iter()
        .filter(|slot| slot.c == min_col)
        .map(|slot| slot.id)
        .collect();
    let right = track
        .iter()
        .filter(|slot| slot.c == max_col)
        .map(|slot| slot.id)
        .collect();
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cells(track: &[TrackSlot]) -> Vec<(u32, u32)> {
        track.iter().map(|slot| (slot.r, slot.c)).collect()
    }

    #[test]
    fn perimeter_walks_clockwise() {
        let track = build_track(3, 3, TrackShape::Perimeter, "");
        assert_eq!(
            cells(&track),
            vec![
                (0, 0),
                (0, 1),
                (0, 2),
                (1, 2),
                (2, 2),
                (2, 1),
                (2, 0),
                (1, 0),
            ]
        );
    }

    #[test]
    fn snake_alternates_row_direction() {
        let track = build_track(2, 3, TrackShape::Snake, "");
        assert_eq!(
            cells(&track),
            vec![(0, 0), (0, 1), (0, 2), (1, 2), (1, 1), (1, 0)]
        );
    }

    #[test]
    fn spiral_works_inward() {
        let track = build_track(3, 3, TrackShape::Spiral, "");
        assert_eq!(
            cells(&track),
            vec![
                (0, 0),
                (0, 1),
                (0, 2),
                (1, 2),
                (2, 2),
                (2, 1),
                (2, 0),
                (1, 0),
                (1, 1),
            ]
        );
    }

    #[test]
    fn custom_accepts_pairs_and_flat_indices() {
        let track = build_track(3, 3, TrackShape::Custom, "0,0;0,1 5|9,9 x");
        assert_eq!(cells(&track), vec![(0, 0), (0, 1), (1, 2)]);
    }

    #[test]
    fn default_grid_produces_40_slot_perimeter() {
        let track = build_track(11, 11, TrackShape::Perimeter, "");
        assert_eq!(track.len(), 40);
    }

    #[test]
    fn seven_by_seven_perimeter_matches_reserved_luck_tables() {
        let track = build_track(7, 7, TrackShape::Perimeter, "");
        assert_eq!(track.len(), 24);
        let (left, right) = luck_edge_sets(&track);
        assert_eq!(left, LUCK_LEFT_24.to_vec());
        assert_eq!(right, LUCK_RIGHT_24.to_vec());
        for id in left {
            assert_eq!(track[id as usize].c, 0);
        }
        for id in right {
            assert_eq!(track[id as usize].c, 6);
        }
    }

    #[test]
    fn luck_sets_follow_edge_columns_for_other_sizes() {
        let track = build_track(3, 3, TrackShape::Perimeter, "");
        let (left, right) = luck_edge_sets(&track);
        assert_eq!(left, vec![0, 6, 7]);
        assert_eq!(right, vec![2, 3, 4]);
    }

    #[test]
    fn jackpot_auto_pick_prefers_center_proximity() {
        let track = build_track(11, 11, TrackShape::Perimeter, "");
        let jackpot = pick_jackpot_slots(&track, 11, 11);
        assert_eq!(jackpot.big, 5);
        assert_eq!(jackpot.small, 15);
    }

    #[test]
    fn respin_slots_avoid_jackpot_and_repeat() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let slots = pick_respin_slots(&mut rng, 24, &[5, 15], 2);
            assert_eq!(slots.len(), 2);
            assert_ne!(slots[0], slots[1]);
            assert!(!slots.contains(&5));
            assert!(!slots.contains(&15));
        }
    }

    #[test]
    fn respin_slots_shrink_when_track_is_tight() {
        let mut rng = StdRng::seed_from_u64(3);
        let slots = pick_respin_slots(&mut rng, 2, &[0, 1], 2);
        assert!(slots.is_empty());
    }

    #[test]
    fn plan_from_default_config() {
        let config = GameConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let plan = TrackPlan::from_config(&config, &mut rng).unwrap();
        assert_eq!(plan.track_len(), 40);
        assert_eq!(plan.jackpot.big, 5);
        assert_eq!(plan.jackpot.small, 15);
        assert_eq!(plan.respin_slots.len(), 2);
        assert!(!plan.luck_set(RoundMode::LuckLeft).is_empty());
        assert!(plan.luck_set(RoundMode::Normal).is_empty());
    }

    #[test]
    fn plan_rejects_out_of_range_overrides() {
        let config = GameConfig {
            jackpot_slots: vec![5, 99],
            ..GameConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(TrackPlan::from_config(&config, &mut rng).is_err());
    }

    #[test]
    fn plan_rejects_degenerate_custom_track() {
        let config = GameConfig {
            track_shape: TrackShape::Custom,
            track_custom_path: "0,0".to_string(),
            ..GameConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(TrackPlan::from_config(&config, &mut rng).is_err());
    }
}

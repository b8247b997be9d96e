//! Pure spin math. Given a track length, start position, direction, marker
//! count, and step count, computes where every marker comes to rest. All
//! randomness lives in the caller-chosen inputs; identical inputs always
//! produce identical output.

use spintrack_types::Spin;

/// Wrap an arbitrary signed index onto `[0, len)`.
pub fn normalize_index(index: i64, len: u32) -> u32 {
    if len == 0 {
        return 0;
    }
    let len = i64::from(len);
    let wrapped = ((index % len) + len) % len;
    wrapped as u32
}

/// Run one spin. Marker `i` starts `i * offset` slots ahead of
/// `start_index` (offset = `track_len / marker_count`) and travels `steps`
/// slots in `direction`. `track_len` and `marker_count` are clamped to at
/// least 1 before division.
pub fn run_spin(
    track_len: u32,
    start_index: u32,
    direction: i8,
    marker_count: u32,
    steps: u64,
) -> Spin {
    let len = track_len.max(1);
    let markers = marker_count.max(1);
    let offset = len / markers;

    let travel = i64::from(direction) * steps as i64;
    let mut final_slots = Vec::with_capacity(markers as usize);
    for i in 0..markers {
        let base = i64::from(start_index) + i64::from(i) * i64::from(offset);
        final_slots.push(normalize_index(base + travel, len));
    }

    Spin {
        start_index: normalize_index(i64::from(start_index), len),
        direction,
        marker_count: markers,
        offset,
        steps,
        final_slots,
    }
}

/// Minimal forward step count that lands a single marker starting at
/// `start_index` exactly on `target`, travelling in `direction`. Callers
/// add whole extra loops on top for visual spin duration.
pub fn target_steps(track_len: u32, start_index: u32, direction: i8, target: u32) -> u64 {
    let len = track_len.max(1);
    let delta = if direction >= 0 {
        i64::from(target) - i64::from(start_index)
    } else {
        i64::from(start_index) - i64::from(target)
    };
    u64::from(normalize_index(delta, len))
}

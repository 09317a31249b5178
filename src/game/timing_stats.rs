use crate::game::judgment::{Judgement, JudgementEvent};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TimingStats {
    pub mean_abs_ms: f32,
    pub mean_ms: f32,
    pub stddev_ms: f32,
    pub max_abs_ms: f32,
    pub count: usize,
}

#[inline(always)]
fn offsets(events: &[JudgementEvent]) -> impl Iterator<Item = f32> + '_ {
    events
        .iter()
        .filter(|e| e.has_offset() && e.judgement != Judgement::Miss)
        .map(|e| e.offset as f32)
}

/// Offset statistics over every judged hit, misses excluded.
pub fn compute_timing_stats(events: &[JudgementEvent]) -> TimingStats {
    let mut sum_abs = 0.0_f32;
    let mut sum_signed = 0.0_f32;
    let mut max_abs = 0.0_f32;
    let mut count: usize = 0;

    for e in offsets(events) {
        let a = e.abs();
        sum_abs += a;
        sum_signed += e;
        if a > max_abs {
            max_abs = a;
        }
        count += 1;
    }

    if count == 0 {
        return TimingStats::default();
    }

    let mean_ms = sum_signed / (count as f32);
    let mean_abs_ms = sum_abs / (count as f32);

    // Sample standard deviation of signed offsets
    let stddev_ms = if count > 1 {
        let sum_diff_sq: f32 = offsets(events).map(|e| (e - mean_ms) * (e - mean_ms)).sum();
        (sum_diff_sq / ((count as f32) - 1.0)).sqrt()
    } else {
        0.0
    };

    TimingStats { mean_abs_ms, mean_ms, stddev_ms, max_abs_ms: max_abs, count }
}

/// 1ms offset histogram, sorted by bin.
pub fn build_histogram_ms(events: &[JudgementEvent]) -> Vec<(i32, u32)> {
    let mut counts: HashMap<i32, u32> = HashMap::new();
    for e in offsets(events) {
        let c = counts.entry(e.floor() as i32).or_insert(0);
        *c = c.saturating_add(1);
    }
    let mut bins: Vec<(i32, u32)> = counts.into_iter().collect();
    bins.sort_unstable_by_key(|(bin, _)| *bin);
    bins
}

use crate::game::scroll::PoolingThresholds;
use crate::game::timing::{TRACK_ROUNDING, VelocityCurve};
use std::collections::VecDeque;

/// Playfield height, in units, that a 100% peak height maps to.
pub const PEAK_HEIGHT_BASE: f32 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    #[default]
    Down,
    Up,
}

impl ScrollDirection {
    #[inline(always)]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Down => 1.0,
            Self::Up => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingLineInfo {
    pub start_time: f32,
    pub track_offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingLine {
    pub info: TimingLineInfo,
    /// Positive once the line has passed the receptors.
    pub track_position: i64,
    pub y: f32,
}

#[inline(always)]
pub fn scale_factor_for(peak_height_percent: u32) -> f32 {
    (peak_height_percent as f32 / 100.0 * PEAK_HEIGHT_BASE).max(1.0)
}

/// Beat lines riding the same track positions as notes.
#[derive(Debug, Clone)]
pub struct TimingLineFeed {
    lines: Vec<TimingLineInfo>,
    pending: VecDeque<TimingLineInfo>,
    active: VecDeque<TimingLine>,
    scale_factor: f32,
    direction: ScrollDirection,
    target_y: f32,
}

impl TimingLineFeed {
    pub fn new(
        times: &[f32],
        curve: &VelocityCurve,
        peak_height_percent: u32,
        direction: ScrollDirection,
        target_y: f32,
    ) -> Self {
        let mut lines: Vec<TimingLineInfo> = times
            .iter()
            .map(|&t| TimingLineInfo {
                start_time: t,
                track_offset: curve.time_to_position(f64::from(t)),
            })
            .collect();
        lines.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let mut feed = Self {
            lines,
            pending: VecDeque::new(),
            active: VecDeque::new(),
            scale_factor: scale_factor_for(peak_height_percent),
            direction,
            target_y,
        };
        feed.initialize_pool(f64::NEG_INFINITY);
        feed
    }

    /// Drops every pooled line and re-queues the ones at or after `audio_time`.
    pub fn initialize_pool(&mut self, audio_time: f64) {
        self.active.clear();
        self.pending = self
            .lines
            .iter()
            .copied()
            .filter(|l| f64::from(l.start_time) >= audio_time)
            .collect();
    }

    pub fn set_peak_height(&mut self, peak_height_percent: u32) {
        self.scale_factor = scale_factor_for(peak_height_percent);
    }

    #[inline(always)]
    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    /// Squared falloff that compresses far lines toward a horizon `scale_factor` above the target.
    #[inline(always)]
    pub fn transform(&self, position: f32) -> f32 {
        let s = self.scale_factor;
        let p = position.max(-s);
        ((p / s + 1.0).powi(2) - 1.0) * s
    }

    pub fn update(
        &mut self,
        current_position: i64,
        audio_time: f64,
        scroll_speed: f32,
        thresholds: &PoolingThresholds,
    ) {
        while let Some(next) = self.pending.front().copied() {
            let near = ((current_position - next.track_offset) as f32).abs()
                < thresholds.create_position;
            let soon = (f64::from(next.start_time) - audio_time) < f64::from(thresholds.create_time);
            if !(near || soon) {
                break;
            }
            self.pending.pop_front();
            self.active.push_back(TimingLine { info: next, track_position: 0, y: self.target_y });
        }

        let speed = scroll_speed * self.direction.sign();
        for i in 0..self.active.len() {
            let track_position = current_position - self.active[i].info.track_offset;
            let y = self.target_y + self.transform(track_position as f32 * speed / TRACK_ROUNDING);
            let line = &mut self.active[i];
            line.track_position = track_position;
            line.y = y;
        }

        while self
            .active
            .front()
            .is_some_and(|l| l.track_position as f32 > thresholds.recycle_position)
        {
            self.active.pop_front();
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &TimingLine> {
        self.active.iter()
    }

    #[inline(always)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

use crate::game::note::HitObjectInfo;
use crate::game::timing::{CurveError, VelocityCurve, VelocitySegment};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("failed to read map: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse map: {0}")]
    Json(#[from] serde_json::Error),
    #[error("hit object at {start_time}ms is in lane {lane}, map has {key_count} lanes")]
    LaneOutOfRange { start_time: i32, lane: usize, key_count: usize },
    #[error("timing point at {start_time}ms has invalid bpm {bpm}")]
    InvalidBpm { start_time: f32, bpm: f32 },
    #[error("invalid scroll velocities: {0}")]
    Curve(#[from] CurveError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Keys4,
    Keys7,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    pub start_time: f32,
    pub bpm: f32,
}

/// Beats per timing line when lines are generated from timing points.
pub const BEATS_PER_MEASURE: f32 = 4.0;

/// Upper bound on generated lines for one timing point. A section that would
/// need more only gets a line at its start.
pub const MAX_TIMING_LINES_PER_SECTION: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapData {
    pub mode: GameMode,
    pub has_scratch_key: bool,
    pub initial_scroll_velocity: f32,
    pub slider_velocities: Vec<VelocitySegment>,
    pub hit_objects: Vec<HitObjectInfo>,
    pub timing_points: Vec<TimingPoint>,
    /// Explicit timing line times. Generated from `timing_points` when absent.
    pub timing_lines: Option<Vec<f32>>,
    pub local_offset: f32,
    pub online_offset: f32,
}

impl Default for MapData {
    fn default() -> Self {
        Self {
            mode: GameMode::Keys4,
            has_scratch_key: false,
            initial_scroll_velocity: 1.0,
            slider_velocities: Vec::new(),
            hit_objects: Vec::new(),
            timing_points: Vec::new(),
            timing_lines: None,
            local_offset: 0.0,
            online_offset: 0.0,
        }
    }
}

impl MapData {
    pub fn load(path: &Path) -> Result<Self, MapError> {
        let text = std::fs::read_to_string(path)?;
        let map = Self::from_json_str(&text)?;
        info!(
            "Loaded map '{}': {} objects, {} scroll velocities.",
            path.display(),
            map.hit_objects.len(),
            map.slider_velocities.len()
        );
        Ok(map)
    }

    /// Parses a map and sorts its objects by start time.
    pub fn from_json_str(text: &str) -> Result<Self, MapError> {
        let mut map: Self = serde_json::from_str(text)?;
        map.hit_objects.sort_by_key(|h| h.start_time);
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> Result<(), MapError> {
        let key_count = self.key_count();
        if let Some(bad) = self.hit_objects.iter().find(|h| h.lane == 0 || h.lane > key_count) {
            return Err(MapError::LaneOutOfRange {
                start_time: bad.start_time,
                lane: bad.lane,
                key_count,
            });
        }
        if let Some(bad) = self.timing_points.iter().find(|tp| !(tp.bpm.is_finite() && tp.bpm > 0.0)) {
            return Err(MapError::InvalidBpm { start_time: bad.start_time, bpm: bad.bpm });
        }
        Ok(())
    }

    #[inline(always)]
    pub fn key_count(&self) -> usize {
        let base = match self.mode {
            GameMode::Keys4 => 4,
            GameMode::Keys7 => 7,
        };
        base + usize::from(self.has_scratch_key)
    }

    /// Time of the last moment any object is still in play.
    pub fn length(&self) -> i32 {
        self.hit_objects.iter().map(HitObjectInfo::end_or_start).max().unwrap_or(0)
    }

    pub fn velocity_curve(&self, no_sv: bool) -> Result<VelocityCurve, CurveError> {
        VelocityCurve::new(self.initial_scroll_velocity, self.slider_velocities.clone(), no_sv)
    }

    /// Timing line times, one per measure of each timing point up to the map length.
    pub fn timing_line_times(&self) -> Vec<f32> {
        if let Some(lines) = &self.timing_lines {
            return lines.clone();
        }

        let end = self.length() as f32;
        let mut out = Vec::new();
        for (i, tp) in self.timing_points.iter().enumerate() {
            if !(tp.bpm.is_finite() && tp.bpm > 0.0) {
                continue;
            }
            let next = self.timing_points.get(i + 1).map(|tp| tp.start_time);
            let in_section = |t: f32| match next {
                Some(next) => t < next,
                None => t <= end,
            };
            let step = 60_000.0 / tp.bpm * BEATS_PER_MEASURE;
            let section_end = next.unwrap_or(end);
            let lines = ((section_end - tp.start_time) / step).floor() as f64 + 1.0;
            if lines > MAX_TIMING_LINES_PER_SECTION as f64 {
                warn!(
                    "Timing point at {}ms ({} bpm) would need {lines:.0} timing lines, keeping only its first.",
                    tp.start_time, tp.bpm
                );
                if in_section(tp.start_time) {
                    out.push(tp.start_time);
                }
                continue;
            }
            // One spare step absorbs rounding in the count; the section check ends the walk.
            for k in 0..=lines.max(0.0) as u32 {
                let t = tp.start_time + step * k as f32;
                if !in_section(t) {
                    break;
                }
                out.push(t);
            }
        }
        out
    }
}

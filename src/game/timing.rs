use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Fixed-point scale between milliseconds of scrolled time and track position units.
pub const TRACK_ROUNDING: f32 = 100.0;

/// Pseudo segment index for the initial scroll velocity (time before the first segment).
pub const INITIAL_VELOCITY_INDEX: isize = -1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocitySegment {
    /// Milliseconds into the audio at which this multiplier takes over.
    pub start_time: f32,
    pub multiplier: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Negative,
    Zero,
    Positive,
}

impl Sign {
    #[inline(always)]
    pub fn of(value: f32) -> Self {
        match value.partial_cmp(&0.0) {
            Some(Ordering::Greater) => Self::Positive,
            Some(Ordering::Less) => Self::Negative,
            _ => Self::Zero,
        }
    }

    #[inline(always)]
    pub const fn step(self) -> isize {
        match self {
            Self::Negative => -1,
            Self::Zero => 0,
            Self::Positive => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CurveError {
    #[error("initial scroll velocity is not finite: {0}")]
    NonFiniteInitialVelocity(f32),
    #[error("scroll velocity {index} has a non-finite multiplier: {value}")]
    NonFiniteMultiplier { index: usize, value: f32 },
    #[error("scroll velocity {index} has a non-finite start time: {value}")]
    NonFiniteStartTime { index: usize, value: f32 },
}

/// A point where the playfield's effective scroll direction flips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionChange {
    pub start_time: f32,
    pub position: i64,
}

/// Piecewise-linear time -> track position mapping built from scroll velocities.
///
/// Positions are integrated once into `markers`, so any lookup only needs the
/// marker of the segment in effect plus the local linear term.
#[derive(Debug, Clone)]
pub struct VelocityCurve {
    initial_velocity: f32,
    segments: Vec<VelocitySegment>,
    markers: Vec<i64>,
    no_sv: bool,
}

impl VelocityCurve {
    pub fn new(
        initial_velocity: f32,
        mut segments: Vec<VelocitySegment>,
        no_sv: bool,
    ) -> Result<Self, CurveError> {
        if !initial_velocity.is_finite() {
            return Err(CurveError::NonFiniteInitialVelocity(initial_velocity));
        }
        for (index, seg) in segments.iter().enumerate() {
            if !seg.start_time.is_finite() {
                return Err(CurveError::NonFiniteStartTime { index, value: seg.start_time });
            }
            if !seg.multiplier.is_finite() {
                return Err(CurveError::NonFiniteMultiplier { index, value: seg.multiplier });
            }
        }
        // Stable, so equal start times keep their authored order.
        segments.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let markers = compute_markers(initial_velocity, &segments);
        Ok(Self { initial_velocity, segments, markers, no_sv })
    }

    #[inline(always)]
    pub fn initial_velocity(&self) -> f32 {
        self.initial_velocity
    }

    #[inline(always)]
    pub fn segments(&self) -> &[VelocitySegment] {
        &self.segments
    }

    #[inline(always)]
    pub fn markers(&self) -> &[i64] {
        &self.markers
    }

    #[inline(always)]
    pub fn no_sv(&self) -> bool {
        self.no_sv
    }

    /// Number of segments that have started at `time`. This is the index hint
    /// accepted by [`Self::time_to_position_at`].
    #[inline(always)]
    pub fn index_for_time(&self, time: f64) -> usize {
        self.segments.partition_point(|seg| f64::from(seg.start_time) <= time)
    }

    /// Moves a forward-only index hint up to `time`.
    #[inline(always)]
    pub fn advance_index(&self, mut index: usize, time: f64) -> usize {
        while index < self.segments.len() && time >= f64::from(self.segments[index].start_time) {
            index += 1;
        }
        index
    }

    pub fn time_to_position(&self, time: f64) -> i64 {
        if self.no_sv {
            return (time * f64::from(TRACK_ROUNDING)) as i64;
        }
        self.time_to_position_at(time, self.index_for_time(time))
    }

    /// `index` is the count of segments with `start_time <= time`.
    pub fn time_to_position_at(&self, time: f64, index: usize) -> i64 {
        let rounding = f64::from(TRACK_ROUNDING);
        if self.no_sv {
            return (time * rounding) as i64;
        }
        if index == 0 {
            return (time * f64::from(self.initial_velocity) * rounding) as i64;
        }

        let i = index - 1;
        let seg = self.segments[i];
        let local = (time - f64::from(seg.start_time)) * f64::from(seg.multiplier) * rounding;
        self.markers[i] + local as i64
    }

    /// Sign of the segment at `index`, or of the initial velocity for `-1`.
    pub fn sign_at(&self, index: isize) -> Sign {
        if index < 0 {
            return Sign::of(self.initial_velocity);
        }
        Sign::of(self.segments[index as usize].multiplier)
    }

    /// Whether the last non-zero velocity in effect at `time` scrolls backwards.
    pub fn is_negative_at(&self, time: f64) -> bool {
        if self.no_sv {
            return false;
        }
        let index = self.index_for_time(time);
        match self.segments[..index].iter().rev().find(|seg| seg.multiplier != 0.0) {
            Some(seg) => seg.multiplier < 0.0,
            None => self.initial_velocity < 0.0,
        }
    }

    /// Direction flips of the playfield between `start_time` and `end_time`.
    ///
    /// Zero multipliers park the playfield and keep whichever direction was in
    /// effect before them, so they never produce a change on their own.
    pub fn direction_changes(&self, start_time: f64, end_time: f64) -> Vec<DirectionChange> {
        let mut changes = Vec::new();
        if self.no_sv {
            return changes;
        }

        let mut forward = !self.is_negative_at(start_time);
        let mut i = self.index_for_time(start_time);
        while i < self.segments.len() && end_time >= f64::from(self.segments[i].start_time) {
            let multiplier = self.segments[i].multiplier;
            i += 1;
            if multiplier == 0.0 || forward == (multiplier > 0.0) {
                continue;
            }
            forward = multiplier > 0.0;
            changes.push(DirectionChange {
                start_time: self.segments[i - 1].start_time,
                position: self.markers[i - 1],
            });
        }
        changes
    }
}

fn compute_markers(initial_velocity: f32, segments: &[VelocitySegment]) -> Vec<i64> {
    let rounding = f64::from(TRACK_ROUNDING);
    let mut markers = Vec::with_capacity(segments.len());
    let Some(first) = segments.first() else {
        return markers;
    };

    let mut position =
        (f64::from(first.start_time) * f64::from(initial_velocity) * rounding) as i64;
    markers.push(position);
    for pair in segments.windows(2) {
        let elapsed = f64::from(pair[1].start_time) - f64::from(pair[0].start_time);
        position += (elapsed * f64::from(pair[0].multiplier) * rounding) as i64;
        markers.push(position);
    }
    markers
}

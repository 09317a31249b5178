use crate::game::timing::{
    INITIAL_VELOCITY_INDEX, Sign, TRACK_ROUNDING, VelocityCurve, VelocitySegment,
};
use log::debug;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Segment indices registered in one bucket. `-1` is the initial velocity.
pub type BucketMembers = SmallVec<[isize; 4]>;

/// Every time that scrolls through a given track position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionTimes {
    pub exact: Vec<f32>,
    /// Spans where the playfield is parked on the position (0x velocity).
    pub intervals: Vec<(f32, f32)>,
}

/// Inverse index over a [`VelocityCurve`].
///
/// The position axis is split into buckets at every point where the scroll
/// direction flips. Inside one bucket each registered segment is monotonic,
/// so a position inverts to at most one time per segment. Zero-velocity
/// segments do not belong to any bucket; they are kept as whole time spans
/// keyed by the position they park on.
#[derive(Debug, Clone)]
pub struct VelocityBucketIndex {
    initial_velocity: f32,
    segments: Vec<VelocitySegment>,
    markers: Vec<i64>,
    boundaries: Vec<i64>,
    buckets: Vec<BucketMembers>,
    const_intervals: FxHashMap<i64, Vec<(f32, f32)>>,
}

impl VelocityBucketIndex {
    pub fn build(curve: &VelocityCurve) -> Self {
        // With velocity disabled the track is a plain 1x line.
        let (initial_velocity, segments, markers) = if curve.no_sv() {
            (1.0, Vec::new(), Vec::new())
        } else {
            (curve.initial_velocity(), curve.segments().to_vec(), curve.markers().to_vec())
        };

        let mut index = Self {
            initial_velocity,
            segments,
            markers,
            boundaries: Vec::new(),
            buckets: Vec::new(),
            const_intervals: FxHashMap::default(),
        };
        index.collect_boundaries();
        index.populate_buckets();
        index
    }

    fn add_const_interval(&mut self, position: i64, interval: (f32, f32)) {
        self.const_intervals.entry(position).or_default().push(interval);
        debug!("Added const position interval: {position}, {interval:?}");
    }

    fn collect_boundaries(&mut self) {
        let mut prev = Sign::of(self.initial_velocity);
        match prev {
            Sign::Zero => {
                let position = self.markers.first().copied().unwrap_or(0);
                let end = self.segments.first().map_or(f32::INFINITY, |s| s.start_time);
                self.add_const_interval(position, (f32::NEG_INFINITY, end));
            }
            Sign::Positive => self.boundaries.push(i64::MIN),
            Sign::Negative => self.boundaries.push(i64::MAX),
        }

        for i in 0..self.segments.len() {
            let sign = Sign::of(self.segments[i].multiplier);
            if sign == Sign::Zero {
                let start = self.segments[i].start_time;
                let end = self.segments.get(i + 1).map_or(f32::INFINITY, |s| s.start_time);
                self.add_const_interval(self.markers[i], (start, end));
                continue;
            }
            if sign != prev {
                self.boundaries.push(self.markers[i]);
                prev = sign;
                debug!("Added bucket at {}", self.markers[i]);
            }
        }

        // Guarantee coverage of the whole axis so every lookup lands in a bucket.
        self.boundaries.push(i64::MIN);
        self.boundaries.sort_unstable();
        self.boundaries.dedup();
        self.buckets = vec![BucketMembers::new(); self.boundaries.len()];
    }

    /// Unsorted `(entry, exit)` positions of a segment's run, using `i64` sentinels
    /// for the open ends before the first and after the last segment.
    fn segment_span(&self, i: isize) -> (i64, i64) {
        let sentinel = |sign: Sign, at_start: bool, fallback: i64| match (sign, at_start) {
            (Sign::Positive, true) | (Sign::Negative, false) => i64::MIN,
            (Sign::Negative, true) | (Sign::Positive, false) => i64::MAX,
            (Sign::Zero, _) => fallback,
        };

        let entry = if i == INITIAL_VELOCITY_INDEX {
            let fallback = self.markers.first().copied().unwrap_or(0);
            sentinel(Sign::of(self.initial_velocity), true, fallback)
        } else {
            self.markers[i as usize]
        };

        let next = (i + 1) as usize;
        let exit = if next < self.markers.len() {
            self.markers[next]
        } else {
            let multiplier = if i == INITIAL_VELOCITY_INDEX {
                self.initial_velocity
            } else {
                self.segments[i as usize].multiplier
            };
            let fallback = if i == INITIAL_VELOCITY_INDEX { 0 } else { self.markers[i as usize] };
            sentinel(Sign::of(multiplier), false, fallback)
        };
        (entry, exit)
    }

    #[inline(always)]
    fn bucket_end(&self, j: usize) -> i64 {
        self.boundaries.get(j + 1).copied().unwrap_or(i64::MAX)
    }

    fn populate_buckets(&mut self) {
        for i in INITIAL_VELOCITY_INDEX..self.segments.len() as isize {
            let (entry, exit) = self.segment_span(i);
            // Zero velocity, or a segment with no duration.
            if entry == exit {
                continue;
            }
            let (low, high) = if entry < exit { (entry, exit) } else { (exit, entry) };

            // Walk from the entry point in the direction of travel. A forward run
            // covers [low, high) and a backward run covers (low, high], so a peak or
            // trough belongs to the segment that leaves it.
            let direction = self.sign_of(i);
            let first = if direction == Sign::Positive { low } else { high };
            let mut j = self.find_bucket(first) as isize;
            while j >= 0 && (j as usize) < self.boundaries.len() {
                let ju = j as usize;
                let start = self.boundaries[ju];
                let end = self.bucket_end(ju);
                let disjoint = match direction {
                    Sign::Positive => high <= start || low >= end,
                    _ => high < start || low.saturating_add(1) >= end,
                };
                if disjoint {
                    break;
                }
                self.buckets[ju].push(i);
                j += direction.step();
            }
        }
    }

    #[inline(always)]
    fn sign_of(&self, i: isize) -> Sign {
        if i == INITIAL_VELOCITY_INDEX {
            Sign::of(self.initial_velocity)
        } else {
            Sign::of(self.segments[i as usize].multiplier)
        }
    }

    /// Sorted bucket start positions. The first is always `i64::MIN`.
    #[inline(always)]
    pub fn bucket_positions(&self) -> &[i64] {
        &self.boundaries
    }

    #[inline(always)]
    pub fn bucket(&self, j: usize) -> &[isize] {
        &self.buckets[j]
    }

    #[inline(always)]
    pub fn const_intervals(&self) -> &FxHashMap<i64, Vec<(f32, f32)>> {
        &self.const_intervals
    }

    /// Index of the bucket whose `[start, end)` range holds `position`.
    pub fn find_bucket(&self, position: i64) -> usize {
        let count = self.boundaries.partition_point(|&start| start <= position);
        assert!(count > 0, "no velocity bucket covers track position {position}");
        count - 1
    }

    /// Time range `[start, end)` during which segment `i` is in effect.
    fn time_span(&self, i: isize) -> (f32, f32) {
        let end_of = |next: usize| self.segments.get(next).map_or(f32::INFINITY, |s| s.start_time);
        if i == INITIAL_VELOCITY_INDEX {
            (f32::NEG_INFINITY, end_of(0))
        } else {
            (self.segments[i as usize].start_time, end_of(i as usize + 1))
        }
    }

    /// Every time at which the track sits at `position`.
    ///
    /// The curve is not a function of position, so several exact times can come
    /// back, one per registered segment that actually reaches the position.
    pub fn position_to_times(&self, position: i64) -> PositionTimes {
        let rounding = TRACK_ROUNDING as f64;
        let bucket = &self.buckets[self.find_bucket(position)];
        debug!("{} SVs in bucket", bucket.len());

        let mut exact = Vec::with_capacity(bucket.len());
        for &i in bucket {
            let time = if i == INITIAL_VELOCITY_INDEX {
                let velocity = f64::from(self.initial_velocity);
                match (self.segments.first(), self.markers.first()) {
                    (Some(first), Some(&marker)) if first.start_time < 0.0 => {
                        (position - marker) as f64 / velocity / rounding
                            + f64::from(first.start_time)
                    }
                    _ => position as f64 / velocity / rounding,
                }
            } else {
                let seg = self.segments[i as usize];
                let delta = (position - self.markers[i as usize]) as f64;
                f64::from(seg.start_time) + delta / rounding / f64::from(seg.multiplier)
            };

            let (start, end) = self.time_span(i);
            let time = time as f32;
            if time >= start && time < end {
                exact.push(time);
            }
        }

        let intervals = self.const_intervals.get(&position).cloned().unwrap_or_default();
        PositionTimes { exact, intervals }
    }
}

use crate::game::timing::{TRACK_ROUNDING, VelocityCurve};
use serde::{Deserialize, Serialize};

/// A note as authored in the map. Lanes are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HitObjectInfo {
    pub start_time: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i32>,
    pub lane: usize,
}

impl HitObjectInfo {
    #[inline(always)]
    pub fn tap(lane: usize, start_time: i32) -> Self {
        Self { start_time, end_time: None, lane }
    }

    #[inline(always)]
    pub fn long_note(lane: usize, start_time: i32, end_time: i32) -> Self {
        Self { start_time, end_time: Some(end_time), lane }
    }

    #[inline(always)]
    pub fn is_long_note(&self) -> bool {
        self.end_time.is_some_and(|end| end > self.start_time)
    }

    /// End time for long notes, start time otherwise.
    #[inline(always)]
    pub fn end_or_start(&self) -> i32 {
        match self.end_time {
            Some(end) if end > self.start_time => end,
            _ => self.start_time,
        }
    }

    #[inline(always)]
    pub const fn lane_index(&self) -> usize {
        self.lane - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoteState {
    Active,
    Held,
    Dead,
}

/// Render/scoring state of one pooled slot. The slot outlives the notes it
/// shows: recycling rebinds it to the next pending note in the lane.
#[derive(Debug, Clone)]
pub struct PooledNote {
    pub info: HitObjectInfo,
    pub state: NoteState,
    pub initial_track_position: i64,
    pub end_track_position: i64,
    /// Furthest position this note covers, including reversals inside a long note.
    pub latest_track_position: i64,
    pub currently_being_held: bool,
    /// Distance from the receptor, in playfield units, of the head and the tail.
    pub head_offset: f32,
    pub tail_offset: f32,
    /// How many notes this slot has shown, counting the current one.
    pub uses: u32,
}

impl PooledNote {
    pub fn new(info: HitObjectInfo, curve: &VelocityCurve) -> Self {
        let mut note = Self {
            info,
            state: NoteState::Active,
            initial_track_position: 0,
            end_track_position: 0,
            latest_track_position: 0,
            currently_being_held: false,
            head_offset: 0.0,
            tail_offset: 0.0,
            uses: 0,
        };
        note.bind(info, curve);
        note
    }

    /// Points this slot at `info`, keeping the slot's identity.
    pub fn bind(&mut self, info: HitObjectInfo, curve: &VelocityCurve) {
        self.info = info;
        self.state = NoteState::Active;
        self.currently_being_held = false;
        self.uses += 1;

        let start = f64::from(info.start_time);
        let end = f64::from(info.end_or_start());
        self.initial_track_position = curve.time_to_position(start);
        self.end_track_position = curve.time_to_position(end);
        self.refresh_latest(curve);
    }

    fn refresh_latest(&mut self, curve: &VelocityCurve) {
        let mut latest = self.initial_track_position.max(self.end_track_position);
        if self.info.is_long_note() {
            let start = f64::from(self.info.start_time);
            let end = f64::from(self.info.end_or_start());
            for change in curve.direction_changes(start, end) {
                latest = latest.max(change.position);
            }
        }
        self.latest_track_position = latest;
    }

    /// Marks a released long note as dead with its head cut at `head_position`.
    pub fn cut_head(&mut self, head_position: i64) {
        self.initial_track_position = head_position;
        self.currently_being_held = false;
        self.latest_track_position = self.latest_track_position.max(head_position);
    }

    pub fn update_offsets(&mut self, current_track_position: i64, scroll_speed: f32) {
        let to_units = |position: i64| {
            (position - current_track_position) as f32 * scroll_speed / TRACK_ROUNDING
        };
        // A held head stays on the receptor while the body drains into it.
        self.head_offset = if self.currently_being_held {
            0.0
        } else {
            to_units(self.initial_track_position)
        };
        self.tail_offset = if self.info.is_long_note() {
            to_units(self.end_track_position)
        } else {
            self.head_offset
        };
    }
}

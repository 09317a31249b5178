use serde::{Deserialize, Serialize};

/// A discrete press or release on one lane. Lanes are 0-based here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputEdge {
    pub lane: usize,
    pub pressed: bool,
    /// Song time of the edge in milliseconds, before offsets.
    pub time_ms: f64,
}

impl InputEdge {
    #[inline(always)]
    pub const fn press(lane: usize, time_ms: f64) -> Self {
        Self { lane, pressed: true, time_ms }
    }

    #[inline(always)]
    pub const fn release(lane: usize, time_ms: f64) -> Self {
        Self { lane, pressed: false, time_ms }
    }
}

/// Where judgements come from. Resolved once when a play starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Live,
    /// Judgements are recorded as events but never fed to the score processor.
    Replay,
}

impl InputMode {
    #[inline(always)]
    pub const fn updates_score(self) -> bool {
        matches!(self, Self::Live)
    }
}

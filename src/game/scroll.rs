use crate::core::audio::effective_rate;
use crate::game::timing::TRACK_ROUNDING;

/// Distance budget, in track units at 1.0 scroll speed, for keeping notes pooled.
pub const OBJECT_POSITION_MAGNITUDE: f32 = 300_000.0;

pub const PREVIEW_PLAYFIELD_WIDTH: f32 = 424.0;
pub const PREVIEW_SCALING: f32 = (1920.0 - PREVIEW_PLAYFIELD_WIDTH) / 1366.0;

/// Where the playfield is drawn. Picked once when a play is set up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayfieldMode {
    Gameplay { skin_scaling: f32 },
    Preview,
}

impl Default for PlayfieldMode {
    fn default() -> Self {
        Self::Gameplay { skin_scaling: 1.0 }
    }
}

impl PlayfieldMode {
    #[inline(always)]
    pub const fn scaling(self) -> f32 {
        match self {
            Self::Gameplay { skin_scaling } => skin_scaling,
            Self::Preview => PREVIEW_SCALING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSettings {
    /// Configured speed, as stored in the config file.
    pub speed: u32,
    pub mode: PlayfieldMode,
    pub base_to_virtual: f32,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self { speed: 150, mode: PlayfieldMode::default(), base_to_virtual: 1.0 }
    }
}

impl ScrollSettings {
    /// Playfield units per track unit at `rate`.
    #[inline(always)]
    pub fn scroll_speed(&self, rate: f32) -> f32 {
        (self.speed as f32 / 10.0) / (20.0 * effective_rate(rate))
            * self.mode.scaling()
            * self.base_to_virtual
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolingThresholds {
    pub create_position: f32,
    pub recycle_position: f32,
    /// Lead time in milliseconds.
    pub create_time: f32,
}

impl PoolingThresholds {
    pub fn for_scroll_speed(scroll_speed: f32) -> Self {
        let position = OBJECT_POSITION_MAGNITUDE / scroll_speed;
        Self {
            create_position: position,
            recycle_position: position,
            create_time: position / TRACK_ROUNDING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_speed_at_normal_rate() {
        let s = ScrollSettings::default();
        assert_eq!(s.scroll_speed(1.0), 0.75);
        assert_eq!(s.scroll_speed(1.5), 0.5);
        assert_eq!(s.scroll_speed(f32::NAN), 0.75, "bad rates read as 1.0");
    }

    #[test]
    fn preview_uses_fixed_scaling() {
        let s = ScrollSettings { mode: PlayfieldMode::Preview, ..ScrollSettings::default() };
        assert!((s.scroll_speed(1.0) - 0.75 * PREVIEW_SCALING).abs() < 1e-6);
    }

    #[test]
    fn thresholds_shrink_as_speed_grows() {
        let t = PoolingThresholds::for_scroll_speed(0.75);
        assert_eq!(t.create_position, 400_000.0);
        assert_eq!(t.create_time, 4000.0);
        let faster = PoolingThresholds::for_scroll_speed(1.5);
        assert_eq!(faster.recycle_position, 200_000.0);
    }
}

// Judgement windows shared by miss detection, input judging and result stats.

use crate::game::judgment::Judgement;
use serde::Serialize;
use std::str::FromStr;

// All windows are in milliseconds, indexed by `Judgement as usize`.
pub const STANDARD_WINDOWS_MS: [f32; 6] = [18.0, 43.0, 76.0, 106.0, 127.0, 164.0];
pub const STRICT_WINDOWS_MS: [f32; 6] = [16.0, 40.0, 73.0, 103.0, 127.0, 164.0];

pub const RELEASE_MULTIPLIER: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum JudgementPreset {
    #[default]
    Standard,
    Strict,
}

impl JudgementPreset {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Strict => "Strict",
        }
    }
}

impl FromStr for JudgementPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            other => Err(format!("'{other}' is not a valid JudgementPreset")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingWindows {
    pub windows_ms: [f32; 6],
    pub release_multipliers: [f32; 6],
}

impl Default for TimingWindows {
    fn default() -> Self {
        Self::standard()
    }
}

impl TimingWindows {
    pub const fn standard() -> Self {
        Self { windows_ms: STANDARD_WINDOWS_MS, release_multipliers: [RELEASE_MULTIPLIER; 6] }
    }

    pub const fn strict() -> Self {
        Self { windows_ms: STRICT_WINDOWS_MS, release_multipliers: [RELEASE_MULTIPLIER; 6] }
    }

    pub const fn from_preset(preset: JudgementPreset) -> Self {
        match preset {
            JudgementPreset::Standard => Self::standard(),
            JudgementPreset::Strict => Self::strict(),
        }
    }

    #[inline(always)]
    pub fn window(&self, judgement: Judgement) -> f32 {
        self.windows_ms[judgement as usize]
    }

    #[inline(always)]
    pub fn release_window(&self, judgement: Judgement) -> f32 {
        self.windows_ms[judgement as usize] * self.release_multipliers[judgement as usize]
    }

    /// Last window that still counts as a hit. Heads older than this are missed.
    #[inline(always)]
    pub fn okay(&self) -> f32 {
        self.window(Judgement::Okay)
    }

    /// Widest window a press is judged in at all.
    #[inline(always)]
    pub fn widest(&self) -> f32 {
        self.window(Judgement::Miss)
    }

    /// Judgement for a press `offset_ms` away from the note, or `None` when the
    /// press is outside every window and should be ignored.
    pub fn classify(&self, offset_ms: f32) -> Option<Judgement> {
        let abs = offset_ms.abs();
        Judgement::ALL.into_iter().find(|&j| abs <= self.window(j))
    }

    /// Judgement for a release `offset_ms` away from the tail. Releases never
    /// land in the miss window: `None` means the release was too far off.
    pub fn classify_release(&self, offset_ms: f32) -> Option<Judgement> {
        let abs = offset_ms.abs();
        Judgement::ALL
            .into_iter()
            .filter(|&j| j != Judgement::Miss)
            .find(|&j| abs <= self.release_window(j))
    }
}

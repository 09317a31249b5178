use crate::game::life;
use crate::game::note::HitObjectInfo;
use crate::game::timing_windows::TimingWindows;
use serde::Serialize;

/// Judgement kinds, best first. `Ord` follows that order, so `Miss` is the maximum.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Judgement {
    Marv,
    Perf,
    Great,
    Good,
    Okay,
    Miss,
}

impl Judgement {
    pub const ALL: [Self; 6] =
        [Self::Marv, Self::Perf, Self::Great, Self::Good, Self::Okay, Self::Miss];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Marv => "Marvelous",
            Self::Perf => "Perfect",
            Self::Great => "Great",
            Self::Good => "Good",
            Self::Okay => "Okay",
            Self::Miss => "Miss",
        }
    }

    #[inline(always)]
    pub const fn accuracy_weight(self) -> f32 {
        match self {
            Self::Marv => 100.0,
            Self::Perf => 98.25,
            Self::Great => 65.0,
            Self::Good => 25.0,
            Self::Okay => -100.0,
            Self::Miss => -50.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum HitStatKind {
    Hit,
    Miss,
}

/// Offset recorded on events that have no real hit timing.
pub const MISS_OFFSET: i32 = i32::MIN;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JudgementEvent {
    pub hit_object: HitObjectInfo,
    /// Song time the judgement refers to: the head for presses, the tail for releases.
    pub time: i32,
    pub judgement: Judgement,
    pub kind: HitStatKind,
    pub offset: i32,
    pub is_release: bool,
    pub accuracy: f32,
    pub health: f32,
}

impl JudgementEvent {
    #[inline(always)]
    pub fn has_offset(&self) -> bool {
        self.offset != MISS_OFFSET
    }
}

/// Running score state fed by the hit object manager and the input path.
#[derive(Clone, Debug)]
pub struct ScoreProcessor {
    pub windows: TimingWindows,
    counts: [u32; 6],
    combo: u32,
    max_combo: u32,
    health: f32,
    failed: bool,
    weighted_sum: f32,
}

impl ScoreProcessor {
    pub fn new(windows: TimingWindows) -> Self {
        Self {
            windows,
            counts: [0; 6],
            combo: 0,
            max_combo: 0,
            health: life::MAX_HEALTH,
            failed: false,
            weighted_sum: 0.0,
        }
    }

    /// Applies one judgement. Release registrations move accuracy and health
    /// the same way but never flag a fail by themselves.
    pub fn register(&mut self, judgement: Judgement, is_release: bool) {
        self.counts[judgement as usize] += 1;
        self.weighted_sum += judgement.accuracy_weight();

        if judgement == Judgement::Miss {
            self.combo = 0;
        } else {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }

        self.health = life::apply(self.health, judgement);
        if !is_release && self.health <= 0.0 {
            self.failed = true;
        }
    }

    #[inline(always)]
    pub fn total_judged(&self) -> u32 {
        self.counts.iter().sum()
    }

    #[inline(always)]
    pub fn count(&self, judgement: Judgement) -> u32 {
        self.counts[judgement as usize]
    }

    /// Weighted accuracy in percent, 100 before anything was judged.
    pub fn accuracy(&self) -> f32 {
        let total = self.total_judged();
        if total == 0 {
            return 100.0;
        }
        (self.weighted_sum / total as f32).max(0.0)
    }

    #[inline(always)]
    pub fn combo(&self) -> u32 {
        self.combo
    }

    #[inline(always)]
    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    #[inline(always)]
    pub fn health(&self) -> f32 {
        self.health
    }

    #[inline(always)]
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Builds an event carrying the current score snapshot. Callers build it
    /// before registering, so the snapshot excludes the judgement itself.
    pub fn event(
        &self,
        hit_object: HitObjectInfo,
        time: i32,
        judgement: Judgement,
        offset: Option<i32>,
        is_release: bool,
    ) -> JudgementEvent {
        JudgementEvent {
            hit_object,
            time,
            judgement,
            kind: if offset.is_some() { HitStatKind::Hit } else { HitStatKind::Miss },
            offset: offset.unwrap_or(MISS_OFFSET),
            is_release,
            accuracy: self.accuracy(),
            health: self.health,
        }
    }
}

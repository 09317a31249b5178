use crate::game::judgment::Judgement;

pub const MAX_HEALTH: f32 = 100.0;

pub const HEALTH_MARV: f32 = 0.5;
pub const HEALTH_PERF: f32 = 0.4;
pub const HEALTH_GREAT: f32 = 0.2;
pub const HEALTH_GOOD: f32 = 0.0;
pub const HEALTH_OKAY: f32 = -3.0;
pub const HEALTH_MISS: f32 = -4.5;

#[inline(always)]
pub const fn health_delta(judgement: Judgement) -> f32 {
    match judgement {
        Judgement::Marv => HEALTH_MARV,
        Judgement::Perf => HEALTH_PERF,
        Judgement::Great => HEALTH_GREAT,
        Judgement::Good => HEALTH_GOOD,
        Judgement::Okay => HEALTH_OKAY,
        Judgement::Miss => HEALTH_MISS,
    }
}

#[inline(always)]
pub fn apply(health: f32, judgement: Judgement) -> f32 {
    (health + health_delta(judgement)).clamp(0.0, MAX_HEALTH)
}

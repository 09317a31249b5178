use crate::config::{self, Config, ConfigChanges, ConfigSubscription, Mods};
use crate::core::audio::{AudioClock, effective_rate};
use crate::core::input::{InputEdge, InputMode};
use crate::game::chart::{MapData, MapError};
use crate::game::hit_objects::{HitObjectManager, PlaySettings};
use crate::game::judgment::{Judgement, JudgementEvent};
use crate::game::scroll::PlayfieldMode;
use crate::game::timing_lines::{ScrollDirection, TimingLineFeed};
use crate::game::timing_stats::{self, TimingStats};
use log::{debug, info};

/// Receptor height, in playfield units, timing lines are placed against.
pub const RECEPTOR_Y: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayOptions {
    pub mode: PlayfieldMode,
    /// Added on top of the mods implied by the config.
    pub mods: Mods,
    pub input_mode: InputMode,
    pub direction: ScrollDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    Playing,
    Failed,
    Complete,
}

pub struct State {
    pub manager: HitObjectManager,
    pub timing_lines: TimingLineFeed,
    pub autoplay: bool,
    /// Every judgement of the play so far, in the order it was made.
    pub judgements: Vec<JudgementEvent>,
    line_subscription: Option<ConfigSubscription>,
    log_timer: f32,
    ended: bool,
}

pub fn init(map: &MapData, cfg: &Config, options: PlayOptions) -> Result<State, MapError> {
    info!("Initializing gameplay...");
    let key_count = map.key_count();
    let mut settings = PlaySettings::from_config(cfg, key_count, options.mode);
    settings.mods |= options.mods;
    settings.input_mode = options.input_mode;

    let manager = HitObjectManager::new(map, settings)?;
    let timing_lines = TimingLineFeed::new(
        &map.timing_line_times(),
        manager.curve(),
        cfg.peak_height(key_count),
        options.direction,
        RECEPTOR_Y,
    );
    let autoplay = settings.mods.contains(Mods::AUTOPLAY);
    if autoplay {
        info!("Autoplay enabled, live input is ignored.");
    }

    Ok(State {
        manager,
        timing_lines,
        autoplay,
        judgements: Vec::new(),
        line_subscription: None,
        log_timer: 0.0,
        ended: false,
    })
}

/// Subscribes the play to the global config so mid-play option changes apply.
pub fn subscribe_to_config(state: &mut State) {
    let hub = config::hub();
    state.manager.attach(hub.subscribe());
    state.line_subscription = Some(hub.subscribe());
}

pub fn update(state: &mut State, clock: &impl AudioClock, delta_ms: f32) -> PlayStatus {
    if state.autoplay {
        let audio = state.manager.audio_time_for(clock.time_ms(), effective_rate(clock.rate()));
        autoplay_to(state, audio);
    }
    state.manager.update(clock);

    if let Some(changes) = state.line_subscription.as_ref().map(ConfigSubscription::take)
        && changes.contains(ConfigChanges::PEAK_HEIGHT)
    {
        let peak = config::get().peak_height(state.manager.key_count());
        state.timing_lines.set_peak_height(peak);
        debug!("Timing line peak height set to {peak}%.");
    }
    update_timing_lines(state);

    state.judgements.extend(state.manager.drain_events());

    state.log_timer += delta_ms / 1000.0;
    if state.log_timer >= 1.0 {
        let score = state.manager.score();
        info!(
            "Time: {:.0}ms, Position: {}, Combo: {}, Accuracy: {:.2}%, Health: {:.1}, Pooled: {}",
            state.manager.current_audio_position(),
            state.manager.current_track_position(),
            score.combo(),
            score.accuracy(),
            score.health(),
            state.manager.pool().arena().live()
        );
        state.log_timer -= 1.0;
    }

    let status = if state.manager.score().failed() {
        PlayStatus::Failed
    } else if state.manager.is_complete() {
        PlayStatus::Complete
    } else {
        PlayStatus::Playing
    };
    if status != PlayStatus::Playing && !state.ended {
        state.ended = true;
        let score = state.manager.score();
        info!(
            "Play {} at {:.0}ms: {} judged, accuracy {:.2}%, max combo {}.",
            if status == PlayStatus::Failed { "failed" } else { "complete" },
            state.manager.current_audio_position(),
            score.total_judged(),
            score.accuracy(),
            score.max_combo()
        );
    }
    status
}

fn update_timing_lines(state: &mut State) {
    let m = &state.manager;
    state.timing_lines.update(
        m.current_track_position(),
        m.current_audio_position(),
        m.scroll_speed(),
        &m.thresholds(),
    );
}

/// Hits every head and tail due by `audio` exactly on time.
fn autoplay_to(state: &mut State, audio: f64) {
    let m = &mut state.manager;
    for lane in 0..m.key_count() {
        loop {
            if let Some(id) = m.closest_release(lane) {
                let end = m.pool().note(id).info.end_or_start();
                if f64::from(end) > audio {
                    break;
                }
                m.release(lane, f64::from(end));
                continue;
            }
            let Some(id) = m.closest_tap(lane) else {
                break;
            };
            let start = m.pool().note(id).info.start_time;
            if f64::from(start) > audio {
                break;
            }
            m.press(lane, f64::from(start));
        }
    }
}

/// Judges one lane edge. Returns the judgement it produced, if any.
pub fn handle_input(state: &mut State, edge: &InputEdge) -> Option<Judgement> {
    if state.autoplay {
        return None;
    }
    if edge.lane >= state.manager.key_count() {
        debug!("Ignoring input on lane {} of {}.", edge.lane, state.manager.key_count());
        return None;
    }
    let audio = state.manager.audio_time_for(edge.time_ms, state.manager.rate());
    let judgement = if edge.pressed {
        state.manager.press(edge.lane, audio)
    } else {
        state.manager.release(edge.lane, audio)
    };
    state.judgements.extend(state.manager.drain_events());
    judgement
}

/// Seeks the play to the clock's position, dropping everything already behind it.
pub fn skip_to(state: &mut State, clock: &impl AudioClock) {
    state.manager.handle_skip(clock);
    state.timing_lines.initialize_pool(state.manager.current_audio_position());
    update_timing_lines(state);
    state.judgements.extend(state.manager.drain_events());
}

pub fn timing_stats(state: &State) -> TimingStats {
    timing_stats::compute_timing_stats(&state.judgements)
}

/// Hit offsets of the play so far in 1ms bins.
pub fn timing_histogram(state: &State) -> Vec<(i32, u32)> {
    timing_stats::build_histogram_ms(&state.judgements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::ManualClock;
    use crate::game::note::HitObjectInfo;

    fn sample_map() -> MapData {
        MapData {
            hit_objects: vec![
                HitObjectInfo::tap(1, 1000),
                HitObjectInfo::long_note(2, 1200, 1800),
                HitObjectInfo::tap(4, 1500),
            ],
            timing_lines: Some(vec![0.0, 1000.0, 2000.0]),
            ..MapData::default()
        }
    }

    #[test]
    fn autoplay_judges_everything_marvelous() {
        let options = PlayOptions { mods: Mods::AUTOPLAY, ..PlayOptions::default() };
        let mut state = init(&sample_map(), &Config::default(), options).unwrap();
        let mut clock = ManualClock::new(0.0);
        let mut status = PlayStatus::Playing;
        while clock.time_ms() < 5000.0 && status == PlayStatus::Playing {
            clock.advance(16.0);
            status = update(&mut state, &clock, 16.0);
        }
        assert_eq!(status, PlayStatus::Complete);
        assert_eq!(state.judgements.len(), 4, "three heads and one tail");
        assert!(state.judgements.iter().all(|e| e.judgement == Judgement::Marv));
        assert_eq!(timing_stats(&state).mean_abs_ms, 0.0);
    }

    #[test]
    fn autoplay_ignores_live_input() {
        let options = PlayOptions { mods: Mods::AUTOPLAY, ..PlayOptions::default() };
        let mut state = init(&sample_map(), &Config::default(), options).unwrap();
        assert_eq!(handle_input(&mut state, &InputEdge::press(0, 1000.0)), None);
    }

    #[test]
    fn input_edges_are_judged_per_lane() {
        let mut state = init(&sample_map(), &Config::default(), PlayOptions::default()).unwrap();
        update(&mut state, &ManualClock::new(990.0), 16.0);
        assert_eq!(handle_input(&mut state, &InputEdge::press(0, 1030.0)), Some(Judgement::Perf));
        assert_eq!(handle_input(&mut state, &InputEdge::press(9, 1030.0)), None);
        assert_eq!(handle_input(&mut state, &InputEdge::press(1, 1200.0)), Some(Judgement::Marv));
        assert_eq!(handle_input(&mut state, &InputEdge::release(1, 1790.0)), Some(Judgement::Marv));
        assert_eq!(state.judgements.len(), 3);
        assert_eq!(timing_histogram(&state), vec![(-30, 1), (0, 1), (10, 1)]);
    }

    #[test]
    fn skip_rebuilds_timing_lines() {
        let mut state = init(&sample_map(), &Config::default(), PlayOptions::default()).unwrap();
        skip_to(&mut state, &ManualClock::new(1300.0));
        assert!(state.judgements.is_empty(), "skipped notes are never judged");
        assert!(state.timing_lines.active().all(|l| l.info.start_time >= 1300.0));
        assert_eq!(state.timing_lines.active().count(), 1);
        assert_eq!(state.manager.pool().note_count(), 2, "the tap at 1000ms is gone");
    }
}

use crate::config::{Config, ConfigChanges, ConfigSubscription, Mods};
use crate::core::audio::{AudioClock, START_DELAY_MS, effective_rate};
use crate::core::input::InputMode;
use crate::game::chart::{MapData, MapError};
use crate::game::judgment::{Judgement, JudgementEvent, ScoreProcessor};
use crate::game::note::{HitObjectInfo, NoteState};
use crate::game::pool::{INITIAL_POOL_SIZE_PER_LANE, LaneObjectPool, RecycleOutcome, SlotId};
use crate::game::scroll::{PlayfieldMode, PoolingThresholds, ScrollSettings};
use crate::game::timing::{DirectionChange, VelocityCurve};
use crate::game::timing_windows::TimingWindows;
use crate::game::velocity_buckets::{PositionTimes, VelocityBucketIndex};
use log::{debug, info};

/// Extra gap on top of the start delay before the next note counts as a break.
pub const BREAK_LEAD_MS: f64 = 5000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaySettings {
    pub scroll: ScrollSettings,
    pub windows: TimingWindows,
    pub mods: Mods,
    pub global_audio_offset_ms: f32,
    pub visual_offset_ms: f32,
    pub input_mode: InputMode,
}

impl Default for PlaySettings {
    fn default() -> Self {
        Self::from_config(&Config::default(), 4, PlayfieldMode::default())
    }
}

impl PlaySettings {
    pub fn from_config(cfg: &Config, key_count: usize, mode: PlayfieldMode) -> Self {
        Self {
            scroll: ScrollSettings {
                speed: cfg.scroll_speed(key_count),
                mode,
                base_to_virtual: 1.0,
            },
            windows: TimingWindows::from_preset(cfg.judgement_preset),
            mods: cfg.mods(),
            global_audio_offset_ms: cfg.global_audio_offset_ms,
            visual_offset_ms: cfg.visual_offset_ms,
            input_mode: InputMode::Live,
        }
    }
}

/// What a renderer needs to draw one pooled note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteView {
    pub slot: SlotId,
    pub info: HitObjectInfo,
    pub state: NoteState,
    pub head_offset: f32,
    pub tail_offset: f32,
}

/// Drives the per-lane note pool from the audio clock: promotes pending notes,
/// misses what was not hit in time, recycles what scrolled away, and places
/// everything still pooled relative to the receptors.
#[derive(Debug)]
pub struct HitObjectManager {
    key_count: usize,
    map_length: i32,
    local_offset_ms: f32,
    online_offset_ms: f32,
    all_objects: Vec<HitObjectInfo>,
    curve: VelocityCurve,
    buckets: VelocityBucketIndex,
    pool: LaneObjectPool,
    settings: PlaySettings,
    scroll_speed: f32,
    thresholds: PoolingThresholds,
    last_rate: f32,
    current_sv_index: usize,
    current_audio_position: f64,
    current_visual_position: f64,
    current_track_position: i64,
    score: ScoreProcessor,
    events: Vec<JudgementEvent>,
    subscription: Option<ConfigSubscription>,
}

impl HitObjectManager {
    pub fn new(map: &MapData, settings: PlaySettings) -> Result<Self, MapError> {
        map.validate()?;
        let curve = map.velocity_curve(settings.mods.contains(Mods::NO_SLIDER_VELOCITY))?;
        let buckets = VelocityBucketIndex::build(&curve);

        let mut all_objects = map.hit_objects.clone();
        all_objects.sort_by_key(|h| h.start_time);

        let key_count = map.key_count();
        let scroll_speed = settings.scroll.scroll_speed(1.0);
        let mut manager = Self {
            key_count,
            map_length: map.length(),
            local_offset_ms: map.local_offset,
            online_offset_ms: map.online_offset,
            all_objects,
            curve,
            buckets,
            pool: LaneObjectPool::new(key_count),
            settings,
            scroll_speed,
            thresholds: PoolingThresholds::for_scroll_speed(scroll_speed),
            last_rate: 1.0,
            current_sv_index: 0,
            current_audio_position: 0.0,
            current_visual_position: 0.0,
            current_track_position: 0,
            score: ScoreProcessor::new(settings.windows),
            events: Vec::new(),
            subscription: None,
        };
        manager.update_current_track_position(0.0, 1.0);
        manager.pool.fill_pending(manager.all_objects.iter().copied());
        manager.pool.initialize(INITIAL_POOL_SIZE_PER_LANE, &manager.curve);
        info!(
            "Hit object pool ready: {} lanes, {} objects, {} pooled.",
            key_count,
            manager.all_objects.len(),
            manager.pool.arena().live()
        );
        Ok(manager)
    }

    /// Starts polling `subscription` for config changes on every update.
    pub fn attach(&mut self, subscription: ConfigSubscription) {
        self.subscription = Some(subscription);
    }

    /// Drops the config subscription, deregistering it from its hub.
    pub fn detach(&mut self) {
        self.subscription = None;
    }

    pub fn update(&mut self, clock: &impl AudioClock) {
        let rate = effective_rate(clock.rate());
        if rate != self.last_rate {
            self.on_rate_changed(rate);
        }
        if let Some(changes) = self.subscription.as_ref().map(ConfigSubscription::take)
            && !changes.is_empty()
        {
            self.apply_config_changes(&crate::config::get(), changes);
        }

        self.update_current_track_position(clock.time_ms(), rate);
        self.promote_pending();
        self.score_active_objects();
        self.score_held_objects();
        self.recycle_dead_objects();
        self.pool.update_offsets(self.current_track_position, self.scroll_speed);
    }

    /// Song time as the scoring path sees it, for a raw clock reading.
    #[inline(always)]
    pub fn audio_time_for(&self, clock_time_ms: f64, rate: f32) -> f64 {
        clock_time_ms + f64::from(self.settings.global_audio_offset_ms) * f64::from(rate)
            - f64::from(self.local_offset_ms)
            - f64::from(self.online_offset_ms)
    }

    fn update_current_track_position(&mut self, clock_time_ms: f64, rate: f32) {
        self.current_audio_position = self.audio_time_for(clock_time_ms, rate);
        self.current_visual_position = self.current_audio_position
            + f64::from(self.settings.visual_offset_ms) * f64::from(rate);

        let visual = self.current_visual_position;
        let segments = self.curve.segments();
        // The hint only moves forward; a clock that went back needs a fresh lookup.
        if self.current_sv_index > 0
            && visual < f64::from(segments[self.current_sv_index - 1].start_time)
        {
            self.current_sv_index = self.curve.index_for_time(visual);
        }
        self.current_sv_index = self.curve.advance_index(self.current_sv_index, visual);
        self.current_track_position = self.curve.time_to_position_at(visual, self.current_sv_index);
    }

    fn promote_pending(&mut self) {
        let Self {
            pool,
            curve,
            thresholds,
            current_track_position,
            current_audio_position,
            ..
        } = self;
        for lane in 0..pool.key_count() {
            pool.promote_pending(lane, curve, |info| {
                let position = curve.time_to_position(f64::from(info.start_time));
                let near = ((*current_track_position - position) as f32).abs()
                    < thresholds.create_position;
                let soon = f64::from(info.start_time) - *current_audio_position
                    < f64::from(thresholds.create_time);
                near || soon
            });
        }
    }

    /// Integer audio time, the resolution miss checks run at.
    #[inline(always)]
    fn audio_ms(&self) -> f64 {
        f64::from(self.current_audio_position as i32)
    }

    fn score_active_objects(&mut self) {
        let okay = f64::from(self.score.windows.okay());
        for lane in 0..self.key_count {
            while let Some(id) = self.pool.active_head(lane)
                && !self.score.failed()
            {
                let info = self.pool.note(id).info;
                if self.audio_ms() <= f64::from(info.start_time) + okay {
                    break;
                }
                self.pool.pop_active(lane);
                self.record(info, info.start_time, Judgement::Miss, None, false);
                // A missed long note also forfeits its release.
                if info.is_long_note() {
                    self.record(info, info.end_or_start(), Judgement::Miss, None, true);
                }
                self.pool.kill(id);
                info!("Missed note at {}ms in lane {}.", info.start_time, info.lane);
            }
        }
    }

    fn score_held_objects(&mut self) {
        let window = f64::from(self.score.windows.release_window(Judgement::Okay));
        for lane in 0..self.key_count {
            while let Some(id) = self.pool.held_head(lane)
                && !self.score.failed()
            {
                let info = self.pool.note(id).info;
                if self.audio_ms() <= f64::from(info.end_or_start()) + window {
                    break;
                }
                self.pool.pop_held(lane);
                // Holding through the whole release window is a weak hit, not a miss.
                self.record(info, info.end_or_start(), Judgement::Good, None, true);
                self.pool.kill_hold(id, self.current_track_position);
                info!("Missed release at {}ms in lane {}.", info.end_or_start(), info.lane);
            }
        }
    }

    fn recycle_dead_objects(&mut self) {
        let recycle = self.thresholds.recycle_position;
        for lane in 0..self.key_count {
            while let Some(id) = self.pool.dead_head(lane) {
                let latest = self.pool.note(id).latest_track_position;
                if ((self.current_track_position - latest) as f32).abs() <= recycle {
                    break;
                }
                self.pool.pop_dead(lane);
                match self.pool.recycle(id, &self.curve) {
                    RecycleOutcome::Reused(info) => {
                        debug!("Slot {} now shows {}ms in lane {}.", id.index(), info.start_time, info.lane);
                    }
                    RecycleOutcome::Destroyed => {
                        debug!("Slot {} destroyed, lane {} is exhausted.", id.index(), lane + 1);
                    }
                }
            }
        }
    }

    /// Builds the event from the score state before registering it.
    fn record(
        &mut self,
        info: HitObjectInfo,
        time: i32,
        judgement: Judgement,
        offset: Option<i32>,
        is_release: bool,
    ) {
        let event = self.score.event(info, time, judgement, offset, is_release);
        if self.settings.input_mode.updates_score() {
            self.score.register(judgement, is_release);
        }
        self.events.push(event);
    }

    /// Judges a press on `lane` at song time `audio_time`. Presses outside every
    /// window are ignored and return `None`.
    pub fn press(&mut self, lane: usize, audio_time: f64) -> Option<Judgement> {
        let id = self.closest_tap(lane)?;
        let info = self.pool.note(id).info;
        let offset = (f64::from(info.start_time) - audio_time) as i32;
        let judgement = self.score.windows.classify(offset as f32)?;

        self.pool.pop_active(lane);
        self.record(info, info.start_time, judgement, Some(offset), false);
        if judgement == Judgement::Miss {
            if info.is_long_note() {
                self.record(info, info.end_or_start(), Judgement::Miss, None, true);
            }
            self.pool.kill(id);
        } else if info.is_long_note() {
            self.pool.change_to_held(id);
        } else {
            self.pool.kill(id);
        }
        Some(judgement)
    }

    /// Judges a release on `lane` against the held long note there, if any.
    /// A release outside every release window counts as a release miss.
    pub fn release(&mut self, lane: usize, audio_time: f64) -> Option<Judgement> {
        let id = self.closest_release(lane)?;
        let info = self.pool.note(id).info;
        let end = info.end_or_start();
        let offset = (f64::from(end) - audio_time) as i32;
        let judgement = self.score.windows.classify_release(offset as f32).unwrap_or(Judgement::Miss);

        self.pool.pop_held(lane);
        self.record(info, end, judgement, Some(offset), true);
        self.pool.kill_hold(id, self.current_track_position);
        Some(judgement)
    }

    /// Moves the head of `lane`'s active queue into the held queue.
    pub fn change_to_held(&mut self, lane: usize) -> Option<SlotId> {
        let id = self.pool.pop_active(lane)?;
        self.pool.change_to_held(id);
        Some(id)
    }

    /// Sends the head of `lane`'s held queue to dead with its head at the receptor.
    pub fn kill_hold(&mut self, lane: usize) -> Option<SlotId> {
        let id = self.pool.pop_held(lane)?;
        self.pool.kill_hold(id, self.current_track_position);
        Some(id)
    }

    /// Rebuilds the pool for a jump to the clock's position. Notes that are
    /// entirely behind the new position are dropped without judgements.
    pub fn handle_skip(&mut self, clock: &impl AudioClock) {
        let rate = effective_rate(clock.rate());
        self.pool.clear();
        self.current_sv_index = 0;
        self.update_current_track_position(clock.time_ms(), rate);

        let audio = self.current_audio_position;
        let keep = |info: &HitObjectInfo| {
            let start = f64::from(info.start_time);
            if info.is_long_note() {
                !(start < audio && f64::from(info.end_or_start()) < audio)
            } else {
                start >= audio
            }
        };
        let remaining: Vec<HitObjectInfo> =
            self.all_objects.iter().copied().filter(|info| keep(info)).collect();
        info!(
            "Skipped to {:.0}ms: {} of {} objects remain.",
            audio,
            remaining.len(),
            self.all_objects.len()
        );
        self.pool.fill_pending(remaining);
        self.pool.initialize(INITIAL_POOL_SIZE_PER_LANE, &self.curve);
        self.update(clock);
    }

    /// Done once nothing is left to hit or hold. Dead notes only hold the play
    /// open until the visual position passes the map length.
    pub fn is_complete(&self) -> bool {
        if self.pool.any_active() || self.pool.any_held() {
            return false;
        }
        !self.pool.any_dead() || self.current_visual_position > f64::from(self.map_length)
    }

    /// Earliest head still waiting to be hit, pooled or pending.
    pub fn next_hit_object(&self) -> Option<HitObjectInfo> {
        let pooled = (0..self.key_count)
            .filter_map(|lane| self.pool.active_head(lane))
            .map(|id| self.pool.note(id).info);
        let pending = self.pool.lanes().iter().filter_map(|l| l.pending.front().copied());
        // Ties keep the first lane, pooled heads before pending ones.
        pooled.chain(pending).fold(None, |best: Option<HitObjectInfo>, info| match best {
            Some(b) if b.start_time <= info.start_time => Some(b),
            _ => Some(info),
        })
    }

    pub fn on_break(&self) -> bool {
        let Some(next) = self.next_hit_object() else {
            return false;
        };
        let gap = f64::from(next.start_time) - self.current_audio_position;
        gap >= START_DELAY_MS + BREAK_LEAD_MS && !self.pool.any_held()
    }

    #[inline(always)]
    pub fn closest_tap(&self, lane: usize) -> Option<SlotId> {
        self.pool.active_head(lane)
    }

    #[inline(always)]
    pub fn closest_release(&self, lane: usize) -> Option<SlotId> {
        self.pool.held_head(lane)
    }

    pub fn notes(&self) -> impl Iterator<Item = NoteView> + '_ {
        self.pool.iter_pooled().map(|(slot, note)| NoteView {
            slot,
            info: note.info,
            state: note.state,
            head_offset: note.head_offset,
            tail_offset: note.tail_offset,
        })
    }

    pub fn events(&self) -> &[JudgementEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<JudgementEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn times_from_position(&self, position: i64) -> PositionTimes {
        self.buckets.position_to_times(position)
    }

    pub fn direction_changes(&self, start_time: f64, end_time: f64) -> Vec<DirectionChange> {
        self.curve.direction_changes(start_time, end_time)
    }

    pub fn on_rate_changed(&mut self, rate: f32) {
        self.last_rate = effective_rate(rate);
        self.refresh_scroll_speed();
    }

    pub fn on_scroll_speed_changed(&mut self, speed: u32) {
        self.settings.scroll.speed = speed;
        self.refresh_scroll_speed();
    }

    /// Recomputes thresholds and note offsets. Queues are left untouched.
    fn refresh_scroll_speed(&mut self) {
        self.scroll_speed = self.settings.scroll.scroll_speed(self.last_rate);
        self.thresholds = PoolingThresholds::for_scroll_speed(self.scroll_speed);
        self.pool.update_offsets(self.current_track_position, self.scroll_speed);
        debug!(
            "Scroll speed {} at {}x: pooling within {} track units.",
            self.scroll_speed, self.last_rate, self.thresholds.create_position
        );
    }

    pub fn apply_config_changes(&mut self, cfg: &Config, changes: ConfigChanges) {
        if changes.contains(ConfigChanges::SCROLL_SPEED) {
            self.on_scroll_speed_changed(cfg.scroll_speed(self.key_count));
        }
        if changes.contains(ConfigChanges::OFFSETS) {
            self.settings.global_audio_offset_ms = cfg.global_audio_offset_ms;
            self.settings.visual_offset_ms = cfg.visual_offset_ms;
        }
        let deferred = changes & (ConfigChanges::NO_SLIDER_VELOCITY | ConfigChanges::JUDGEMENTS);
        if !deferred.is_empty() {
            debug!("{deferred:?} changed mid-play, applies from the next play.");
        }
    }

    #[inline(always)]
    pub fn key_count(&self) -> usize {
        self.key_count
    }

    #[inline(always)]
    pub fn map_length(&self) -> i32 {
        self.map_length
    }

    #[inline(always)]
    pub fn curve(&self) -> &VelocityCurve {
        &self.curve
    }

    #[inline(always)]
    pub fn pool(&self) -> &LaneObjectPool {
        &self.pool
    }

    #[inline(always)]
    pub fn score(&self) -> &ScoreProcessor {
        &self.score
    }

    #[inline(always)]
    pub fn settings(&self) -> &PlaySettings {
        &self.settings
    }

    /// Playback rate seen on the last update.
    #[inline(always)]
    pub fn rate(&self) -> f32 {
        self.last_rate
    }

    #[inline(always)]
    pub fn scroll_speed(&self) -> f32 {
        self.scroll_speed
    }

    #[inline(always)]
    pub fn thresholds(&self) -> PoolingThresholds {
        self.thresholds
    }

    #[inline(always)]
    pub fn current_audio_position(&self) -> f64 {
        self.current_audio_position
    }

    #[inline(always)]
    pub fn current_visual_position(&self) -> f64 {
        self.current_visual_position
    }

    #[inline(always)]
    pub fn current_track_position(&self) -> i64 {
        self.current_track_position
    }

    #[inline(always)]
    pub fn current_sv_index(&self) -> usize {
        self.current_sv_index
    }
}

use svfield::config::{ChangeHub, ConfigChanges, Mods};
use svfield::core::audio::{AudioClock, ManualClock};
use svfield::game::chart::MapData;
use svfield::game::gameplay::{self, PlayOptions, PlayStatus};
use svfield::game::hit_objects::{HitObjectManager, PlaySettings};
use svfield::game::judgment::Judgement;
use svfield::game::note::HitObjectInfo;
use svfield::game::timing::VelocitySegment;

fn map(objects: Vec<HitObjectInfo>) -> MapData {
    MapData { hit_objects: objects, ..MapData::default() }
}

fn reversal_map(objects: Vec<HitObjectInfo>) -> MapData {
    MapData {
        slider_velocities: vec![VelocitySegment { start_time: 1000.0, multiplier: -1.0 }],
        ..map(objects)
    }
}

fn manager(data: &MapData) -> HitObjectManager {
    HitObjectManager::new(data, PlaySettings::default()).unwrap()
}

/// Steps the clock from `from` to `to` and checks the pool after every frame.
fn sweep(m: &mut HitObjectManager, from: i32, to: i32, step: i32) {
    let mut t = from;
    while t <= to {
        m.update(&ManualClock::new(f64::from(t)));
        m.pool().validate().unwrap();
        t += step;
    }
}

fn pooled_starts(m: &HitObjectManager) -> Vec<(usize, i32)> {
    let mut out: Vec<(usize, i32)> = m
        .notes()
        .map(|n| (n.info.lane, n.info.start_time))
        .chain(m.pool().lanes().iter().flat_map(|l| l.pending.iter().map(|i| (i.lane, i.start_time))))
        .collect();
    out.sort_unstable();
    out
}

#[test]
fn unplayed_long_note_misses_head_and_tail_then_recycles() {
    let mut m = manager(&map(vec![HitObjectInfo::long_note(1, 1000, 2000)]));
    sweep(&mut m, 0, 2500, 10);

    let events = m.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.judgement == Judgement::Miss));
    assert!(!events[0].is_release);
    assert_eq!(events[0].time, 1000);
    assert!(events[1].is_release);
    assert_eq!(events[1].time, 2000);

    assert_eq!(m.pool().lane(0).dead.len(), 1);
    assert!(m.is_complete(), "dead notes stop holding the play open past the map length");

    // Recycled once the track is a full recycle distance past the tail.
    sweep(&mut m, 2500, 6100, 50);
    assert_eq!(m.pool().note_count(), 0);
    assert_eq!(m.pool().arena().live(), 0);
    assert_eq!(m.events().len(), 2);
}

#[test]
fn play_without_input_terminates() {
    let objects = (0..12)
        .map(|i| {
            let lane = i % 4 + 1;
            let start = 500 + i as i32 * 120;
            if i % 3 == 0 {
                HitObjectInfo::long_note(lane, start, start + 300)
            } else {
                HitObjectInfo::tap(lane, start)
            }
        })
        .collect::<Vec<_>>();
    let data = map(objects);
    let mut m = manager(&data);

    let mut t = 0;
    while !m.is_complete() {
        t += 16;
        assert!(t < data.length() + 400, "play never completed");
        m.update(&ManualClock::new(f64::from(t)));
        m.pool().validate().unwrap();
    }
    let heads = data.hit_objects.len();
    let tails = data.hit_objects.iter().filter(|h| h.is_long_note()).count();
    assert_eq!(m.events().len(), heads + tails);
    assert_eq!(m.score().count(Judgement::Miss), (heads + tails) as u32);
}

#[test]
fn skip_lands_in_the_same_state_from_any_start() {
    let data = reversal_map(vec![
        HitObjectInfo::tap(1, 500),
        HitObjectInfo::tap(2, 2500),
        HitObjectInfo::long_note(3, 2800, 4000),
        HitObjectInfo::tap(4, 6000),
        HitObjectInfo::tap(1, 9000),
    ]);
    let target = ManualClock::new(2700.0);

    let mut fresh = manager(&data);
    fresh.handle_skip(&target);

    let mut seeked_back = manager(&data);
    sweep(&mut seeked_back, 0, 8000, 16);
    seeked_back.drain_events();
    seeked_back.handle_skip(&target);

    assert_eq!(pooled_starts(&fresh), pooled_starts(&seeked_back));
    assert_eq!(fresh.current_track_position(), seeked_back.current_track_position());
    assert_eq!(fresh.current_sv_index(), seeked_back.current_sv_index());
    assert!(fresh.events().is_empty());
    assert!(seeked_back.events().is_empty());
    assert_eq!(pooled_starts(&fresh), vec![(1, 9000), (3, 2800), (4, 6000)]);
    fresh.pool().validate().unwrap();
}

#[test]
fn scroll_speed_round_trip_leaves_the_pool_unchanged() {
    let mut m = manager(&map((0..12).map(|i| HitObjectInfo::tap(i % 4 + 1, 1000 + i as i32 * 200)).collect()));
    m.update(&ManualClock::new(900.0));
    let before_starts = pooled_starts(&m);
    let before_notes: Vec<_> = m.notes().collect();
    let before_speed = m.scroll_speed();

    m.on_scroll_speed_changed(300);
    assert_eq!(m.scroll_speed(), before_speed * 2.0);
    assert_eq!(pooled_starts(&m), before_starts, "speed changes never move notes between queues");
    m.on_scroll_speed_changed(150);

    assert_eq!(m.scroll_speed(), before_speed);
    assert_eq!(m.notes().collect::<Vec<_>>(), before_notes);
    m.pool().validate().unwrap();
}

#[test]
fn too_many_misses_fail_the_play() {
    let data = map((0..30).map(|i| HitObjectInfo::tap(i % 4 + 1, 500 + i as i32 * 50)).collect());
    let mut state = gameplay::init(&data, &svfield::config::Config::default(), PlayOptions::default()).unwrap();
    let mut clock = ManualClock::new(0.0);
    let mut status = PlayStatus::Playing;
    while status == PlayStatus::Playing {
        assert!(clock.time_ms() < 5000.0, "play neither failed nor completed");
        clock.advance(16.0);
        status = gameplay::update(&mut state, &clock, 16.0);
    }
    assert_eq!(status, PlayStatus::Failed);
    assert_eq!(state.manager.score().health(), 0.0);
    // 100 / 4.5 rounds up to 23 misses.
    assert_eq!(state.manager.score().count(Judgement::Miss), 23);
}

#[test]
fn rate_change_rescales_speed_and_thresholds() {
    let mut m = manager(&map(vec![HitObjectInfo::tap(1, 10_000)]));
    m.update(&ManualClock::new(0.0));
    let base = m.thresholds();
    m.update(&ManualClock::new(0.0).with_rate(2.0));
    assert_eq!(m.scroll_speed(), 0.375);
    assert_eq!(m.thresholds().create_position, base.create_position * 2.0);
}

#[test]
fn dropped_subscription_stops_config_reactions() {
    let hub = ChangeHub::new();
    let mut m = manager(&map(vec![HitObjectInfo::tap(1, 10_000)]));
    m.attach(hub.subscribe());
    assert_eq!(hub.subscriber_count(), 1);

    // The manager reloads the speed from the global config, which is at its default here.
    m.on_scroll_speed_changed(300);
    hub.notify(ConfigChanges::SCROLL_SPEED);
    m.update(&ManualClock::new(0.0));
    assert_eq!(m.scroll_speed(), 0.75);

    m.detach();
    assert_eq!(hub.subscriber_count(), 0);
    m.on_scroll_speed_changed(300);
    hub.notify(ConfigChanges::SCROLL_SPEED);
    m.update(&ManualClock::new(16.0));
    assert_eq!(m.scroll_speed(), 1.5);
}

#[test]
fn missed_note_under_negative_trailing_velocity_still_recycles() {
    let data = MapData {
        slider_velocities: vec![VelocitySegment { start_time: 1500.0, multiplier: -1.0 }],
        ..map(vec![HitObjectInfo::long_note(1, 1000, 2000)])
    };
    let mut m = manager(&data);
    sweep(&mut m, 0, 2100, 20);
    assert_eq!(m.events().len(), 2);
    assert_eq!(m.pool().lane(0).dead.len(), 1);
    assert!(m.is_complete());

    // The track runs backwards forever; distance from the furthest point still grows.
    let note = m.pool().note(m.pool().dead_head(0).unwrap());
    assert_eq!(note.latest_track_position, 150_000);
    sweep(&mut m, 2100, 5600, 50);
    assert_eq!(m.pool().note_count(), 0);
}

#[test]
fn reversal_positions_map_back_to_both_crossings() {
    let m = manager(&reversal_map(vec![HitObjectInfo::tap(1, 3000)]));
    let position = m.curve().time_to_position(500.0);
    assert_eq!(position, m.curve().time_to_position(1500.0));

    let times = m.times_from_position(position);
    let near = |t: f32| times.exact.iter().any(|&x| (x - t).abs() < 0.5);
    assert!(near(500.0), "{:?}", times.exact);
    assert!(near(1500.0), "{:?}", times.exact);

    let changes = m.direction_changes(0.0, 3000.0);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].start_time, 1000.0);
    assert_eq!(changes[0].position, 100_000);
}

#[test]
fn notes_past_a_reversal_come_back_toward_the_receptor() {
    let mut m = manager(&reversal_map(vec![HitObjectInfo::tap(1, 3000)]));
    m.update(&ManualClock::new(1000.0));
    let id = m.closest_tap(0).unwrap();
    let at_turn = m.pool().note(id).head_offset;
    m.update(&ManualClock::new(1500.0));
    let after = m.pool().note(id).head_offset;
    assert_ne!(at_turn, after);
    assert!(after.abs() < at_turn.abs() || after.signum() != at_turn.signum());
}

#[test]
fn autoplay_through_a_reversal_is_all_marvelous() {
    let data = reversal_map(vec![
        HitObjectInfo::tap(1, 600),
        HitObjectInfo::long_note(2, 900, 1400),
        HitObjectInfo::tap(3, 1600),
        HitObjectInfo::tap(4, 2200),
    ]);
    let options = PlayOptions { mods: Mods::AUTOPLAY, ..PlayOptions::default() };
    let mut state = gameplay::init(&data, &svfield::config::Config::default(), options).unwrap();
    let mut clock = ManualClock::new(0.0);
    let mut status = PlayStatus::Playing;
    while status == PlayStatus::Playing {
        assert!(clock.time_ms() < 10_000.0, "autoplay never completed");
        clock.advance(16.0);
        status = gameplay::update(&mut state, &clock, 16.0);
        state.manager.pool().validate().unwrap();
    }
    assert_eq!(status, PlayStatus::Complete);
    assert_eq!(state.judgements.len(), 5);
    assert!(state.judgements.iter().all(|e| e.judgement == Judgement::Marv));
    assert_eq!(state.manager.score().max_combo(), 5);
}

#[test]
fn reversal_peak_maps_back_to_the_turn() {
    let m = manager(&reversal_map(vec![HitObjectInfo::tap(1, 3000)]));
    let peak = m.curve().time_to_position(1000.0);
    assert_eq!(m.times_from_position(peak).exact, vec![1000.0]);
}

#[test]
fn missed_long_note_parked_at_zero_velocity_does_not_block_completion() {
    let data = MapData {
        slider_velocities: vec![VelocitySegment { start_time: 1500.0, multiplier: 0.0 }],
        ..map(vec![HitObjectInfo::long_note(1, 1000, 2000)])
    };
    let mut m = manager(&data);
    sweep(&mut m, 0, 1990, 10);
    assert_eq!(m.events().len(), 2);
    assert_eq!(m.pool().lane(0).dead.len(), 1);
    assert!(!m.is_complete(), "visual position has not passed the map length yet");

    sweep(&mut m, 2000, 3000, 10);
    assert!(m.is_complete());
    // The track never moves again, so the dead note is never recycled.
    sweep(&mut m, 3000, 20_000, 500);
    assert_eq!(m.pool().lane(0).dead.len(), 1);
    assert!(m.is_complete());
}

#[test]
fn skipping_into_a_long_note_misses_it_on_the_next_update() {
    let mut m = manager(&map(vec![
        HitObjectInfo::long_note(1, 1000, 3000),
        HitObjectInfo::tap(2, 1500),
        HitObjectInfo::tap(3, 2500),
    ]));
    m.handle_skip(&ManualClock::new(2000.0));

    // The long note is still running at the new position, so it is kept and then
    // missed head and tail; the tap behind the position is dropped unjudged.
    let events = m.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.hit_object.start_time == 1000 && e.judgement == Judgement::Miss));
    assert_eq!(m.pool().lane(0).dead.len(), 1);
    assert_eq!(pooled_starts(&m), vec![(1, 1000), (3, 2500)]);
    m.pool().validate().unwrap();
}

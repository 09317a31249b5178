// Mutates the process-wide config, so this binary holds a single test.
use svfield::config::{self, ConfigChanges, LogLevel};
use svfield::core::audio::ManualClock;
use svfield::game::chart::MapData;
use svfield::game::gameplay::{self, PlayOptions};
use svfield::game::note::HitObjectInfo;
use svfield::game::timing_lines::scale_factor_for;
use svfield::game::timing_windows::JudgementPreset;

#[test]
fn option_changes_reach_a_running_play_and_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svfield.ini");
    config::load_from(&path);
    assert_eq!(config::path(), path);

    let map = MapData {
        hit_objects: (0..8).map(|i| HitObjectInfo::tap(i % 4 + 1, 2000 + i as i32 * 500)).collect(),
        timing_lines: Some(vec![0.0, 2000.0, 4000.0]),
        ..MapData::default()
    };
    let baseline = config::hub().subscriber_count();
    let mut state = gameplay::init(&map, &config::get(), PlayOptions::default()).unwrap();
    gameplay::subscribe_to_config(&mut state);
    assert_eq!(config::hub().subscriber_count(), baseline + 2);
    let watch = config::subscribe();

    let clock = ManualClock::new(100.0);
    gameplay::update(&mut state, &clock, 16.0);
    assert_eq!(state.manager.scroll_speed(), 0.75);
    assert_eq!(state.manager.thresholds().create_position, 400_000.0);

    config::update_scroll_speed(4, 300);
    assert_eq!(state.manager.scroll_speed(), 0.75, "applied on the next update");
    gameplay::update(&mut state, &clock, 16.0);
    assert_eq!(state.manager.scroll_speed(), 1.5);
    assert_eq!(state.manager.thresholds().create_position, 200_000.0);
    assert_eq!(watch.take(), ConfigChanges::SCROLL_SPEED);

    config::update_scroll_speed(4, 300);
    assert!(watch.take().is_empty(), "unchanged values are not broadcast");

    config::update_visual_offset(-25.0);
    config::update_peak_height(4, 50);
    gameplay::update(&mut state, &clock, 16.0);
    assert_eq!(state.manager.settings().visual_offset_ms, -25.0);
    assert_eq!(state.timing_lines.scale_factor(), scale_factor_for(50));

    config::update_judgement_preset(JudgementPreset::Strict);
    config::update_log_level(LogLevel::Info);
    assert_eq!(watch.take(), ConfigChanges::OFFSETS | ConfigChanges::PEAK_HEIGHT | ConfigChanges::JUDGEMENTS | ConfigChanges::LOG_LEVEL);

    let written = std::fs::read_to_string(&path).unwrap();
    for line in ["ScrollSpeed4K=300", "VisualOffset=-25", "PeakHeight4K=50", "JudgementPreset=Strict", "LogLevel=Info"] {
        assert!(written.lines().any(|l| l == line), "missing {line:?} in {written:?}");
    }

    drop(watch);
    drop(state);
    assert_eq!(config::hub().subscriber_count(), baseline);

    config::load_from(&path);
    assert_eq!(config::get().scroll_speed(4), 300);
    assert_eq!(config::get().judgement_preset, JudgementPreset::Strict);
}

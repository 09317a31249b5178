use std::hint::black_box;
use std::time::Instant;
use svfield::config::Config;
use svfield::core::audio::ManualClock;
use svfield::game::chart::MapData;
use svfield::game::gameplay::{self, PlayOptions, PlayStatus};
use svfield::game::note::HitObjectInfo;
use svfield::game::timing::VelocitySegment;
use svfield::game::velocity_buckets::VelocityBucketIndex;

const SEGMENTS: usize = 20_000;
const OBJECTS: usize = 20_000;
const LOOKUPS: usize = 200_000;

fn synthetic_map() -> MapData {
    // Sweeps through fast, slow, stopped and reversed sections.
    let pattern = [1.0_f32, 2.5, 0.0, -1.0, 0.5, -0.25, 1.5];
    let slider_velocities = (0..SEGMENTS)
        .map(|i| VelocitySegment {
            start_time: i as f32 * 25.0,
            multiplier: pattern[i % pattern.len()],
        })
        .collect();
    let hit_objects = (0..OBJECTS)
        .map(|i| {
            let lane = i % 4 + 1;
            let start = 1000 + i as i32 * 25;
            if i % 5 == 0 {
                HitObjectInfo::long_note(lane, start, start + 80)
            } else {
                HitObjectInfo::tap(lane, start)
            }
        })
        .collect();
    MapData { slider_velocities, hit_objects, ..MapData::default() }
}

fn report(name: &str, iterations: usize, start: Instant) {
    let elapsed = start.elapsed();
    let per = elapsed.as_secs_f64() * 1e9 / iterations.max(1) as f64;
    println!("{name:<24} {iterations:>8} iters  {:>10.3} ms  {per:>10.1} ns/iter", elapsed.as_secs_f64() * 1e3);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let map = synthetic_map();

    let start = Instant::now();
    let curve = map.velocity_curve(false)?;
    report("curve build", 1, start);

    let start = Instant::now();
    let buckets = VelocityBucketIndex::build(&curve);
    report("bucket build", 1, start);

    let span = f64::from(map.length());
    let start = Instant::now();
    for i in 0..LOOKUPS {
        let t = span * i as f64 / LOOKUPS as f64;
        black_box(curve.time_to_position(black_box(t)));
    }
    report("time_to_position", LOOKUPS, start);

    let end = curve.time_to_position(span);
    let start = Instant::now();
    let mut hits = 0usize;
    for i in 0..LOOKUPS / 10 {
        let p = end * i as i64 / (LOOKUPS / 10) as i64;
        hits += black_box(buckets.position_to_times(black_box(p))).exact.len();
    }
    report("position_to_times", LOOKUPS / 10, start);
    println!("  {hits} exact crossings found");

    let options = PlayOptions { mods: svfield::config::Mods::AUTOPLAY, ..PlayOptions::default() };
    let mut state = gameplay::init(&map, &Config::default(), options)?;
    let mut clock = ManualClock::new(0.0);
    let mut frames = 0usize;
    let start = Instant::now();
    while gameplay::update(&mut state, &clock, 4.0) == PlayStatus::Playing {
        clock.advance(4.0);
        frames += 1;
    }
    report("autoplay frames", frames, start);
    println!(
        "  {} judgements, peak pool {} slots",
        state.judgements.len(),
        state.manager.pool().arena().capacity()
    );
    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use svfield::config::{self, LogLevel, Mods};
use svfield::core::audio::{AudioClock, ManualClock};
use svfield::core::input::{InputEdge, InputMode};
use svfield::game::chart::MapData;
use svfield::game::gameplay::{self, PlayOptions, PlayStatus};
use svfield::game::hit_objects::{HitObjectManager, PlaySettings};
use svfield::game::judgment::Judgement;
use svfield::game::scroll::PlayfieldMode;
use svfield::game::timing_windows::JudgementPreset;

#[derive(Parser)]
#[command(name = "svfield", version, about = "Scroll-velocity playfield simulator")]
struct Cli {
    /// Config file to load instead of the default one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plays a map on a fixed-step clock and prints every judgement as a JSON line.
    Simulate {
        map: PathBuf,
        /// Stop at this song time even if the play is not complete.
        #[arg(long)]
        until: Option<f64>,
        /// Wall-clock milliseconds per frame.
        #[arg(long, default_value_t = 16.0)]
        step: f64,
        #[arg(long, default_value_t = 1.0)]
        rate: f32,
        /// Seek here before the first frame.
        #[arg(long)]
        skip_to: Option<f64>,
        #[arg(long)]
        autoplay: bool,
        /// JSON array of input edges to feed as the clock passes them.
        #[arg(long)]
        inputs: Option<PathBuf>,
        /// Record judgements without scoring them.
        #[arg(long)]
        replay: bool,
        #[arg(long)]
        preview: bool,
        /// Also print the hit offset histogram after the summary.
        #[arg(long)]
        histogram: bool,
    },
    /// Lists the song times at which the track reaches `position`.
    Times { map: PathBuf, position: i64 },
    /// Lists where the scroll direction flips between two song times.
    Directions {
        map: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        from: f64,
        #[arg(long)]
        to: Option<f64>,
    },
    /// Changes one option and saves it to the config file.
    Set {
        #[command(subcommand)]
        option: SetOption,
    },
}

#[derive(Subcommand)]
enum SetOption {
    ScrollSpeed {
        /// Lane count the speed applies to; 7 and up share one setting.
        keys: usize,
        speed: u32,
    },
    AudioOffset {
        #[arg(allow_negative_numbers = true)]
        ms: f32,
    },
    VisualOffset {
        #[arg(allow_negative_numbers = true)]
        ms: f32,
    },
    NoSliderVelocity {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    Judgements { preset: JudgementPreset },
    PeakHeight { keys: usize, percent: u32 },
    LogLevel { level: LogLevel },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let cli = Cli::parse();
    match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    }
    log::set_max_level(config::get().log_level.as_level_filter());

    match cli.command {
        Command::Simulate { map, until, step, rate, skip_to, autoplay, inputs, replay, preview, histogram } => {
            let options = PlayOptions {
                mode: if preview { PlayfieldMode::Preview } else { PlayfieldMode::default() },
                mods: if autoplay { Mods::AUTOPLAY } else { Mods::empty() },
                input_mode: if replay { InputMode::Replay } else { InputMode::Live },
                ..PlayOptions::default()
            };
            let edges = match inputs {
                Some(path) => load_inputs(&path)?,
                None => Vec::new(),
            };
            simulate(&map, options, &edges, Frames { until, step, rate, skip_to }, histogram)
        }
        Command::Times { map, position } => {
            let map = MapData::load(&map)?;
            let manager = HitObjectManager::new(&map, PlaySettings::default())?;
            let times = manager.times_from_position(position);
            for t in &times.exact {
                println!("{t}");
            }
            for (start, end) in &times.intervals {
                println!("{start}..{end}");
            }
            Ok(())
        }
        Command::Directions { map, from, to } => {
            let map = MapData::load(&map)?;
            let curve = map.velocity_curve(false)?;
            let to = to.unwrap_or_else(|| f64::from(map.length()));
            for change in curve.direction_changes(from, to) {
                println!("{}\t{}", change.start_time, change.position);
            }
            Ok(())
        }
        Command::Set { option } => {
            set_option(option);
            Ok(())
        }
    }
}

fn set_option(option: SetOption) {
    let watch = config::subscribe();
    match option {
        SetOption::ScrollSpeed { keys, speed } => config::update_scroll_speed(keys, speed),
        SetOption::AudioOffset { ms } => config::update_global_audio_offset(ms),
        SetOption::VisualOffset { ms } => config::update_visual_offset(ms),
        SetOption::NoSliderVelocity { enabled } => config::update_no_slider_velocity(enabled),
        SetOption::Judgements { preset } => config::update_judgement_preset(preset),
        SetOption::PeakHeight { keys, percent } => config::update_peak_height(keys, percent),
        SetOption::LogLevel { level } => config::update_log_level(level),
    }
    let changes = watch.take();
    if changes.is_empty() {
        println!("Unchanged.");
    } else {
        println!("{changes:?} saved to '{}'.", config::path().display());
    }
}

fn load_inputs(path: &Path) -> Result<Vec<InputEdge>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let mut edges: Vec<InputEdge> = serde_json::from_str(&text)?;
    edges.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
    Ok(edges)
}

struct Frames {
    until: Option<f64>,
    step: f64,
    rate: f32,
    skip_to: Option<f64>,
}

fn simulate(
    path: &Path,
    options: PlayOptions,
    edges: &[InputEdge],
    frames: Frames,
    histogram: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let Frames { until, step, rate, skip_to } = frames;
    let map = MapData::load(path)?;
    let mut state = gameplay::init(&map, &config::get(), options)?;
    gameplay::subscribe_to_config(&mut state);

    let mut clock = ManualClock::new(0.0).with_rate(rate);
    if let Some(t) = skip_to {
        clock.set_time(t);
        gameplay::skip_to(&mut state, &clock);
    }
    let until = until.unwrap_or(f64::INFINITY);
    let step = if step.is_finite() && step > 0.0 { step } else { 16.0 };

    let mut printed = 0;
    let mut next_edge = edges.partition_point(|e| e.time_ms < clock.time_ms());
    let status = loop {
        clock.advance(step);
        while let Some(edge) = edges.get(next_edge)
            && edge.time_ms <= clock.time_ms()
        {
            gameplay::handle_input(&mut state, edge);
            next_edge += 1;
        }
        let status = gameplay::update(&mut state, &clock, step as f32);
        for event in &state.judgements[printed..] {
            println!("{}", serde_json::to_string(event)?);
        }
        printed = state.judgements.len();
        if status != PlayStatus::Playing || clock.time_ms() >= until {
            break status;
        }
    };

    let score = state.manager.score();
    let stats = gameplay::timing_stats(&state);
    log::info!("Play ended at {:.0}ms: {:?}.", clock.time_ms(), status);
    eprintln!(
        "accuracy {:.2}%  max combo {}  health {:.1}  mean {:.2}ms  stddev {:.2}ms",
        score.accuracy(),
        score.max_combo(),
        score.health(),
        stats.mean_ms,
        stats.stddev_ms
    );
    for j in Judgement::ALL {
        eprintln!("{:>9} {}", j.as_str(), score.count(j));
    }
    if histogram {
        for (bin, count) in gameplay::timing_histogram(&state) {
            eprintln!("{bin:>5}ms {count}");
        }
    }
    Ok(())
}

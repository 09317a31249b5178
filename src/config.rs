use crate::game::timing_windows::JudgementPreset;
use bitflags::bitflags;
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

pub const CONFIG_PATH: &str = "svfield.ini";

// --- Minimal INI reader ---
#[derive(Debug, Default)]
pub struct SimpleIni {
    sections: HashMap<String, HashMap<String, String>>,
}

impl SimpleIni {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        self.parse_str(&content);
        Ok(())
    }

    pub fn parse_str(&mut self, content: &str) {
        self.sections.clear();
        let mut current_section = String::new();

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current_section = name.trim().to_string();
                self.sections.entry(current_section.clone()).or_default();
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            self.sections
                .entry(current_section.clone())
                .or_default()
                .insert(key.to_string(), value.trim().to_string());
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("'{other}' is not a valid LogLevel")),
        }
    }
}

bitflags! {
    /// Gameplay modifiers that change how a play is driven.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Mods: u32 {
        const NO_SLIDER_VELOCITY = 1 << 0;
        const AUTOPLAY = 1 << 1;
    }
}

bitflags! {
    /// Which settings changed since a subscriber last looked.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConfigChanges: u32 {
        const SCROLL_SPEED = 1 << 0;
        const OFFSETS = 1 << 1;
        const NO_SLIDER_VELOCITY = 1 << 2;
        const JUDGEMENTS = 1 << 3;
        const PEAK_HEIGHT = 1 << 4;
        const LOG_LEVEL = 1 << 5;
    }
}

pub const SCROLL_SPEED_RANGE: (u32, u32) = (50, 1000);
pub const PEAK_HEIGHT_RANGE: (u32, u32) = (0, 200);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Scroll speed setting, tenths of a playfield height per second at 1.0x.
    pub scroll_speed_4k: u32,
    pub scroll_speed_7k: u32,
    pub global_audio_offset_ms: f32,
    pub visual_offset_ms: f32,
    pub no_slider_velocity: bool,
    pub judgement_preset: JudgementPreset,
    /// Timing line horizon height, in percent.
    pub peak_height_4k: u32,
    pub peak_height_7k: u32,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scroll_speed_4k: 150,
            scroll_speed_7k: 150,
            global_audio_offset_ms: 0.0,
            visual_offset_ms: 0.0,
            no_slider_velocity: false,
            judgement_preset: JudgementPreset::Standard,
            peak_height_4k: 100,
            peak_height_7k: 100,
            log_level: LogLevel::Warn,
        }
    }
}

fn parse_or<T: FromStr>(conf: &SimpleIni, key: &str, default: T) -> T {
    let Some(raw) = conf.get("Options", key) else {
        return default;
    };
    raw.parse::<T>().unwrap_or_else(|_| {
        warn!("Invalid value '{raw}' for {key}, using default.");
        default
    })
}

#[inline(always)]
fn clamp_range(value: u32, (lo, hi): (u32, u32)) -> u32 {
    value.clamp(lo, hi)
}

impl Config {
    /// Builds a config from a parsed file, falling back to defaults per key.
    pub fn from_ini(conf: &SimpleIni) -> Self {
        let default = Self::default();
        Self {
            scroll_speed_4k: clamp_range(
                parse_or(conf, "ScrollSpeed4K", default.scroll_speed_4k),
                SCROLL_SPEED_RANGE,
            ),
            scroll_speed_7k: clamp_range(
                parse_or(conf, "ScrollSpeed7K", default.scroll_speed_7k),
                SCROLL_SPEED_RANGE,
            ),
            global_audio_offset_ms: parse_or(conf, "GlobalAudioOffset", default.global_audio_offset_ms),
            visual_offset_ms: parse_or(conf, "VisualOffset", default.visual_offset_ms),
            no_slider_velocity: parse_or::<u8>(conf, "NoSliderVelocity", 0) != 0,
            judgement_preset: parse_or(conf, "JudgementPreset", default.judgement_preset),
            peak_height_4k: clamp_range(
                parse_or(conf, "PeakHeight4K", default.peak_height_4k),
                PEAK_HEIGHT_RANGE,
            ),
            peak_height_7k: clamp_range(
                parse_or(conf, "PeakHeight7K", default.peak_height_7k),
                PEAK_HEIGHT_RANGE,
            ),
            log_level: parse_or(conf, "LogLevel", default.log_level),
        }
    }

    /// Serializes `[Options]` with keys in alphabetical order.
    pub fn to_ini_string(&self) -> String {
        let mut content = String::new();
        content.push_str("[Options]\n");
        content.push_str(&format!("GlobalAudioOffset={}\n", self.global_audio_offset_ms));
        content.push_str(&format!("JudgementPreset={}\n", self.judgement_preset.as_str()));
        content.push_str(&format!("LogLevel={}\n", self.log_level.as_str()));
        content.push_str(&format!(
            "NoSliderVelocity={}\n",
            if self.no_slider_velocity { "1" } else { "0" }
        ));
        content.push_str(&format!("PeakHeight4K={}\n", self.peak_height_4k));
        content.push_str(&format!("PeakHeight7K={}\n", self.peak_height_7k));
        content.push_str(&format!("ScrollSpeed4K={}\n", self.scroll_speed_4k));
        content.push_str(&format!("ScrollSpeed7K={}\n", self.scroll_speed_7k));
        content.push_str(&format!("VisualOffset={}\n", self.visual_offset_ms));
        content.push('\n');
        content
    }

    /// 7K settings cover 7K and 7K+1; everything else reads the 4K values.
    #[inline(always)]
    pub const fn scroll_speed(&self, key_count: usize) -> u32 {
        if key_count >= 7 { self.scroll_speed_7k } else { self.scroll_speed_4k }
    }

    #[inline(always)]
    pub const fn peak_height(&self, key_count: usize) -> u32 {
        if key_count >= 7 { self.peak_height_7k } else { self.peak_height_4k }
    }

    pub fn mods(&self) -> Mods {
        let mut mods = Mods::empty();
        mods.set(Mods::NO_SLIDER_VELOCITY, self.no_slider_velocity);
        mods
    }
}

// --- Change notification ---

#[derive(Debug, Default)]
struct HubInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Arc<AtomicU32>)>>,
}

impl HubInner {
    fn subscribers(&self) -> MutexGuard<'_, Vec<(u64, Arc<AtomicU32>)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fans config changes out to subscribers as dirty flags.
#[derive(Debug, Clone, Default)]
pub struct ChangeHub {
    inner: Arc<HubInner>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> ConfigSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let flags = Arc::new(AtomicU32::new(0));
        self.inner.subscribers().push((id, flags.clone()));
        ConfigSubscription { id, flags, hub: self.inner.clone() }
    }

    pub fn notify(&self, changes: ConfigChanges) {
        if changes.is_empty() {
            return;
        }
        for (_, flags) in self.inner.subscribers().iter() {
            flags.fetch_or(changes.bits(), Ordering::Relaxed);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

/// Registration on a [`ChangeHub`]. Dropping it deregisters.
#[derive(Debug)]
pub struct ConfigSubscription {
    id: u64,
    flags: Arc<AtomicU32>,
    hub: Arc<HubInner>,
}

impl ConfigSubscription {
    /// Returns and clears the pending change flags.
    pub fn take(&self) -> ConfigChanges {
        ConfigChanges::from_bits_truncate(self.flags.swap(0, Ordering::Relaxed))
    }
}

impl Drop for ConfigSubscription {
    fn drop(&mut self) {
        self.hub.subscribers().retain(|(id, _)| *id != self.id);
    }
}

// Global, mutable configuration instance.
static CONFIG: LazyLock<Mutex<Config>> = LazyLock::new(|| Mutex::new(Config::default()));
static HUB: LazyLock<ChangeHub> = LazyLock::new(ChangeHub::new);
// File the `update_*` setters write back to: the one last passed to `load_from`.
static CONFIG_FILE: LazyLock<Mutex<PathBuf>> = LazyLock::new(|| Mutex::new(PathBuf::from(CONFIG_PATH)));

#[inline(always)]
fn lock() -> MutexGuard<'static, Config> {
    CONFIG.lock().unwrap_or_else(PoisonError::into_inner)
}

// --- File I/O ---

pub fn load() {
    load_from(Path::new(CONFIG_PATH));
}

/// Loads `path` into the global config, writing a default file first when missing.
/// Later updates are saved back to `path`.
pub fn load_from(path: &Path) {
    *CONFIG_FILE.lock().unwrap_or_else(PoisonError::into_inner) = path.to_path_buf();
    if !path.exists() {
        info!("'{}' not found, creating with default values.", path.display());
        if let Err(e) = std::fs::write(path, Config::default().to_ini_string()) {
            warn!("Failed to create default config file: {e}");
        }
    }

    let mut conf = SimpleIni::new();
    match conf.load(path) {
        Ok(()) => {
            *lock() = Config::from_ini(&conf);
            info!("Configuration loaded from '{}'.", path.display());
        }
        Err(e) => warn!("Failed to load '{}': {e}. Using default values.", path.display()),
    }
}

pub fn save_to(path: &Path) {
    let content = get().to_ini_string();
    if let Err(e) = std::fs::write(path, content) {
        warn!("Failed to save config file: {e}");
    }
}

fn save() {
    save_to(&path());
}

/// Path the global config is saved to.
pub fn path() -> PathBuf {
    CONFIG_FILE.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

pub fn get() -> Config {
    *lock()
}

/// The hub every `update_*` call notifies.
pub fn hub() -> &'static ChangeHub {
    &HUB
}

pub fn subscribe() -> ConfigSubscription {
    HUB.subscribe()
}

/// Applies `edit`, then saves and notifies only if something changed.
fn update(changes: ConfigChanges, edit: impl FnOnce(&mut Config)) {
    {
        let mut cfg = lock();
        let before = *cfg;
        edit(&mut cfg);
        if *cfg == before {
            return;
        }
    }
    save();
    HUB.notify(changes);
}

pub fn update_scroll_speed(key_count: usize, speed: u32) {
    let speed = clamp_range(speed, SCROLL_SPEED_RANGE);
    update(ConfigChanges::SCROLL_SPEED, |cfg| {
        if key_count >= 7 {
            cfg.scroll_speed_7k = speed;
        } else {
            cfg.scroll_speed_4k = speed;
        }
    });
}

pub fn update_global_audio_offset(offset_ms: f32) {
    update(ConfigChanges::OFFSETS, |cfg| cfg.global_audio_offset_ms = offset_ms);
}

pub fn update_visual_offset(offset_ms: f32) {
    update(ConfigChanges::OFFSETS, |cfg| cfg.visual_offset_ms = offset_ms);
}

pub fn update_no_slider_velocity(enabled: bool) {
    update(ConfigChanges::NO_SLIDER_VELOCITY, |cfg| cfg.no_slider_velocity = enabled);
}

pub fn update_judgement_preset(preset: JudgementPreset) {
    update(ConfigChanges::JUDGEMENTS, |cfg| cfg.judgement_preset = preset);
}

pub fn update_peak_height(key_count: usize, percent: u32) {
    let percent = clamp_range(percent, PEAK_HEIGHT_RANGE);
    update(ConfigChanges::PEAK_HEIGHT, |cfg| {
        if key_count >= 7 {
            cfg.peak_height_7k = percent;
        } else {
            cfg.peak_height_4k = percent;
        }
    });
}

pub fn update_log_level(level: LogLevel) {
    update(ConfigChanges::LOG_LEVEL, |cfg| cfg.log_level = level);
    log::set_max_level(level.as_level_filter());
}

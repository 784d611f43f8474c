// SPDX-License-Identifier: MPL-2.0-only

//! Typed configuration for the hearthview display engine.
//!
//! Everything the engine consumes at runtime is validated here, once, at
//! load time. The weighting collection is sorted by `(day, time)` so the
//! resolver can rely on its ordering.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Content buckets the scheduler distributes screen time across.
///
/// This is a closed set: every media source folder is assigned to exactly
/// one of these categories.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Media,
    Calendar,
    Weather,
    WebNews,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Media,
        Category::Calendar,
        Category::Weather,
        Category::WebNews,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Media => "media",
            Category::Calendar => "calendar",
            Category::Weather => "weather",
            Category::WebNews => "web_news",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    /// Days from Monday, matching `chrono::Weekday::num_days_from_monday`.
    #[must_use]
    pub fn number(self) -> u32 {
        match self {
            Day::Monday => 0,
            Day::Tuesday => 1,
            Day::Wednesday => 2,
            Day::Thursday => 3,
            Day::Friday => 4,
            Day::Saturday => 5,
            Day::Sunday => 6,
        }
    }
}

/// Per-category weight vector.
///
/// Unknown keys in the source document are ignored rather than rejected, so
/// a stale category name in an operator's config degrades instead of
/// refusing to load. Weights need not sum to 1.0 at rest; callers normalize
/// through [`WeightSet::normalized`].
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct WeightSet {
    #[serde(default)]
    pub media: f32,
    #[serde(default)]
    pub calendar: f32,
    #[serde(default)]
    pub weather: f32,
    #[serde(default)]
    pub web_news: f32,
}

impl WeightSet {
    /// Equal weight across all four categories.
    #[must_use]
    pub fn equal() -> Self {
        Self {
            media: 0.25,
            calendar: 0.25,
            weather: 0.25,
            web_news: 0.25,
        }
    }

    #[must_use]
    pub fn get(&self, category: Category) -> f32 {
        match category {
            Category::Media => self.media,
            Category::Calendar => self.calendar,
            Category::Weather => self.weather,
            Category::WebNews => self.web_news,
        }
    }

    pub fn set(&mut self, category: Category, weight: f32) {
        match category {
            Category::Media => self.media = weight,
            Category::Calendar => self.calendar = weight,
            Category::Weather => self.weather = weight,
            Category::WebNews => self.web_news = weight,
        }
    }

    #[must_use]
    pub fn sum(&self) -> f32 {
        self.media + self.calendar + self.weather + self.web_news
    }

    /// Scale so the weights sum to 1.0. A degenerate vector (all zero or
    /// negative) falls back to equal weights rather than producing NaNs.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut out = *self;
        for category in Category::ALL {
            if out.get(category) < 0.0 {
                out.set(category, 0.0);
            }
        }
        let sum = out.sum();
        if sum <= f32::EPSILON {
            return Self::equal();
        }
        for category in Category::ALL {
            out.set(category, out.get(category) / sum);
        }
        out
    }

    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        Category::ALL
            .iter()
            .all(|&c| (self.get(c) - other.get(c)).abs() <= tolerance)
    }
}

/// One step in the weekly weighting schedule. An entry takes control at its
/// `(day, time)` and stays in control until the next entry supersedes it,
/// across day boundaries if need be.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WeightingEntry {
    pub day: Day,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub weights: WeightSet,
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}

/// A directory of media files assigned to one category.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    pub folder: PathBuf,
    pub category: Category,
    /// Relative weight among sources feeding the same category.
    #[serde(default = "default_source_weight")]
    pub weight: f32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path substrings to skip during enumeration (scratch dirs etc).
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_source_weight() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Transition effect applied between items.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    Crossfade,
    Slide,
    Zoom,
    Fade,
    None,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EaseKind {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct TransitionsConfig {
    pub enabled: bool,
    pub kind: TransitionKind,
    pub duration_seconds: f32,
    pub ease: EaseKind,
}

impl Default for TransitionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: TransitionKind::default(),
            duration_seconds: 2.0,
            ease: EaseKind::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct VideoConfig {
    pub enabled: bool,
    pub mute_audio: bool,
    /// Wall-clock frame rate video phases are paced at.
    pub target_fps: u32,
    /// Explicit ffmpeg binary path; discovered on $PATH when unset.
    pub ffmpeg_path: Option<String>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mute_audio: true,
            target_fps: 30,
            ffmpeg_path: None,
        }
    }
}

/// Image scaling mode
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    /// Fit the image and fill the rest of the area with the background color
    #[default]
    Fit,
    /// Zoom the image so that it fills the whole area
    Zoom,
    /// Stretch the image ignoring any aspect ratio to fit the area
    Stretch,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct SlideshowConfig {
    /// Seconds each item stays on screen, videos included.
    pub slide_duration_seconds: u64,
    pub shuffle_enabled: bool,
    pub playlist_size: usize,
    /// Seconds between forced playlist rebuilds.
    pub reshuffle_interval: u64,
    pub scaling_mode: ScalingMode,
    pub transitions: TransitionsConfig,
    pub video_playback: VideoConfig,
    pub supported_image_formats: Vec<String>,
    pub supported_video_formats: Vec<String>,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            slide_duration_seconds: 8,
            shuffle_enabled: true,
            playlist_size: 20,
            reshuffle_interval: 600,
            scaling_mode: ScalingMode::default(),
            transitions: TransitionsConfig::default(),
            video_playback: VideoConfig::default(),
            supported_image_formats: ["jpg", "jpeg", "png", "gif", "bmp", "webp"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            supported_video_formats: ["mp4", "avi", "mov", "mkv", "webm", "m4v"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Background fill behind letterboxed content, linear RGB.
    pub background_color: [f32; 3],
    /// Framebuffer device the composited frames are written to.
    pub device: PathBuf,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            background_color: [0.0, 0.0, 0.0],
            device: PathBuf::from("/dev/fb0"),
        }
    }
}

#[must_use]
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub display: DisplayConfig,
    pub slideshow: SlideshowConfig,
    pub sources: Vec<SourceEntry>,
    pub weighting_collection: Vec<WeightingEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("no enabled media sources configured")]
    NoSources,
}

impl Config {
    /// Default location of the config document.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("hearthview")
            .join("config.ron")
    }

    /// Load and validate the config from a RON document.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unparseable, or leaves the engine with
    /// nothing to display.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config = ron::from_str(&text).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if !config.sources.iter().any(|s| s.enabled) {
            return Err(Error::NoSources);
        }

        config
            .weighting_collection
            .sort_by_key(|entry| (entry.day.number(), entry.time));

        for entry in &config.weighting_collection {
            let total = entry.weights.sum();
            if (total - 1.0).abs() > 0.01 {
                tracing::warn!(
                    day = ?entry.day,
                    time = %entry.time.format("%H:%M"),
                    total,
                    "weighting entry does not sum to 1.0; it will be normalized"
                );
            }
        }

        Ok(config)
    }
}

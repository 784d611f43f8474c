// SPDX-License-Identifier: MPL-2.0-only

mod catalog;
mod draw;
mod engine;
mod playlist;
mod refresh;
mod scaler;
mod surface;
mod transition;
mod video;
mod weights;

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use calloop::{
    signals::{Signal, Signals},
    timer::{TimeoutAction, Timer},
};
use chrono::Local;
use hearthview_config::{Config, TransitionKind, WeightSet};
use image::{DynamicImage, RgbImage};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    catalog::{CatalogSnapshot, MediaCatalog, MediaItem, MediaKind},
    engine::{Phase, PlaybackEngine, Step, Timings},
    refresh::{RefreshCoordinator, RefreshReason},
    surface::{Framebuffer, Headless, Surface},
    video::VideoSession,
};

/// Shortest interval the tick timer is allowed to re-arm with.
const MIN_TICK: Duration = Duration::from_millis(50);
/// Cadence of transition blending.
const BLEND_TICK: Duration = Duration::from_millis(16);
/// How often an empty engine retries enumeration.
const IDLE_RETRY: Duration = Duration::from_secs(30);

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    init_logging();

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(Config::default_path, PathBuf::from);
    let config = Config::load(&config_path)?;
    tracing::info!(path = %config_path.display(), "loaded configuration");

    let mut event_loop = calloop::EventLoop::<HearthView>::try_new()?;
    let handle = event_loop.handle();

    let mut state = HearthView::new(config, config_path)?;

    let folders: Vec<&std::path::Path> = state
        .config
        .sources
        .iter()
        .filter(|s| s.enabled)
        .map(|s| s.folder.as_path())
        .collect();
    let _media_watcher = match refresh::watch_sources(&handle, &folders) {
        Ok(watcher) => Some(watcher),
        Err(why) => {
            tracing::warn!(?why, "media sources will not be watched");
            None
        }
    };
    let _config_watcher = match refresh::watch_config(&handle, &state.config_path) {
        Ok(watcher) => Some(watcher),
        Err(why) => {
            tracing::warn!(?why, "config will not be hot-reloaded");
            None
        }
    };

    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM, Signal::SIGUSR1])?;
    handle
        .insert_source(signals, |event, _, state| match event.signal() {
            Signal::SIGUSR1 => {
                tracing::info!("refresh requested via SIGUSR1");
                state.refresh.request();
            }
            signal => {
                tracing::info!(?signal, "shutting down");
                state.engine.shutdown();
                state.exit = true;
            }
        })
        .map_err(|err| eyre::eyre!("{err}"))?;

    handle
        .insert_source(
            Timer::from_duration(Duration::ZERO),
            |_, _, state: &mut HearthView| {
                if state.exit {
                    return TimeoutAction::Drop;
                }
                state.on_tick();
                if state.exit {
                    TimeoutAction::Drop
                } else {
                    TimeoutAction::ToDuration(state.next_tick())
                }
            },
        )
        .map_err(|err| eyre::eyre!("{err}"))?;

    state.rebuild_playlist(RefreshReason::Requested);

    loop {
        event_loop.dispatch(None, &mut state)?;

        if state.exit {
            break;
        }
    }
    Ok(())
}

fn init_logging() {
    let level = std::env::var("HEARTHVIEW_LOG")
        .ok()
        .and_then(|raw| raw.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
}

pub struct HearthView {
    config: Config,
    config_path: PathBuf,
    catalog: MediaCatalog,
    snapshot: Arc<CatalogSnapshot>,
    engine: PlaybackEngine,
    pub(crate) refresh: RefreshCoordinator,
    timings: Timings,
    rng: StdRng,
    ffmpeg: Option<String>,
    surface: Box<dyn Surface>,
    /// Frame currently on screen, canvas-sized.
    shown: Option<RgbImage>,
    /// Composited target of an in-flight transition.
    upcoming: Option<RgbImage>,
    /// What the upcoming item turns into once the transition lands.
    pending_kind: MediaKind,
    video: Option<VideoSession>,
    active_weights: WeightSet,
    last_tick: Instant,
    last_idle_retry: Instant,
    exit: bool,
}

impl HearthView {
    fn new(config: Config, config_path: PathBuf) -> eyre::Result<Self> {
        let catalog = MediaCatalog::new(&config.sources, &config.slideshow);
        let timings = timings_of(&config);

        let ffmpeg = match video::find_ffmpeg(config.slideshow.video_playback.ffmpeg_path.as_deref())
        {
            Ok(path) => Some(path),
            Err(why) => {
                tracing::warn!(?why, "ffmpeg unavailable; video items will be skipped");
                None
            }
        };

        let display_cfg = &config.display;
        let surface: Box<dyn Surface> =
            match Framebuffer::open(&display_cfg.device, display_cfg.width, display_cfg.height) {
                Ok(fb) => Box::new(fb),
                Err(why) => {
                    tracing::warn!(
                        device = %display_cfg.device.display(),
                        ?why,
                        "framebuffer unavailable; running headless"
                    );
                    Box::new(Headless::new(display_cfg.width, display_cfg.height))
                }
            };
        let (width, height) = surface.size();
        tracing::info!(width, height, "presentation surface ready");

        Ok(Self {
            engine: PlaybackEngine::new(timings),
            refresh: RefreshCoordinator::new(Duration::from_secs(
                config.slideshow.reshuffle_interval,
            )),
            catalog,
            snapshot: Arc::new(CatalogSnapshot::default()),
            timings,
            rng: StdRng::from_os_rng(),
            ffmpeg,
            surface,
            shown: None,
            upcoming: None,
            pending_kind: MediaKind::Image,
            video: None,
            active_weights: WeightSet::equal(),
            last_tick: Instant::now(),
            last_idle_retry: Instant::now(),
            exit: false,
            config,
            config_path,
        })
    }

    /// One pass of the playback loop.
    fn on_tick(&mut self) {
        let dt = self.last_tick.elapsed();
        self.last_tick = Instant::now();

        match self.engine.tick(dt) {
            Step::Hold => self.maybe_recover_from_idle(),
            Step::Blend(progress) => self.present_blend(progress),
            Step::TransitionDone => {
                if let Some(frame) = self.upcoming.take() {
                    self.present(&frame);
                    self.shown = Some(frame);
                }
                self.engine.begin_showing(self.pending_kind);
            }
            Step::VideoFrame => self.present_video_frame(),
            Step::Advance => self.advance_item(),
        }
    }

    /// Leave the current item behind and enter the next one, rebuilding
    /// when a refresh is pending or skipping exhausts the playlist.
    fn advance_item(&mut self) {
        self.video = None;
        let exhausted = self.engine.advance_cursor();
        self.check_weight_drift();
        if let Some(reason) = self.refresh.should_rebuild(exhausted) {
            self.rebuild_playlist(reason);
        } else if !self.start_current_item() {
            // Decode-failure skipping ran the cursor off the end; sample a
            // fresh playlist rather than sitting on a stale cursor.
            self.rebuild_playlist(RefreshReason::PlaylistExhausted);
        }
    }

    /// Interval until the timer should fire again for the current phase.
    fn next_tick(&self) -> Duration {
        match self.engine.phase() {
            Phase::Idle => Duration::from_secs(1),
            Phase::Showing => self
                .timings
                .slide
                .saturating_sub(self.engine.elapsed())
                .max(MIN_TICK),
            Phase::Transitioning { .. } => BLEND_TICK,
            Phase::PlayingVideo => {
                let fps = self.config.slideshow.video_playback.target_fps.max(1);
                Duration::from_secs(1) / fps
            }
        }
    }

    /// Re-enumerate if needed, resolve the weights for this instant, and
    /// install a freshly sampled playlist.
    fn rebuild_playlist(&mut self, reason: RefreshReason) {
        self.video = None;

        let stale = self
            .snapshot
            .taken_at
            .is_none_or(|taken| taken.elapsed() >= catalog::STALE_AFTER);
        if self.refresh.catalog_is_dirty() || stale {
            self.snapshot = self.catalog.enumerate();
            if self.snapshot.is_empty() {
                tracing::warn!("catalog enumeration found no media");
            } else {
                for category in hearthview_config::Category::ALL {
                    tracing::debug!(
                        category = category.as_str(),
                        items = self.snapshot.count_in(category),
                        total = self.snapshot.len(),
                        "catalog category census"
                    );
                }
            }
        }

        let now = Local::now().naive_local();
        self.active_weights = weights::resolve(&self.config.weighting_collection, now);

        let playlist = playlist::build(
            &self.active_weights,
            &self.snapshot,
            self.config.slideshow.playlist_size,
            self.config.slideshow.shuffle_enabled,
            &mut self.rng,
        );
        let videos = playlist
            .iter()
            .filter(|item| item.kind == MediaKind::Video)
            .count();
        tracing::info!(?reason, len = playlist.len(), videos, "rebuilt playlist");

        self.engine.replace_playlist(playlist);
        self.refresh.note_rebuilt();

        if self.engine.is_empty() {
            tracing::warn!("no displayable media; idling");
        } else if !self.start_current_item() {
            // Nothing in a fresh playlist decoded; park until the idle
            // retry re-enumerates. Rebuilding again here would loop.
            tracing::warn!("no item in the playlist could be decoded; idling");
            self.video = None;
            self.engine.replace_playlist(playlist::Playlist::default());
        }
    }

    /// Prepare and enter the item under the cursor, skipping anything that
    /// fails to decode. Returns `false` when skipping exhausted the sweep
    /// without starting an item; the caller decides whether to rebuild.
    fn start_current_item(&mut self) -> bool {
        let mut attempts = self.engine.len();
        while attempts > 0 {
            let Some(item) = self.engine.current().cloned() else {
                break;
            };
            match self.prepare_item(&item) {
                Ok((frame, kind)) => {
                    self.pending_kind = kind;
                    let transitions = &self.config.slideshow.transitions;
                    if transitions.enabled
                        && transitions.kind != TransitionKind::None
                        && !self.timings.transition.is_zero()
                        && self.shown.is_some()
                    {
                        self.upcoming = Some(frame);
                        self.engine.begin_transition(kind);
                    } else {
                        self.present(&frame);
                        self.shown = Some(frame);
                        self.engine.begin_showing(kind);
                    }
                    return true;
                }
                Err(why) => {
                    tracing::warn!(path = %item.path.display(), ?why, "skipping undecodable item");
                    attempts -= 1;
                    let _ = self.engine.advance_cursor();
                }
            }
        }
        false
    }

    /// Decode one item into a canvas-sized frame, opening a video session
    /// as a side effect for playable videos.
    fn prepare_item(&mut self, item: &MediaItem) -> eyre::Result<(RgbImage, MediaKind)> {
        match item.kind {
            MediaKind::Image => {
                let decoded = image::ImageReader::open(&item.path)?
                    .with_guessed_format()?
                    .decode()?;
                Ok((self.composite(&decoded), MediaKind::Image))
            }
            MediaKind::Video => {
                let Some(ffmpeg) = self.ffmpeg.clone() else {
                    eyre::bail!("no ffmpeg available for {}", item.path.display());
                };
                if self.config.slideshow.video_playback.enabled {
                    let mut session = VideoSession::open(
                        &item.path,
                        &self.config.slideshow.video_playback,
                        &ffmpeg,
                        self.config.slideshow.slide_duration_seconds,
                    )?;
                    let first = session
                        .frame_at(Duration::ZERO)?
                        .ok_or_else(|| eyre::eyre!("video produced no frames"))?;
                    let frame = self.composite(&DynamicImage::ImageRgb8(first.clone()));
                    self.video = Some(session);
                    Ok((frame, MediaKind::Video))
                } else {
                    // Playback disabled: show the poster frame as a still.
                    let poster = video::poster(&item.path, &ffmpeg)?;
                    Ok((self.composite(&DynamicImage::ImageRgb8(poster)), MediaKind::Image))
                }
            }
        }
    }

    fn composite(&self, decoded: &DynamicImage) -> RgbImage {
        scaler::composite(
            decoded,
            self.config.slideshow.scaling_mode,
            &self.config.display.background_color,
            self.config.display.width,
            self.config.display.height,
        )
    }

    fn present_blend(&mut self, progress: f32) {
        let (Some(shown), Some(upcoming)) = (self.shown.as_ref(), self.upcoming.as_ref()) else {
            return;
        };
        let transitions = &self.config.slideshow.transitions;
        let eased = transition::ease(transitions.ease, progress);
        let frame = transition::compose(transitions.kind, shown, upcoming, eased);
        if let Err(why) = self.surface.present(&frame) {
            tracing::warn!(?why, "presenting transition frame failed");
        }
    }

    fn present_video_frame(&mut self) {
        let elapsed = self.engine.elapsed();
        let Some(session) = self.video.as_mut() else {
            return;
        };
        match session.frame_at(elapsed) {
            Ok(Some(frame)) => {
                let canvas = scaler::composite(
                    &DynamicImage::ImageRgb8(frame.clone()),
                    self.config.slideshow.scaling_mode,
                    &self.config.display.background_color,
                    self.config.display.width,
                    self.config.display.height,
                );
                if let Err(why) = self.surface.present(&canvas) {
                    tracing::warn!(?why, "presenting video frame failed");
                }
                self.shown = Some(canvas);
            }
            Ok(None) => {}
            Err(why) => {
                tracing::warn!(?why, "video decode failed mid-stream; skipping item");
                self.advance_item();
            }
        }
    }

    fn present(&mut self, frame: &RgbImage) {
        if let Err(why) = self.surface.present(frame) {
            tracing::warn!(?why, "presenting frame failed");
        }
    }

    /// Flag a rebuild when the scheduled weights have moved since the
    /// playlist was built. Checked only at advance boundaries.
    fn check_weight_drift(&mut self) {
        let now = Local::now().naive_local();
        let resolved = weights::resolve(&self.config.weighting_collection, now);
        if weights::materially_differ(&resolved, &self.active_weights) {
            tracing::info!("scheduled weights changed; rebuild pending");
            self.refresh.mark_weights_dirty();
        }
    }

    /// An empty engine periodically retries enumeration, so media appearing
    /// later (a mount coming up, a first sync finishing) is picked up.
    fn maybe_recover_from_idle(&mut self) {
        if self.engine.phase() != Phase::Idle || self.engine.is_shutting_down() {
            return;
        }
        if self.last_idle_retry.elapsed() >= IDLE_RETRY {
            self.last_idle_retry = Instant::now();
            self.refresh.request();
            self.rebuild_playlist(RefreshReason::Requested);
        }
    }

    /// Swap in a freshly loaded config. Display geometry is fixed for the
    /// process lifetime; everything else takes effect at the next boundary.
    pub(crate) fn reload_config(&mut self) {
        match Config::load(&self.config_path) {
            Ok(mut config) => {
                if config.display != self.config.display {
                    tracing::warn!("display changes require a restart; keeping current geometry");
                    // The surface was sized at startup; compositing at the
                    // new geometry would overrun its canvas.
                    config.display = self.config.display.clone();
                }
                tracing::info!("configuration reloaded");
                self.timings = timings_of(&config);
                self.engine.set_timings(self.timings);
                self.refresh
                    .set_interval(Duration::from_secs(config.slideshow.reshuffle_interval));
                self.catalog = MediaCatalog::new(&config.sources, &config.slideshow);
                self.config = config;
                self.refresh.request();
            }
            Err(why) => {
                tracing::warn!(?why, "config reload failed; keeping previous configuration");
            }
        }
    }
}

fn timings_of(config: &Config) -> Timings {
    let transitions = &config.slideshow.transitions;
    Timings {
        slide: Duration::from_secs(config.slideshow.slide_duration_seconds),
        transition: if transitions.enabled {
            Duration::from_secs_f32(transitions.duration_seconds.max(0.0))
        } else {
            Duration::ZERO
        },
    }
}

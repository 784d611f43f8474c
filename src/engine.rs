// SPDX-License-Identifier: MPL-2.0

//! Playback state machine.
//!
//! The engine is pure bookkeeping: it owns the playlist cursor and the
//! phase clock, and `tick` reports what the caller should do with the
//! elapsed time. Rendering, decoding and timers all live outside, which
//! keeps every phase transition testable with plain `Duration`s.

use std::time::Duration;

use crate::catalog::{MediaItem, MediaKind};
use crate::playlist::Playlist;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing to show; the caller retries a rebuild on a slow cadence.
    Idle,
    /// A still item is on screen.
    Showing,
    /// Blending from the previous frame to the upcoming item.
    Transitioning { to: MediaKind },
    /// A video item is on screen and frames are being paced.
    PlayingVideo,
}

/// What one tick asks of the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Keep the current frame; nothing changed.
    Hold,
    /// Present the transition blend at this progress, in `0.0..1.0`.
    Blend(f32),
    /// The transition finished; present the target and begin showing it.
    TransitionDone,
    /// Present the next video frame for the current elapsed time.
    VideoFrame,
    /// The current item's time is up; move to the next one.
    Advance,
}

#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub slide: Duration,
    pub transition: Duration,
}

pub struct PlaybackEngine {
    playlist: Playlist,
    cursor: usize,
    phase: Phase,
    elapsed: Duration,
    timings: Timings,
    shutting_down: bool,
}

impl PlaybackEngine {
    #[must_use]
    pub fn new(timings: Timings) -> Self {
        Self {
            playlist: Playlist::default(),
            cursor: 0,
            phase: Phase::Idle,
            elapsed: Duration::ZERO,
            timings,
            shutting_down: false,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Adopt new timings, used on config reload. The current phase keeps
    /// its clock; new durations apply from the next comparison on.
    pub fn set_timings(&mut self, timings: Timings) {
        self.timings = timings;
    }

    /// Time spent in the current phase.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.playlist.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }

    /// The item under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&MediaItem> {
        self.playlist.get(self.cursor)
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Stop making progress. The phase drops to `Idle` so an in-flight
    /// transition or video is abandoned on the very next tick.
    pub fn shutdown(&mut self) {
        self.shutting_down = true;
        self.phase = Phase::Idle;
    }

    /// Install a freshly built playlist and reset the cursor. An empty
    /// playlist parks the engine in `Idle` until a later rebuild succeeds.
    pub fn replace_playlist(&mut self, playlist: Playlist) {
        tracing::debug!(len = playlist.len(), "playlist replaced");
        self.playlist = playlist;
        self.cursor = 0;
        if self.playlist.is_empty() {
            self.phase = Phase::Idle;
            self.elapsed = Duration::ZERO;
        }
    }

    /// Move the cursor forward. Returns `true` when the playlist is
    /// exhausted, which is the caller's cue to build a new one rather than
    /// reshuffle this one.
    pub fn advance_cursor(&mut self) -> bool {
        self.cursor += 1;
        self.cursor >= self.playlist.len()
    }

    /// Enter the transition phase toward an item of the given kind.
    pub fn begin_transition(&mut self, to: MediaKind) {
        self.phase = Phase::Transitioning { to };
        self.elapsed = Duration::ZERO;
    }

    /// Enter the steady display phase appropriate for the item kind.
    pub fn begin_showing(&mut self, kind: MediaKind) {
        self.phase = match kind {
            MediaKind::Image => Phase::Showing,
            MediaKind::Video => Phase::PlayingVideo,
        };
        self.elapsed = Duration::ZERO;
    }

    /// Advance the phase clock by `dt` and report the resulting step.
    pub fn tick(&mut self, dt: Duration) -> Step {
        if self.shutting_down {
            return Step::Hold;
        }
        self.elapsed += dt;

        match self.phase {
            Phase::Idle => Step::Hold,
            Phase::Showing => {
                if self.elapsed >= self.timings.slide {
                    Step::Advance
                } else {
                    Step::Hold
                }
            }
            Phase::Transitioning { .. } => {
                if self.elapsed >= self.timings.transition {
                    Step::TransitionDone
                } else {
                    Step::Blend(self.progress(self.timings.transition))
                }
            }
            Phase::PlayingVideo => {
                if self.elapsed >= self.timings.slide {
                    Step::Advance
                } else {
                    Step::VideoFrame
                }
            }
        }
    }

    fn progress(&self, total: Duration) -> f32 {
        if total.is_zero() {
            return 1.0;
        }
        #[allow(clippy::cast_possible_truncation)]
        let p = (self.elapsed.as_secs_f64() / total.as_secs_f64()) as f32;
        p.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist;
    use hearthview_config::{Category, WeightSet};
    use rand::{SeedableRng, rngs::StdRng};

    fn timings() -> Timings {
        Timings {
            slide: Duration::from_secs(8),
            transition: Duration::from_secs(2),
        }
    }

    fn playlist_of(images: usize, videos: usize) -> Playlist {
        use crate::catalog::CatalogSnapshot;
        let mut items = Vec::new();
        for i in 0..images {
            items.push(MediaItem {
                path: format!("/m/img-{i}.jpg").into(),
                category: Category::Media,
                kind: MediaKind::Image,
                source_weight: 1.0,
                modified: None,
            });
        }
        for i in 0..videos {
            items.push(MediaItem {
                path: format!("/m/vid-{i}.mp4").into(),
                category: Category::Media,
                kind: MediaKind::Video,
                source_weight: 1.0,
                modified: None,
            });
        }
        let snap = CatalogSnapshot {
            items,
            taken_at: None,
        };
        let weights = WeightSet {
            media: 1.0,
            ..WeightSet::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        playlist::build(&weights, &snap, images + videos, false, &mut rng)
    }

    #[test]
    fn showing_holds_until_slide_duration_elapses() {
        let mut engine = PlaybackEngine::new(timings());
        engine.replace_playlist(playlist_of(3, 0));
        engine.begin_showing(MediaKind::Image);

        assert_eq!(engine.tick(Duration::from_secs(3)), Step::Hold);
        assert_eq!(engine.tick(Duration::from_secs(4)), Step::Hold);
        assert_eq!(engine.tick(Duration::from_secs(1)), Step::Advance);
    }

    #[test]
    fn transition_progress_is_monotone_then_done() {
        let mut engine = PlaybackEngine::new(timings());
        engine.replace_playlist(playlist_of(3, 0));
        engine.begin_transition(MediaKind::Image);

        let Step::Blend(early) = engine.tick(Duration::from_millis(500)) else {
            panic!("expected a blend step");
        };
        let Step::Blend(late) = engine.tick(Duration::from_millis(1000)) else {
            panic!("expected a blend step");
        };
        assert!(early < late);
        assert!((0.0..1.0).contains(&early));
        assert_eq!(engine.tick(Duration::from_millis(600)), Step::TransitionDone);
    }

    #[test]
    fn zero_length_transition_finishes_on_first_tick() {
        let mut engine = PlaybackEngine::new(Timings {
            slide: Duration::from_secs(8),
            transition: Duration::ZERO,
        });
        engine.replace_playlist(playlist_of(2, 0));
        engine.begin_transition(MediaKind::Image);
        assert_eq!(engine.tick(Duration::from_millis(1)), Step::TransitionDone);
    }

    #[test]
    fn video_phase_emits_frames_until_slide_duration() {
        let mut engine = PlaybackEngine::new(timings());
        engine.replace_playlist(playlist_of(0, 1));
        engine.begin_showing(MediaKind::Video);

        assert_eq!(engine.tick(Duration::from_secs(2)), Step::VideoFrame);
        assert_eq!(engine.elapsed(), Duration::from_secs(2));
        assert_eq!(engine.tick(Duration::from_secs(6)), Step::Advance);
    }

    #[test]
    fn transition_phase_records_its_target_kind() {
        let mut engine = PlaybackEngine::new(timings());
        engine.replace_playlist(playlist_of(1, 1));
        engine.begin_transition(MediaKind::Video);
        assert_eq!(
            engine.phase(),
            Phase::Transitioning {
                to: MediaKind::Video
            }
        );
    }

    #[test]
    fn cursor_reports_exhaustion_at_the_end() {
        let mut engine = PlaybackEngine::new(timings());
        engine.replace_playlist(playlist_of(2, 0));

        assert!(!engine.advance_cursor());
        assert!(engine.current().is_some());
        assert!(engine.advance_cursor());
        assert!(engine.current().is_none());
    }

    #[test]
    fn replacing_the_playlist_resets_the_cursor() {
        let mut engine = PlaybackEngine::new(timings());
        engine.replace_playlist(playlist_of(2, 0));
        let _ = engine.advance_cursor();
        engine.replace_playlist(playlist_of(3, 0));
        assert_eq!(engine.current().map(|i| i.kind), Some(MediaKind::Image));
        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn empty_playlist_parks_in_idle() {
        let mut engine = PlaybackEngine::new(timings());
        engine.replace_playlist(Playlist::default());
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.tick(Duration::from_secs(1)), Step::Hold);
    }

    #[test]
    fn shutdown_abandons_an_inflight_transition() {
        let mut engine = PlaybackEngine::new(timings());
        engine.replace_playlist(playlist_of(2, 0));
        engine.begin_transition(MediaKind::Image);
        let _ = engine.tick(Duration::from_millis(500));

        engine.shutdown();
        assert!(engine.is_shutting_down());
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.tick(Duration::from_secs(1)), Step::Hold);
    }
}

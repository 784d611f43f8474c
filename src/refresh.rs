// SPDX-License-Identifier: MPL-2.0

//! Refresh coordination.
//!
//! Watchers and signals only mark state dirty here; the running playlist
//! is never touched mid-sweep. The main loop consults the coordinator at
//! rebuild boundaries, so a flood of filesystem events costs exactly one
//! re-enumeration at the next boundary.

use std::{
    path::Path,
    time::{Duration, Instant},
};

use calloop::{LoopHandle, channel};
use notify::{
    RecommendedWatcher, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};

use crate::HearthView;

/// Why a rebuild became due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    CatalogChanged,
    WeightsChanged,
    IntervalElapsed,
    PlaylistExhausted,
    Requested,
}

pub struct RefreshCoordinator {
    catalog_dirty: bool,
    weights_dirty: bool,
    requested: bool,
    reshuffle_interval: Duration,
    last_rebuild: Instant,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(reshuffle_interval: Duration) -> Self {
        Self {
            catalog_dirty: false,
            weights_dirty: false,
            requested: false,
            reshuffle_interval,
            last_rebuild: Instant::now(),
        }
    }

    /// A filesystem event touched a media source.
    pub fn mark_catalog_dirty(&mut self) {
        self.catalog_dirty = true;
    }

    /// The resolved weight vector materially changed.
    pub fn mark_weights_dirty(&mut self) {
        self.weights_dirty = true;
    }

    /// An operator explicitly asked for a refresh.
    pub fn request(&mut self) {
        self.requested = true;
    }

    /// Whether a media re-enumeration is pending.
    #[must_use]
    pub fn catalog_is_dirty(&self) -> bool {
        self.catalog_dirty || self.requested
    }

    /// Whether the next boundary should rebuild the playlist, and why.
    /// Exhaustion always rebuilds; everything else waits for its flag.
    #[must_use]
    pub fn should_rebuild(&self, exhausted: bool) -> Option<RefreshReason> {
        if exhausted {
            Some(RefreshReason::PlaylistExhausted)
        } else if self.requested {
            Some(RefreshReason::Requested)
        } else if self.catalog_dirty {
            Some(RefreshReason::CatalogChanged)
        } else if self.weights_dirty {
            Some(RefreshReason::WeightsChanged)
        } else if self.last_rebuild.elapsed() >= self.reshuffle_interval {
            Some(RefreshReason::IntervalElapsed)
        } else {
            None
        }
    }

    /// Adopt a new forced-rebuild interval, used on config reload.
    pub fn set_interval(&mut self, interval: Duration) {
        self.reshuffle_interval = interval;
    }

    /// Clear all pending flags after a rebuild actually happened.
    pub fn note_rebuilt(&mut self) {
        self.catalog_dirty = false;
        self.weights_dirty = false;
        self.requested = false;
        self.last_rebuild = Instant::now();
    }
}

/// Feed filesystem events from the media sources into the event loop.
///
/// Only creations, removals and renames matter; content modifications do
/// not change what the catalog enumerates.
pub fn watch_sources(
    handle: &LoopHandle<HearthView>,
    folders: &[&Path],
) -> eyre::Result<RecommendedWatcher> {
    let (notify_tx, notify_rx) = channel::sync_channel::<notify::Event>(20);

    handle
        .insert_source(notify_rx, |event, _, state: &mut HearthView| match event {
            channel::Event::Msg(event) => {
                if is_membership_change(&event.kind) {
                    tracing::debug!(paths = ?event.paths, "media source changed on disk");
                    state.refresh.mark_catalog_dirty();
                }
            }
            channel::Event::Closed => {
                tracing::debug!("media watcher channel closed");
            }
        })
        .map_err(|err| eyre::eyre!("{err}"))?;

    let mut watcher =
        notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
            if let Ok(event) = result {
                let _ = notify_tx.send(event);
            }
        })?;

    for folder in folders {
        if let Err(why) = watcher.watch(folder, RecursiveMode::Recursive) {
            tracing::warn!(
                folder = %folder.display(),
                ?why,
                "could not watch media source"
            );
        }
    }

    Ok(watcher)
}

/// Reload the config when its file changes on disk.
///
/// The parent directory is watched because editors typically replace the
/// file rather than rewrite it in place.
pub fn watch_config(
    handle: &LoopHandle<HearthView>,
    config_path: &Path,
) -> eyre::Result<RecommendedWatcher> {
    let parent = config_path
        .parent()
        .ok_or_else(|| eyre::eyre!("config path has no parent directory"))?
        .to_path_buf();
    let target = config_path.to_path_buf();

    let (notify_tx, notify_rx) = channel::sync_channel::<()>(4);

    handle
        .insert_source(notify_rx, |event, _, state: &mut HearthView| {
            if let channel::Event::Msg(()) = event {
                state.reload_config();
            }
        })
        .map_err(|err| eyre::eyre!("{err}"))?;

    let mut watcher =
        notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
            if let Ok(event) = result {
                if event.paths.iter().any(|p| p == &target) {
                    let _ = notify_tx.send(());
                }
            }
        })?;
    watcher.watch(&parent, RecursiveMode::NonRecursive)?;

    Ok(watcher)
}

fn is_membership_change(kind: &notify::EventKind) -> bool {
    matches!(
        kind,
        notify::EventKind::Create(_)
            | notify::EventKind::Remove(_)
            | notify::EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::From))
    )
}

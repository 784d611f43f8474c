// SPDX-License-Identifier: MPL-2.0

//! Filesystem enumeration of configured media sources.
//!
//! Enumeration never fails: unreadable folders and unrecognized files are
//! logged and skipped, and the worst case is an empty snapshot. Snapshots
//! are immutable once built; the running playlist keeps its own `Arc` and
//! is never mutated underneath.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use hearthview_config::{Category, SlideshowConfig, SourceEntry};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

/// One displayable file discovered under a configured source.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub path: PathBuf,
    pub category: Category,
    pub kind: MediaKind,
    /// Weight of the source folder this item came from, for sampling
    /// between sources that feed the same category.
    pub source_weight: f32,
    pub modified: Option<SystemTime>,
}

/// Immutable result of one enumeration pass.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    pub items: Vec<MediaItem>,
    pub taken_at: Option<Instant>,
}

impl CatalogSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Items belonging to one category.
    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &MediaItem> {
        self.items.iter().filter(move |item| item.category == category)
    }

    #[must_use]
    pub fn count_in(&self, category: Category) -> usize {
        self.in_category(category).count()
    }
}

pub struct MediaCatalog {
    sources: Vec<SourceEntry>,
    image_exts: Vec<String>,
    video_exts: Vec<String>,
}

impl MediaCatalog {
    #[must_use]
    pub fn new(sources: &[SourceEntry], slideshow: &SlideshowConfig) -> Self {
        Self {
            sources: sources.iter().filter(|s| s.enabled).cloned().collect(),
            image_exts: lowercased(&slideshow.supported_image_formats),
            video_exts: lowercased(&slideshow.supported_video_formats),
        }
    }

    /// Walk every enabled source and classify what it holds.
    ///
    /// Missing folders and files we cannot stat are skipped with a log line
    /// rather than aborting the pass.
    #[must_use]
    pub fn enumerate(&self) -> Arc<CatalogSnapshot> {
        let started = Instant::now();
        let mut items = Vec::new();

        for source in &self.sources {
            let before = items.len();
            self.scan_source(source, &mut items);
            tracing::debug!(
                folder = %source.folder.display(),
                category = source.category.as_str(),
                found = items.len() - before,
                "enumerated media source"
            );
        }

        let newest = items.iter().filter_map(|item| item.modified).max();
        tracing::info!(
            items = items.len(),
            ?newest,
            elapsed = ?started.elapsed(),
            "media catalog refreshed"
        );

        Arc::new(CatalogSnapshot {
            items,
            taken_at: Some(started),
        })
    }

    fn scan_source(&self, source: &SourceEntry, items: &mut Vec<MediaItem>) {
        if !source.folder.is_dir() {
            tracing::warn!(
                folder = %source.folder.display(),
                "media source folder is missing; skipping"
            );
            return;
        }

        for entry in WalkDir::new(&source.folder).follow_links(true) {
            let Ok(entry) = entry else {
                continue;
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if is_ignored(path, &source.ignore) {
                continue;
            }
            let Some(kind) = self.classify(path) else {
                continue;
            };

            items.push(MediaItem {
                path: path.to_path_buf(),
                category: source.category,
                kind,
                source_weight: source.weight.max(0.0),
                modified: entry.metadata().ok().and_then(|m| m.modified().ok()),
            });
        }
    }

    fn classify(&self, path: &std::path::Path) -> Option<MediaKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if self.image_exts.iter().any(|e| *e == ext) {
            Some(MediaKind::Image)
        } else if self.video_exts.iter().any(|e| *e == ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

fn is_ignored(path: &std::path::Path, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let text = path.to_string_lossy();
    patterns.iter().any(|p| text.contains(p.as_str()))
}

/// Snapshot age after which a rebuild should re-enumerate even without a
/// watcher event, covering filesystems where notification is unreliable.
pub const STALE_AFTER: Duration = Duration::from_secs(30 * 60);

fn lowercased(exts: &[String]) -> Vec<String> {
    exts.iter().map(|e| e.to_ascii_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearthview_config::SlideshowConfig;
    use std::fs;

    fn source(folder: PathBuf, category: Category) -> SourceEntry {
        SourceEntry {
            folder,
            category,
            weight: 1.0,
            enabled: true,
            ignore: Vec::new(),
        }
    }

    #[test]
    fn classifies_images_and_videos_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("b.MP4"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("noext"), b"x").unwrap();

        let catalog = MediaCatalog::new(
            &[source(dir.path().to_path_buf(), Category::Media)],
            &SlideshowConfig::default(),
        );
        let snapshot = catalog.enumerate();

        assert_eq!(snapshot.len(), 2);
        let kinds: Vec<MediaKind> = snapshot.items.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&MediaKind::Image));
        assert!(kinds.contains(&MediaKind::Video));
    }

    #[test]
    fn missing_folder_yields_empty_snapshot() {
        let catalog = MediaCatalog::new(
            &[source(PathBuf::from("/nonexistent/hearthview"), Category::Media)],
            &SlideshowConfig::default(),
        );
        assert!(catalog.enumerate().is_empty());
    }

    #[test]
    fn ignore_patterns_filter_by_substring() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        fs::create_dir(&scratch).unwrap();
        fs::write(scratch.join("tmp.jpg"), b"x").unwrap();
        fs::write(dir.path().join("keep.jpg"), b"x").unwrap();

        let mut entry = source(dir.path().to_path_buf(), Category::Media);
        entry.ignore = vec!["scratch".into()];
        let catalog = MediaCatalog::new(&[entry], &SlideshowConfig::default());
        let snapshot = catalog.enumerate();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.items[0].path.ends_with("keep.jpg"));
    }

    #[test]
    fn recurses_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2024").join("july");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("trip.png"), b"x").unwrap();

        let catalog = MediaCatalog::new(
            &[source(dir.path().to_path_buf(), Category::Calendar)],
            &SlideshowConfig::default(),
        );
        let snapshot = catalog.enumerate();
        assert_eq!(snapshot.count_in(Category::Calendar), 1);
    }

    #[test]
    fn disabled_sources_are_not_walked() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();

        let mut entry = source(dir.path().to_path_buf(), Category::Media);
        entry.enabled = false;
        let catalog = MediaCatalog::new(&[entry], &SlideshowConfig::default());
        assert!(catalog.enumerate().is_empty());
    }
}

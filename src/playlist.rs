// SPDX-License-Identifier: MPL-2.0

//! Weighted playlist assembly.
//!
//! A playlist is built in three steps: per-category item targets derived
//! from the resolved weights, sampling without replacement inside each
//! category, and a final shuffle. Exhaustion is handled by building a new
//! playlist, not by reshuffling the old one, so freshly resolved weights
//! and catalog changes take effect at natural boundaries.

use hearthview_config::{Category, WeightSet};
use itertools::Itertools;
use rand::{
    Rng,
    seq::{IndexedRandom, SliceRandom, index},
};

use crate::catalog::{CatalogSnapshot, MediaItem};

#[derive(Debug, Default)]
pub struct Playlist {
    items: Vec<MediaItem>,
}

impl Playlist {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&MediaItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter()
    }
}

/// Build a playlist of up to `size` items from `snapshot` according to the
/// normalized `weights`.
///
/// The result holds `min(size, total available)` items, where availability
/// counts only categories with positive weight. Every positively weighted,
/// non-empty category contributes at least one item whenever the playlist
/// is non-empty. With `shuffle` off, items run in path order.
#[must_use]
pub fn build<R: Rng + ?Sized>(
    weights: &WeightSet,
    snapshot: &CatalogSnapshot,
    size: usize,
    shuffle: bool,
    rng: &mut R,
) -> Playlist {
    let weights = weights.normalized();

    // Categories that can actually contribute, heaviest first.
    let active: Vec<(Category, Vec<&MediaItem>)> = Category::ALL
        .iter()
        .filter(|&&c| weights.get(c) > 0.0)
        .map(|&c| (c, snapshot.in_category(c).collect::<Vec<_>>()))
        .filter(|(_, pool)| !pool.is_empty())
        .sorted_by(|(a, _), (b, _)| {
            weights
                .get(*b)
                .partial_cmp(&weights.get(*a))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .collect();

    if active.is_empty() || size == 0 {
        return Playlist::default();
    }

    let total_available: usize = active.iter().map(|(_, pool)| pool.len()).sum();
    let n = size.min(total_available);

    let targets = category_targets(&weights, &active, n);

    let mut items = Vec::with_capacity(n);
    for ((category, pool), target) in active.iter().zip(&targets) {
        let picked = sample_category(pool, *target, rng);
        tracing::debug!(
            category = category.as_str(),
            target,
            pool = pool.len(),
            "sampled category for playlist"
        );
        items.extend(picked);
    }

    if shuffle {
        items.shuffle(rng);
    } else {
        items.sort_by(|a, b| a.path.cmp(&b.path));
    }

    Playlist { items }
}

/// Per-category item counts summing to exactly `n`.
///
/// Targets start at `round(n * weight)` with a floor of one, are capped at
/// pool size, and the residue is settled against the weight order: deficits
/// fill heaviest-first, surplus drains lightest-first. `active` is sorted
/// heaviest first and `n` never exceeds the summed pool sizes, so the loop
/// always terminates with an exact sum.
fn category_targets(
    weights: &WeightSet,
    active: &[(Category, Vec<&MediaItem>)],
    n: usize,
) -> Vec<usize> {
    let mut targets: Vec<usize> = active
        .iter()
        .map(|(category, pool)| {
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let rounded = (n as f32 * weights.get(*category)).round() as usize;
            rounded.max(1).min(pool.len())
        })
        .collect();

    loop {
        let sum: usize = targets.iter().sum();
        if sum == n {
            break;
        }
        if sum < n {
            // Heaviest category with spare pool takes the extra item.
            let slot = targets
                .iter()
                .enumerate()
                .position(|(i, &t)| t < active[i].1.len());
            match slot {
                Some(i) => targets[i] += 1,
                None => break,
            }
        } else {
            // Lightest category above its floor gives one back; when n is
            // smaller than the category count, floors must yield too.
            let slot = targets
                .iter()
                .rposition(|&t| t > 1)
                .or_else(|| targets.iter().rposition(|&t| t > 0));
            match slot {
                Some(i) => targets[i] -= 1,
                None => break,
            }
        }
    }

    targets
}

/// Sample `target` items from one category's pool without replacement,
/// biased by per-source weight. Uniform sampling is the fallback when the
/// source weights cannot form a distribution.
fn sample_category<R: Rng + ?Sized>(
    pool: &[&MediaItem],
    target: usize,
    rng: &mut R,
) -> Vec<MediaItem> {
    let target = target.min(pool.len());
    if target == 0 {
        return Vec::new();
    }
    if target == pool.len() {
        return pool.iter().map(|item| (*item).clone()).collect();
    }

    match pool.choose_multiple_weighted(rng, target, |item| f64::from(item.source_weight)) {
        Ok(picked) => picked.map(|item| (*item).clone()).collect(),
        Err(_) => index::sample(rng, pool.len(), target)
            .iter()
            .map(|i| pool[i].clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MediaKind;
    use rand::{SeedableRng, rngs::StdRng};
    use std::path::PathBuf;

    fn item(name: &str, category: Category) -> MediaItem {
        MediaItem {
            path: PathBuf::from(format!("/m/{name}")),
            category,
            kind: MediaKind::Image,
            source_weight: 1.0,
            modified: None,
        }
    }

    fn snapshot(counts: &[(Category, usize)]) -> CatalogSnapshot {
        let mut items = Vec::new();
        for &(category, count) in counts {
            for i in 0..count {
                items.push(item(&format!("{}-{i}.jpg", category.as_str()), category));
            }
        }
        CatalogSnapshot {
            items,
            taken_at: None,
        }
    }

    fn weights(media: f32, calendar: f32, weather: f32, web_news: f32) -> WeightSet {
        WeightSet {
            media,
            calendar,
            weather,
            web_news,
        }
    }

    fn count(playlist: &Playlist, category: Category) -> usize {
        playlist.iter().filter(|i| i.category == category).count()
    }

    #[test]
    fn short_pool_spills_into_other_categories() {
        // Calendar earns three slots but only holds two items; the spare
        // slot goes to the heaviest category with capacity.
        let snap = snapshot(&[(Category::Media, 8), (Category::Calendar, 2)]);
        let mut rng = StdRng::seed_from_u64(7);
        let playlist = build(&weights(0.7, 0.3, 0.0, 0.0), &snap, 10, true, &mut rng);

        assert_eq!(playlist.len(), 10);
        assert_eq!(count(&playlist, Category::Media), 8);
        assert_eq!(count(&playlist, Category::Calendar), 2);
    }

    #[test]
    fn targets_follow_the_weight_split() {
        let snap = snapshot(&[(Category::Media, 50), (Category::Calendar, 5)]);
        let mut rng = StdRng::seed_from_u64(12);
        let playlist = build(&weights(0.8, 0.2, 0.0, 0.0), &snap, 10, true, &mut rng);

        assert_eq!(playlist.len(), 10);
        assert_eq!(count(&playlist, Category::Media), 8);
        assert_eq!(count(&playlist, Category::Calendar), 2);
        assert_eq!(count(&playlist, Category::Weather), 0);
        assert_eq!(count(&playlist, Category::WebNews), 0);
    }

    #[test]
    fn tiny_weight_still_gets_one_slot() {
        let snap = snapshot(&[(Category::Media, 50), (Category::Weather, 5)]);
        let mut rng = StdRng::seed_from_u64(1);
        let playlist = build(&weights(0.99, 0.0, 0.01, 0.0), &snap, 20, true, &mut rng);

        assert_eq!(playlist.len(), 20);
        assert!(count(&playlist, Category::Weather) >= 1);
    }

    #[test]
    fn zero_weight_category_is_excluded() {
        let snap = snapshot(&[(Category::Media, 10), (Category::WebNews, 10)]);
        let mut rng = StdRng::seed_from_u64(2);
        let playlist = build(&weights(1.0, 0.0, 0.0, 0.0), &snap, 10, true, &mut rng);

        assert_eq!(count(&playlist, Category::WebNews), 0);
        assert_eq!(playlist.len(), 10);
    }

    #[test]
    fn length_is_capped_by_availability() {
        let snap = snapshot(&[(Category::Media, 3), (Category::Calendar, 2)]);
        let mut rng = StdRng::seed_from_u64(3);
        let playlist = build(&weights(0.5, 0.5, 0.0, 0.0), &snap, 40, true, &mut rng);
        assert_eq!(playlist.len(), 5);
    }

    #[test]
    fn no_duplicates_within_one_build() {
        let snap = snapshot(&[(Category::Media, 30)]);
        let mut rng = StdRng::seed_from_u64(4);
        let playlist = build(&weights(1.0, 0.0, 0.0, 0.0), &snap, 20, true, &mut rng);

        let mut paths: Vec<&PathBuf> = playlist.iter().map(|i| &i.path).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), playlist.len());
    }

    #[test]
    fn seeded_builds_are_reproducible() {
        let snap = snapshot(&[(Category::Media, 25), (Category::Calendar, 12)]);
        let w = weights(0.6, 0.4, 0.0, 0.0);

        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        let first = build(&w, &snap, 15, true, &mut a);
        let second = build(&w, &snap, 15, true, &mut b);

        let lhs: Vec<&PathBuf> = first.iter().map(|i| &i.path).collect();
        let rhs: Vec<&PathBuf> = second.iter().map(|i| &i.path).collect();
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn shuffle_disabled_yields_path_order() {
        let snap = snapshot(&[(Category::Media, 10)]);
        let mut rng = StdRng::seed_from_u64(5);
        let playlist = build(&weights(1.0, 0.0, 0.0, 0.0), &snap, 10, false, &mut rng);

        let paths: Vec<&PathBuf> = playlist.iter().map(|i| &i.path).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn empty_catalog_builds_empty_playlist() {
        let snap = snapshot(&[]);
        let mut rng = StdRng::seed_from_u64(6);
        assert!(build(&WeightSet::equal(), &snap, 10, true, &mut rng).is_empty());
    }

    #[test]
    fn playlist_smaller_than_category_count_drops_floors() {
        let snap = snapshot(&[
            (Category::Media, 5),
            (Category::Calendar, 5),
            (Category::Weather, 5),
            (Category::WebNews, 5),
        ]);
        let mut rng = StdRng::seed_from_u64(8);
        let playlist = build(&WeightSet::equal(), &snap, 2, true, &mut rng);
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn heavier_source_dominates_sampling() {
        let mut items = Vec::new();
        for i in 0..40 {
            let mut it = item(&format!("light-{i}.jpg"), Category::Media);
            it.source_weight = 0.05;
            items.push(it);
        }
        for i in 0..40 {
            let mut it = item(&format!("heavy-{i}.jpg"), Category::Media);
            it.source_weight = 10.0;
            items.push(it);
        }
        let snap = CatalogSnapshot {
            items,
            taken_at: None,
        };

        let mut rng = StdRng::seed_from_u64(11);
        let playlist = build(&weights(1.0, 0.0, 0.0, 0.0), &snap, 20, true, &mut rng);
        let heavy = playlist
            .iter()
            .filter(|i| i.path.to_string_lossy().contains("heavy"))
            .count();
        assert!(heavy > 10, "heavy sources picked {heavy} of 20");
    }
}

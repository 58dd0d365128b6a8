//! Post-search item filtering.

use tracing::debug;

use crate::item::Item;

/// Keep items whose `eo:cloud_cover` is at most `max_cloud_cover` percent.
///
/// Items that don't report cloud cover are dropped.
pub fn filter_by_cloud_cover(items: Vec<Item>, max_cloud_cover: f64) -> Vec<Item> {
    let before = items.len();
    let kept: Vec<Item> = items
        .into_iter()
        .filter(|item| match item.cloud_cover() {
            Some(cover) => cover <= max_cloud_cover,
            None => {
                debug!(item = %item.id, "Dropping item without eo:cloud_cover");
                false
            }
        })
        .collect();

    debug!(
        before = before,
        after = kept.len(),
        max_cloud_cover = max_cloud_cover,
        "Cloud cover filter applied"
    );
    kept
}

/// Order items by capture time, oldest first. Items without a timestamp sort
/// last, ties keep their search order.
pub fn sort_by_datetime(items: &mut [Item]) {
    items.sort_by_key(|item| match item.datetime() {
        Some(dt) => (0, Some(dt)),
        None => (1, None),
    });
}

use crate::model::item::{Item, Timestamp};

/// How long a checked item is kept before the startup prune drops it
pub const CHECKED_RETENTION_HOURS: i64 = 72;

pub fn default_window() -> chrono::Duration {
    chrono::Duration::hours(CHECKED_RETENTION_HOURS)
}

/// Whether `item` has been checked for at least `window` as of `now`.
/// Checked items without a timestamp never expire.
pub fn is_expired(item: &Item, now: Timestamp, window: chrono::Duration) -> bool {
    match (item.checked, item.checked_at) {
        (true, Some(at)) => now.saturating_sub(at) >= window.num_milliseconds(),
        _ => false,
    }
}

/// The subset of `items` to keep, in their stored order.
pub fn retain_unexpired(items: Vec<Item>, now: Timestamp, window: chrono::Duration) -> Vec<Item> {
    items
        .into_iter()
        .filter(|item| !is_expired(item, now, window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 60 * 60 * 1000;

    fn checked_at(name: &str, at: Option<Timestamp>) -> Item {
        let mut item = Item::new(name, 0);
        item.checked = true;
        item.checked_at = at;
        item
    }

    #[test]
    fn boundary_is_inclusive() {
        let t = 1_000 * HOUR;
        let item = checked_at("Milk", Some(t));
        let window = default_window();
        assert!(!is_expired(&item, t + 72 * HOUR - 1, window));
        assert!(is_expired(&item, t + 72 * HOUR, window));
    }

    #[test]
    fn checked_without_timestamp_is_kept() {
        let item = checked_at("Milk", None);
        assert!(!is_expired(&item, i64::MAX, default_window()));
    }

    #[test]
    fn unchecked_is_kept_even_with_stale_timestamp() {
        let mut item = Item::new("Milk", 0);
        item.checked_at = Some(0);
        assert!(!is_expired(&item, 1_000 * HOUR, default_window()));
    }

    #[test]
    fn retain_keeps_order() {
        let now = 100 * HOUR;
        let items = vec![
            Item::new("a", 0),
            checked_at("b", Some(0)),
            checked_at("c", Some(now - HOUR)),
            checked_at("d", None),
        ];
        let kept: Vec<String> = retain_unexpired(items, now, default_window())
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(kept, vec!["a", "c", "d"]);
    }

    #[test]
    fn custom_window() {
        let item = checked_at("Milk", Some(0));
        assert!(is_expired(&item, 24 * HOUR, chrono::Duration::hours(24)));
        assert!(!is_expired(&item, 24 * HOUR, default_window()));
    }
}

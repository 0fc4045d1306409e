use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::io::item_io::StoreError;
use crate::io::storage::Storage;
use crate::model::item::{Item, UNSET_PLACE};
use crate::ops::store::ItemStore;

/// How unchecked items are ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Items with a due date first, earliest first
    #[default]
    Due,
    /// High → mid → low → unset, then as `Due`
    Priority,
    /// Newest first
    Created,
}

/// How unchecked items are grouped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// A single unnamed group
    #[default]
    All,
    /// One group per place label
    Place,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid {what}: {value}")]
pub struct ParseSelectionError {
    what: &'static str,
    value: String,
}

impl FromStr for SortMode {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "due" => Ok(SortMode::Due),
            "priority" => Ok(SortMode::Priority),
            "created" => Ok(SortMode::Created),
            other => Err(ParseSelectionError {
                what: "sort mode",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Scope {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Scope::All),
            "place" => Ok(Scope::Place),
            other => Err(ParseSelectionError {
                what: "scope",
                value: other.to_string(),
            }),
        }
    }
}

/// Current sort/filter selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListState {
    pub sort: SortMode,
    pub scope: Scope,
    /// Place label to show when scoped by place (None = all places)
    pub place_filter: Option<String>,
}

/// A titled run of items in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<'a> {
    /// Group title (empty for the unscoped group)
    pub title: String,
    pub items: Vec<&'a Item>,
}

/// What the renderer is asked to draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView<'a> {
    pub groups: Vec<Group<'a>>,
    /// Checked items, kept until the retention window passes
    pub checked: Vec<&'a Item>,
    /// Place labels available for filtering
    pub place_options: Vec<String>,
}

impl ListView<'_> {
    pub fn active_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

fn by_due(a: &Item, b: &Item) -> Ordering {
    let a_has = !a.due_date.is_empty();
    let b_has = !b.due_date.is_empty();
    match (a_has, b_has) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.due_date.cmp(&b.due_date),
    }
}

/// Sort a list of items (stable) by the given mode
pub fn sort_items(items: &mut [&Item], mode: SortMode) {
    match mode {
        SortMode::Due => items.sort_by(|a, b| by_due(a, b)),
        SortMode::Priority => items.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then_with(|| by_due(a, b))
        }),
        SortMode::Created => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

/// Sorted distinct place labels of unchecked items
pub fn place_filter_options(items: &[Item]) -> Vec<String> {
    let mut labels: Vec<String> = items
        .iter()
        .filter(|i| !i.checked)
        .map(|i| i.place_label().to_string())
        .collect();
    labels.sort_by(|a, b| collate(a, b));
    labels.dedup();
    labels
}

/// Display order for labels: letters compare without regard to case,
/// then by code point (Latin, kana, kanji).
fn collate(a: &str, b: &str) -> Ordering {
    let folded = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<String>();
    folded(a).cmp(&folded(b)).then_with(|| a.cmp(b))
}

impl ListState {
    /// Drop a place filter that no longer matches any unchecked item
    pub fn reconcile_place_filter(&mut self, items: &[Item]) {
        if let Some(filter) = &self.place_filter
            && !place_filter_options(items).contains(filter)
        {
            self.place_filter = None;
        }
    }
}

/// Build the view for the current selection. Call
/// `ListState::reconcile_place_filter` first so a stale filter resets.
pub fn build_view<'a>(items: &'a [Item], state: &ListState) -> ListView<'a> {
    let mut active: Vec<&Item> = items.iter().filter(|i| !i.checked).collect();
    sort_items(&mut active, state.sort);

    let groups = match state.scope {
        Scope::All => vec![Group {
            title: String::new(),
            items: active,
        }],
        Scope::Place => {
            let mut groups: Vec<Group<'a>> = Vec::new();
            for item in active {
                let label = item.place_label();
                if state.place_filter.as_deref().is_some_and(|f| f != label) {
                    continue;
                }
                match groups.iter_mut().find(|g| g.title == label) {
                    Some(group) => group.items.push(item),
                    None => groups.push(Group {
                        title: label.to_string(),
                        items: vec![item],
                    }),
                }
            }
            groups
        }
    };

    ListView {
        groups,
        checked: items.iter().filter(|i| i.checked).collect(),
        place_options: place_filter_options(items),
    }
}

/// Rename every item whose place label is `label`. The unset label
/// addresses items with no place; renaming to it clears the place.
/// Returns the number of items changed.
pub fn rename_place_group<S: Storage>(
    store: &mut ItemStore<S>,
    label: &str,
    new_place: &str,
) -> Result<usize, StoreError> {
    let trimmed = new_place.trim();
    let new_place = if trimmed == UNSET_PLACE { "" } else { trimmed };
    store.modify_all(|item| {
        if item.place_label() == label && item.place != new_place {
            item.place = new_place.to_string();
            true
        } else {
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::storage::MemoryStorage;
    use crate::model::item::{ItemPatch, Priority};
    use pretty_assertions::assert_eq;

    fn item(name: &str, due: &str, priority: Priority, created: i64, place: &str) -> Item {
        let mut item = Item::new(name, created);
        item.due_date = due.into();
        item.priority = priority;
        item.place = place.into();
        item
    }

    fn names(items: &[&Item]) -> Vec<String> {
        items.iter().map(|i| i.name.clone()).collect()
    }

    fn sample() -> Vec<Item> {
        vec![
            item("a", "", Priority::High, 1, "Market"),
            item("b", "2025-06-02", Priority::Low, 2, ""),
            item("c", "2025-06-01", Priority::Unset, 3, "Market"),
            item("d", "", Priority::Mid, 4, "Pharmacy"),
        ]
    }

    #[test]
    fn due_sort_puts_dated_items_first() {
        let items = sample();
        let mut refs: Vec<&Item> = items.iter().collect();
        sort_items(&mut refs, SortMode::Due);
        assert_eq!(names(&refs), vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn priority_sort_breaks_ties_by_due() {
        let mut items = sample();
        items.push(item("e", "2025-01-01", Priority::High, 5, ""));
        let mut refs: Vec<&Item> = items.iter().collect();
        sort_items(&mut refs, SortMode::Priority);
        assert_eq!(names(&refs), vec!["e", "a", "d", "b", "c"]);
    }

    #[test]
    fn created_sort_is_newest_first() {
        let items = sample();
        let mut refs: Vec<&Item> = items.iter().collect();
        sort_items(&mut refs, SortMode::Created);
        assert_eq!(names(&refs), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn checked_items_go_to_trailing_group() {
        let mut items = sample();
        items[0].set_checked(true, 10);
        let view = build_view(&items, &ListState::default());
        assert_eq!(view.groups.len(), 1);
        assert_eq!(names(&view.groups[0].items), vec!["c", "b", "d"]);
        assert_eq!(names(&view.checked), vec!["a"]);
        assert_eq!(view.active_count(), 3);
    }

    #[test]
    fn place_scope_groups_in_sorted_order() {
        let items = sample();
        let state = ListState {
            scope: Scope::Place,
            ..Default::default()
        };
        let view = build_view(&items, &state);
        let titles: Vec<&str> = view.groups.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Market", UNSET_PLACE, "Pharmacy"]);
        assert_eq!(names(&view.groups[0].items), vec!["c", "a"]);
    }

    #[test]
    fn place_filter_limits_groups() {
        let items = sample();
        let state = ListState {
            scope: Scope::Place,
            place_filter: Some(UNSET_PLACE.to_string()),
            ..Default::default()
        };
        let view = build_view(&items, &state);
        assert_eq!(view.groups.len(), 1);
        assert_eq!(names(&view.groups[0].items), vec!["b"]);
    }

    #[test]
    fn stale_place_filter_resets() {
        let mut items = sample();
        let mut state = ListState {
            scope: Scope::Place,
            place_filter: Some("Pharmacy".into()),
            ..Default::default()
        };
        state.reconcile_place_filter(&items);
        assert_eq!(state.place_filter.as_deref(), Some("Pharmacy"));

        items[3].set_checked(true, 1);
        state.reconcile_place_filter(&items);
        assert_eq!(state.place_filter, None);
    }

    #[test]
    fn place_options_are_sorted_and_distinct() {
        let items = sample();
        assert_eq!(
            place_filter_options(&items),
            vec![UNSET_PLACE.to_string(), "Market".into(), "Pharmacy".into()]
        );
    }

    #[test]
    fn place_options_ignore_case_and_put_kana_after_latin() {
        let items: Vec<Item> = ["スーパー", "market", "Bakery", "薬局", "Market"]
            .iter()
            .map(|p| item("x", "", Priority::Unset, 0, p))
            .collect();
        assert_eq!(
            place_filter_options(&items),
            vec!["Bakery", "Market", "market", "スーパー", "薬局"]
        );
    }

    #[test]
    fn rename_unset_group_assigns_place() {
        let mut store = ItemStore::open(MemoryStorage::new(), "items").unwrap();
        store.upsert(None, ItemPatch::named("Tape"), 0).unwrap();
        store
            .upsert(
                None,
                ItemPatch {
                    name: Some("Soap".into()),
                    place: Some("Market".into()),
                    ..Default::default()
                },
                0,
            )
            .unwrap();
        assert_eq!(rename_place_group(&mut store, UNSET_PLACE, " Hardware ").unwrap(), 1);
        assert_eq!(store.items()[1].place, "Hardware");

        assert_eq!(rename_place_group(&mut store, "Market", UNSET_PLACE).unwrap(), 1);
        assert_eq!(store.items()[0].place, "");
    }

    #[test]
    fn selection_parsing() {
        assert_eq!("priority".parse::<SortMode>().unwrap(), SortMode::Priority);
        assert_eq!("place".parse::<Scope>().unwrap(), Scope::Place);
        assert!("size".parse::<SortMode>().is_err());
    }
}

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::Serialize;

use crate::io::item_io::StoreError;
use crate::io::storage::Storage;
use crate::model::item::Item;
use crate::ops::store::ItemStore;

/// Which history list a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Names,
    SpecLabels,
    Places,
}

impl HistoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryKind::Names => "names",
            HistoryKind::SpecLabels => "specs",
            HistoryKind::Places => "places",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown history kind: {0} (expected names, specs or places)")]
pub struct UnknownHistoryKind(pub String);

impl FromStr for HistoryKind {
    type Err = UnknownHistoryKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "names" | "name" | "historyNames" => Ok(HistoryKind::Names),
            "specs" | "spec" | "details" | "historyDetails" => Ok(HistoryKind::SpecLabels),
            "places" | "place" | "historyPlaces" => Ok(HistoryKind::Places),
            other => Err(UnknownHistoryKind(other.to_string())),
        }
    }
}

/// Distinct previously used values, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct History {
    pub names: IndexSet<String>,
    pub spec_labels: IndexSet<String>,
    pub places: IndexSet<String>,
}

impl History {
    /// Collect all three lists in one pass
    pub fn collect(items: &[Item]) -> Self {
        let mut history = History::default();
        for item in items {
            if !item.name.is_empty() {
                history.names.insert(item.name.clone());
            }
            for spec in &item.specs {
                if !spec.name.is_empty() {
                    history.spec_labels.insert(spec.name.clone());
                }
            }
            if !item.place.is_empty() {
                history.places.insert(item.place.clone());
            }
        }
        history
    }

    pub fn values(&self, kind: HistoryKind) -> &IndexSet<String> {
        match kind {
            HistoryKind::Names => &self.names,
            HistoryKind::SpecLabels => &self.spec_labels,
            HistoryKind::Places => &self.places,
        }
    }
}

pub fn distinct_names(items: &[Item]) -> IndexSet<String> {
    History::collect(items).names
}

pub fn distinct_spec_labels(items: &[Item]) -> IndexSet<String> {
    History::collect(items).spec_labels
}

pub fn distinct_places(items: &[Item]) -> IndexSet<String> {
    History::collect(items).places
}

/// Rewrite one value in place. Returns true if the item changed.
fn rename_in_item(item: &mut Item, kind: HistoryKind, old: &str, new: &str) -> bool {
    match kind {
        HistoryKind::Names => {
            if item.name == old {
                item.name = new.to_string();
                return true;
            }
            false
        }
        HistoryKind::Places => {
            if item.place == old {
                item.place = new.to_string();
                return true;
            }
            false
        }
        HistoryKind::SpecLabels => {
            let mut changed = false;
            for spec in item.specs.iter_mut().filter(|s| s.name == old) {
                spec.name = new.to_string();
                changed = true;
            }
            changed
        }
    }
}

/// Rename every occurrence of `old` to `new` for the given kind. An empty
/// `new`, or one equal to `old`, is a no-op. Returns the number of items
/// touched.
pub fn rename<S: Storage>(
    store: &mut ItemStore<S>,
    kind: HistoryKind,
    old: &str,
    new: &str,
) -> Result<usize, StoreError> {
    if new.is_empty() || old == new {
        return Ok(0);
    }
    let changed = store.modify_all(|item| rename_in_item(item, kind, old, new))?;
    tracing::info!(%kind, old, new, changed, "renamed history value");
    Ok(changed)
}

/// Forget history values. Names delete the matching items outright,
/// places are cleared on matching items, and spec labels drop only the
/// matching spec rows. Returns the number of items removed or touched.
pub fn purge<S: Storage>(
    store: &mut ItemStore<S>,
    kind: HistoryKind,
    values: &[String],
) -> Result<usize, StoreError> {
    if values.is_empty() {
        return Ok(0);
    }
    let hit = |v: &str| values.iter().any(|x| x == v);
    let count = match kind {
        HistoryKind::Names => store.remove_where(|item| hit(&item.name))?,
        HistoryKind::Places => store.modify_all(|item| {
            if hit(&item.place) {
                item.place.clear();
                true
            } else {
                false
            }
        })?,
        HistoryKind::SpecLabels => store.modify_all(|item| {
            let before = item.specs.len();
            item.specs.retain(|s| !hit(&s.name));
            item.specs.len() != before
        })?,
    };
    tracing::info!(%kind, values = values.len(), count, "purged history values");
    Ok(count)
}

use crate::io::item_io::{self, StoreError};
use crate::io::storage::Storage;
use crate::model::item::{CheckSnapshot, Item, ItemId, ItemPatch, Timestamp};
use crate::ops::retention;

/// In-memory item collection mirrored to durable storage. Every mutation
/// goes through here and is persisted before returning.
pub struct ItemStore<S: Storage> {
    items: Vec<Item>,
    storage: S,
    key: String,
}

impl<S: Storage> ItemStore<S> {
    /// Open the store and load whatever is persisted under `key`
    pub fn open(storage: S, key: impl Into<String>) -> Result<Self, StoreError> {
        let mut store = ItemStore {
            items: Vec::new(),
            storage,
            key: key.into(),
        };
        store.load()?;
        Ok(store)
    }

    /// Replace the in-memory collection with the persisted one
    pub fn load(&mut self) -> Result<(), StoreError> {
        self.items = item_io::load_items(&self.storage, &self.key)?;
        tracing::debug!(count = self.items.len(), key = %self.key, "loaded items");
        Ok(())
    }

    /// Persist the full collection
    pub fn save(&mut self) -> Result<(), StoreError> {
        item_io::save_items(&mut self.storage, &self.key, &self.items)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Drop items checked for at least `window`. Returns how many were
    /// removed; persists only when something changed.
    pub fn prune(&mut self, now: Timestamp, window: chrono::Duration) -> Result<usize, StoreError> {
        let before = self.items.len();
        let items = std::mem::take(&mut self.items);
        self.items = retention::retain_unexpired(items, now, window);
        let removed = before - self.items.len();
        if removed > 0 {
            tracing::info!(removed, "pruned expired checked items");
            self.save()?;
        }
        Ok(removed)
    }

    /// Merge `patch` over the item with `id`, or insert a new item at the
    /// front when no such item exists. Returns the item's id.
    pub fn upsert(
        &mut self,
        id: Option<&str>,
        patch: ItemPatch,
        now: Timestamp,
    ) -> Result<ItemId, StoreError> {
        if let Some(id) = id
            && let Some(item) = self.items.iter_mut().find(|i| i.id == id)
        {
            if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                return Err(StoreError::EmptyName);
            }
            patch.apply_to(item);
            item.name = item.name.trim().to_string();
            let id = item.id.clone();
            self.save()?;
            return Ok(id);
        }

        let name = patch
            .name
            .as_deref()
            .map(|n| n.trim().to_string())
            .unwrap_or_default();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let mut item = Item::new(String::new(), now);
        if let Some(id) = id {
            item.id = id.to_string();
        }
        patch.apply_to(&mut item);
        item.name = name;
        let new_id = item.id.clone();
        self.items.insert(0, item);
        self.save()?;
        Ok(new_id)
    }

    /// Remove one item. Returns false if it did not exist.
    pub fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        if self.items.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Remove every item matching `pred`. Returns the number removed.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Result<usize, StoreError>
    where
        F: FnMut(&Item) -> bool,
    {
        let before = self.items.len();
        self.items.retain(|i| !pred(i));
        let removed = before - self.items.len();
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    /// Mutate one item in place. `f` reports whether it changed anything;
    /// returns None if the item does not exist.
    pub fn modify<F>(&mut self, id: &str, f: F) -> Result<Option<bool>, StoreError>
    where
        F: FnOnce(&mut Item) -> bool,
    {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        let changed = f(item);
        if changed {
            self.save()?;
        }
        Ok(Some(changed))
    }

    /// Mutate every item; `f` reports per item whether it changed. Saves
    /// once. Returns the number of changed items.
    pub fn modify_all<F>(&mut self, mut f: F) -> Result<usize, StoreError>
    where
        F: FnMut(&mut Item) -> bool,
    {
        let mut changed = 0;
        for item in &mut self.items {
            if f(item) {
                changed += 1;
            }
        }
        if changed > 0 {
            self.save()?;
        }
        Ok(changed)
    }

    /// Check or uncheck one item. Returns the snapshot taken before the
    /// change, or None if the item does not exist.
    pub fn set_checked(
        &mut self,
        id: &str,
        checked: bool,
        now: Timestamp,
    ) -> Result<Option<CheckSnapshot>, StoreError> {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        let before = item.check_snapshot();
        item.set_checked(checked, now);
        self.save()?;
        Ok(Some(before))
    }

    /// Check every item matching `pred` with a shared timestamp. Returns
    /// snapshots of the matched items taken before the change.
    pub fn check_where<F>(&mut self, mut pred: F, now: Timestamp) -> Result<Vec<CheckSnapshot>, StoreError>
    where
        F: FnMut(&Item) -> bool,
    {
        let mut snapshots = Vec::new();
        for item in self.items.iter_mut().filter(|i| pred(&**i)) {
            snapshots.push(item.check_snapshot());
            item.set_checked(true, now);
        }
        if !snapshots.is_empty() {
            self.save()?;
        }
        Ok(snapshots)
    }

    /// Reapply captured checked states. Ids that no longer exist are
    /// skipped. Saves once; returns how many snapshots were applied.
    pub fn restore_checked(
        &mut self,
        snapshots: &[CheckSnapshot],
        now: Timestamp,
    ) -> Result<usize, StoreError> {
        let mut applied = 0;
        for snap in snapshots {
            if let Some(item) = self.items.iter_mut().find(|i| i.id == snap.id) {
                item.restore_checked(snap.checked, snap.checked_at, now);
                applied += 1;
            } else {
                tracing::debug!(id = %snap.id, "skipping restore for missing item");
            }
        }
        if applied > 0 {
            self.save()?;
        }
        Ok(applied)
    }
}

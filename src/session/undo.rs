use std::collections::VecDeque;

use crate::io::item_io::StoreError;
use crate::io::storage::Storage;
use crate::model::item::{CheckSnapshot, Timestamp};
use crate::ops::store::ItemStore;

use super::surface::{FieldId, Surfaces};
use super::tracker::FieldTracker;

pub const UNDO_CAPACITY: usize = 3;

/// A single reversible change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEntry {
    /// A form field was edited; `previous` is the value before the edit
    FieldEdit { field: FieldId, previous: String },
    /// One item's checked state was toggled
    Check(CheckSnapshot),
    /// Several items were checked at once
    BulkCheck(Vec<CheckSnapshot>),
}

/// What an applied undo touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A field value was restored and focused
    Field(FieldId),
    /// Items' checked state was restored and persisted
    Items(usize),
}

/// Everything an undo entry may need to reverse itself
pub struct UndoContext<'a, S: Storage> {
    pub store: &'a mut ItemStore<S>,
    pub surfaces: &'a mut Surfaces,
    pub tracker: &'a mut FieldTracker,
    pub now: Timestamp,
}

impl UndoEntry {
    /// Reverse this entry. `Ok(None)` means its target is gone and the
    /// entry should be discarded. Bulk entries always apply.
    pub fn apply<S: Storage>(
        &self,
        ctx: &mut UndoContext<'_, S>,
    ) -> Result<Option<Applied>, StoreError> {
        match self {
            UndoEntry::FieldEdit { field, previous } => {
                if !ctx.surfaces.set_value(*field, previous) {
                    return Ok(None);
                }
                ctx.tracker.resync(*field, previous);
                ctx.surfaces.focus(*field);
                Ok(Some(Applied::Field(*field)))
            }
            UndoEntry::Check(snapshot) => {
                let restored = ctx
                    .store
                    .restore_checked(std::slice::from_ref(snapshot), ctx.now)?;
                Ok((restored > 0).then_some(Applied::Items(restored)))
            }
            // Consumes the undo step even when every item is gone
            UndoEntry::BulkCheck(snapshots) => {
                let restored = ctx.store.restore_checked(snapshots, ctx.now)?;
                if restored == 0 {
                    ctx.store.save()?;
                }
                Ok(Some(Applied::Items(restored)))
            }
        }
    }
}

/// Bounded undo buffer. Recording past capacity evicts the oldest entry;
/// undo takes the newest.
#[derive(Debug, Default)]
pub struct UndoBuffer {
    entries: VecDeque<UndoEntry>,
}

impl UndoBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: UndoEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > UNDO_CAPACITY {
            self.entries.pop_front();
        }
    }

    /// Pop entries newest-first until one applies. Entries whose target
    /// no longer exists are discarded along the way.
    pub fn undo<S: Storage>(
        &mut self,
        ctx: &mut UndoContext<'_, S>,
    ) -> Result<Option<Applied>, StoreError> {
        while let Some(entry) = self.entries.pop_back() {
            match entry.apply(ctx)? {
                Some(applied) => return Ok(Some(applied)),
                None => tracing::debug!(?entry, "discarding stale undo entry"),
            }
        }
        Ok(None)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn peek_last(&self) -> Option<&UndoEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UndoEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::storage::MemoryStorage;
    use crate::model::item::ItemPatch;
    use crate::session::surface::{FieldKind, FieldSpec, SurfaceKind};

    struct World {
        store: ItemStore<MemoryStorage>,
        surfaces: Surfaces,
        tracker: FieldTracker,
    }

    impl World {
        fn new() -> Self {
            World {
                store: ItemStore::open(MemoryStorage::new(), "items").unwrap(),
                surfaces: Surfaces::new(),
                tracker: FieldTracker::new(),
            }
        }

        fn undo(&mut self, buffer: &mut UndoBuffer, now: Timestamp) -> Option<Applied> {
            let mut ctx = UndoContext {
                store: &mut self.store,
                surfaces: &mut self.surfaces,
                tracker: &mut self.tracker,
                now,
            };
            buffer.undo(&mut ctx).unwrap()
        }
    }

    fn snap(id: &str) -> UndoEntry {
        UndoEntry::Check(CheckSnapshot {
            id: id.into(),
            checked: false,
            checked_at: None,
        })
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut buffer = UndoBuffer::new();
        for id in ["1", "2", "3", "4"] {
            buffer.record(snap(id));
        }
        assert_eq!(buffer.len(), UNDO_CAPACITY);
        let ids: Vec<&str> = buffer
            .iter()
            .map(|e| match e {
                UndoEntry::Check(s) => s.id.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec!["2", "3", "4"]);
    }

    #[test]
    fn undo_on_empty_buffer_does_nothing() {
        let mut world = World::new();
        let mut buffer = UndoBuffer::new();
        assert_eq!(world.undo(&mut buffer, 0), None);
        assert_eq!(world.store.storage().write_count(), 0);
    }

    #[test]
    fn single_check_restores_and_persists() {
        let mut world = World::new();
        let id = world.store.upsert(None, ItemPatch::named("Milk"), 0).unwrap();
        let before = world.store.set_checked(&id, true, 10).unwrap().unwrap();
        let mut buffer = UndoBuffer::new();
        buffer.record(UndoEntry::Check(before));

        let writes = world.store.storage().write_count();
        assert_eq!(world.undo(&mut buffer, 20), Some(Applied::Items(1)));
        let item = world.store.get(&id).unwrap();
        assert!(!item.checked);
        assert_eq!(item.checked_at, None);
        assert_eq!(world.store.storage().write_count(), writes + 1);
    }

    #[test]
    fn missing_item_is_discarded_and_popping_continues() {
        let mut world = World::new();
        let keep = world.store.upsert(None, ItemPatch::named("Milk"), 0).unwrap();
        let gone = world.store.upsert(None, ItemPatch::named("Eggs"), 0).unwrap();
        let mut buffer = UndoBuffer::new();
        buffer.record(UndoEntry::Check(world.store.set_checked(&keep, true, 5).unwrap().unwrap()));
        buffer.record(UndoEntry::Check(world.store.set_checked(&gone, true, 5).unwrap().unwrap()));
        world.store.remove(&gone).unwrap();

        assert_eq!(world.undo(&mut buffer, 9), Some(Applied::Items(1)));
        assert!(buffer.is_empty());
        assert!(!world.store.get(&keep).unwrap().checked);
    }

    #[test]
    fn bulk_skips_missing_ids_and_saves_once() {
        let mut world = World::new();
        let a = world.store.upsert(None, ItemPatch::named("a"), 0).unwrap();
        let b = world.store.upsert(None, ItemPatch::named("b"), 0).unwrap();
        let snaps = world.store.check_where(|_| true, 5).unwrap();
        world.store.remove(&a).unwrap();
        let mut buffer = UndoBuffer::new();
        buffer.record(UndoEntry::BulkCheck(snaps));

        let writes = world.store.storage().write_count();
        assert_eq!(world.undo(&mut buffer, 9), Some(Applied::Items(1)));
        assert_eq!(world.store.storage().write_count(), writes + 1);
        assert!(!world.store.get(&b).unwrap().checked);
    }

    #[test]
    fn bulk_with_all_items_gone_still_consumes_the_step() {
        let mut world = World::new();
        let x = world.store.upsert(None, ItemPatch::named("x"), 0).unwrap();
        let y = world.store.upsert(None, ItemPatch::named("y"), 0).unwrap();
        let mut buffer = UndoBuffer::new();
        buffer.record(UndoEntry::Check(world.store.set_checked(&x, true, 5).unwrap().unwrap()));
        let snaps = world.store.check_where(|i| i.id == y, 6).unwrap();
        buffer.record(UndoEntry::BulkCheck(snaps));
        world.store.remove(&y).unwrap();

        let writes = world.store.storage().write_count();
        assert_eq!(world.undo(&mut buffer, 9), Some(Applied::Items(0)));
        assert_eq!(world.store.storage().write_count(), writes + 1);
        // The older single check is untouched and still undoable
        assert!(world.store.get(&x).unwrap().checked);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn field_edit_restores_value_baseline_and_focus() {
        let mut world = World::new();
        let sid = world.surfaces.mount(
            SurfaceKind::EditDialog,
            vec![FieldSpec::new(FieldKind::Text, "editPlace", "B")],
        );
        let field = world.surfaces.surface(sid).unwrap().fields()[0].id;
        world.tracker.resync(field, "B");
        let mut buffer = UndoBuffer::new();
        buffer.record(UndoEntry::FieldEdit {
            field,
            previous: "A".into(),
        });

        assert_eq!(world.undo(&mut buffer, 0), Some(Applied::Field(field)));
        assert_eq!(world.surfaces.field(field).unwrap().value, "A");
        assert_eq!(world.tracker.baseline(field), Some("A"));
        assert_eq!(world.surfaces.focused(), Some(field));
    }

    #[test]
    fn dead_field_is_discarded() {
        let mut world = World::new();
        let sid = world.surfaces.mount(
            SurfaceKind::EditDialog,
            vec![FieldSpec::new(FieldKind::Text, "editPlace", "B")],
        );
        let field = world.surfaces.surface(sid).unwrap().fields()[0].id;
        world.surfaces.unmount(sid);
        let mut buffer = UndoBuffer::new();
        buffer.record(UndoEntry::FieldEdit {
            field,
            previous: "A".into(),
        });
        assert_eq!(world.undo(&mut buffer, 0), None);
        assert!(buffer.is_empty());
    }
}

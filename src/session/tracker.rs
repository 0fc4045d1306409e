use std::collections::HashMap;

use super::surface::{Field, FieldId, Surface, Surfaces};
use super::undo::{UndoBuffer, UndoEntry};

/// Last observed value per live field. Keyed by field identity; entries
/// for fields that were torn down are swept and never consulted again.
#[derive(Debug, Default)]
pub struct FieldTracker {
    last: HashMap<FieldId, String>,
}

impl FieldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed every tracked field of a freshly mounted surface with its
    /// current value, replacing any previous baseline.
    pub fn register_inputs(&mut self, surface: &Surface) {
        for field in surface.fields().iter().filter(|f| f.kind.is_tracked()) {
            self.last.insert(field.id, field.value.clone());
        }
    }

    /// Focus on an unseen field establishes its baseline.
    pub fn observe_focus(&mut self, field: &Field) {
        if field.kind.is_tracked() {
            self.last
                .entry(field.id)
                .or_insert_with(|| field.value.clone());
        }
    }

    /// Compare the field's current value with its baseline. When it
    /// differs, record the old value in `undo` and move the baseline.
    /// Returns whether an undo entry was recorded.
    pub fn record_change(&mut self, field: &Field, undo: &mut UndoBuffer) -> bool {
        if !field.kind.is_tracked() {
            return false;
        }
        let Some(prev) = self.last.get_mut(&field.id) else {
            self.last.insert(field.id, field.value.clone());
            return false;
        };
        if *prev == field.value {
            return false;
        }
        let previous = std::mem::replace(prev, field.value.clone());
        undo.record(UndoEntry::FieldEdit {
            field: field.id,
            previous,
        });
        true
    }

    /// Force the baseline (after undo restores a value)
    pub fn resync(&mut self, id: FieldId, value: &str) {
        self.last.insert(id, value.to_string());
    }

    pub fn baseline(&self, id: FieldId) -> Option<&str> {
        self.last.get(&id).map(String::as_str)
    }

    /// Drop entries whose field is no longer mounted. Returns the number
    /// dropped.
    pub fn sweep(&mut self, surfaces: &Surfaces) -> usize {
        let before = self.last.len();
        self.last.retain(|id, _| surfaces.contains(*id));
        before - self.last.len()
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

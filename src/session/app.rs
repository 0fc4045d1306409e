use chrono::Duration;

use crate::io::item_io::StoreError;
use crate::io::storage::Storage;
use crate::model::config::Config;
use crate::model::item::{
    CheckSnapshot, Item, ItemId, ItemPatch, MAX_SPECS, Priority, Spec, Timestamp,
};
use crate::ops::history::{self, History, HistoryKind};
use crate::ops::list_view::{self, ListState, ListView, Scope, SortMode};
use crate::ops::retention;
use crate::ops::store::ItemStore;

use super::surface::{FieldId, FieldKind, FieldSpec, Surface, SurfaceId, SurfaceKind, Surfaces};
use super::tracker::FieldTracker;
use super::undo::{Applied, UndoBuffer, UndoContext, UndoEntry};

/// Receives the list after every change that alters what is displayed.
pub trait Renderer {
    fn render(&mut self, view: &ListView<'_>, history: &History);
}

/// Renderer that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _view: &ListView<'_>, _history: &History) {}
}

/// Startup knobs, usually taken from `Config`
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub list: ListState,
    pub retention: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            list: ListState::default(),
            retention: retention::default_window(),
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        SessionOptions {
            list: ListState {
                sort: config.list.sort,
                scope: config.list.scope,
                place_filter: None,
            },
            retention: config.retention.window(),
        }
    }
}

/// Where attached image payloads go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTarget {
    /// Held until the register form is submitted
    RegisterForm,
    Item(ItemId),
}

#[derive(Debug, Clone)]
struct Dialog {
    surface: SurfaceId,
    item_id: ItemId,
}

// Field names of a spec row, per surface
const REGISTER_SPEC: [&str; 3] = ["specName", "specText", "specUnit"];
const DIALOG_SPEC: [&str; 3] = ["editSpecName", "editSpecText", "editSpecUnit"];

fn spec_row(names: [&str; 3], spec: &Spec) -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(FieldKind::Text, names[0], spec.name.as_str()),
        FieldSpec::new(FieldKind::TextArea, names[1], spec.text.as_str()),
        FieldSpec::new(FieldKind::Select, names[2], spec.unit.as_str()),
    ]
}

fn spec_rows(names: [&str; 3], specs: &[Spec]) -> Vec<FieldSpec> {
    if specs.is_empty() {
        return spec_row(names, &Spec::default());
    }
    specs.iter().flat_map(|s| spec_row(names, s)).collect()
}

fn register_fields(item: Option<&Item>) -> Vec<FieldSpec> {
    let blank = Item::new(String::new(), 0);
    let item = item.unwrap_or(&blank);
    let mut fields = vec![
        FieldSpec::new(FieldKind::Text, "name", item.name.as_str()),
        FieldSpec::new(FieldKind::Select, "qty", item.qty.to_string()),
        FieldSpec::new(FieldKind::Select, "unit", item.unit.as_str()),
    ];
    fields.extend(spec_rows(REGISTER_SPEC, &item.specs));
    fields.extend([
        FieldSpec::new(FieldKind::Text, "place", item.place.as_str()),
        FieldSpec::new(FieldKind::Date, "dueDate", item.due_date.as_str()),
        FieldSpec::new(FieldKind::Time, "dueTime", item.due_time.as_str()),
        FieldSpec::new(FieldKind::Select, "priority", item.priority.as_str()),
        FieldSpec::new(FieldKind::TextArea, "url", item.url.as_str()),
        FieldSpec::new(FieldKind::File, "images", ""),
    ]);
    fields
}

fn dialog_fields(item: &Item) -> Vec<FieldSpec> {
    let mut fields = vec![
        FieldSpec::new(FieldKind::Text, "title", item.name.as_str()),
        FieldSpec::new(FieldKind::Select, "editQty", item.qty.to_string()),
    ];
    fields.extend(spec_rows(DIALOG_SPEC, &item.specs));
    fields.extend([
        FieldSpec::new(FieldKind::Text, "editPlace", item.place.as_str()),
        FieldSpec::new(FieldKind::Date, "editDueDate", item.due_date.as_str()),
        FieldSpec::new(FieldKind::Time, "editDueTime", item.due_time.as_str()),
        FieldSpec::new(FieldKind::Select, "editPriority", item.priority.as_str()),
        FieldSpec::new(FieldKind::TextArea, "editUrl", item.url.as_str()),
    ]);
    fields
}

fn read_specs(surface: &Surface, names: [&str; 3]) -> Vec<Spec> {
    let labels = surface.values(names[0]);
    let texts = surface.values(names[1]);
    let units = surface.values(names[2]);
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| Spec {
            name: label.to_string(),
            text: texts.get(i).copied().unwrap_or_default().to_string(),
            unit: units.get(i).copied().unwrap_or_default().to_string(),
        })
        .collect()
}

fn read_qty(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(1).max(1)
}

/// Process-wide application state: the item store, the list selection,
/// the mounted surfaces and the undo machinery. `start` is the single
/// reset point.
pub struct Session<S: Storage, R: Renderer> {
    store: ItemStore<S>,
    list: ListState,
    undo: UndoBuffer,
    tracker: FieldTracker,
    surfaces: Surfaces,
    renderer: R,
    register: SurfaceId,
    edit_id: Option<ItemId>,
    dialog: Option<Dialog>,
    pending_images: Vec<String>,
}

impl<S: Storage, R: Renderer> Session<S, R> {
    /// Prune expired checked items, mount an empty register form and draw
    /// the initial list.
    pub fn start(
        store: ItemStore<S>,
        renderer: R,
        options: SessionOptions,
        now: Timestamp,
    ) -> Result<Self, StoreError> {
        let mut store = store;
        store.prune(now, options.retention)?;

        let mut surfaces = Surfaces::new();
        let register = surfaces.mount(SurfaceKind::RegisterForm, register_fields(None));
        let mut session = Session {
            store,
            list: options.list,
            undo: UndoBuffer::new(),
            tracker: FieldTracker::new(),
            surfaces,
            renderer,
            register,
            edit_id: None,
            dialog: None,
            pending_images: Vec::new(),
        };
        session.register_surface_inputs(register);
        session.render();
        Ok(session)
    }

    // --- accessors

    pub fn store(&self) -> &ItemStore<S> {
        &self.store
    }

    pub fn items(&self) -> &[Item] {
        self.store.items()
    }

    pub fn list_state(&self) -> &ListState {
        &self.list
    }

    pub fn undo_buffer(&self) -> &UndoBuffer {
        &self.undo
    }

    pub fn tracker(&self) -> &FieldTracker {
        &self.tracker
    }

    pub fn surfaces(&self) -> &Surfaces {
        &self.surfaces
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn register_form(&self) -> Option<&Surface> {
        self.surfaces.surface(self.register)
    }

    pub fn dialog_surface(&self) -> Option<&Surface> {
        self.surfaces.surface(self.dialog.as_ref()?.surface)
    }

    /// Item currently open in the edit dialog
    pub fn dialog_item(&self) -> Option<&str> {
        self.dialog.as_ref().map(|d| d.item_id.as_str())
    }

    /// Item loaded into the register form for editing
    pub fn editing(&self) -> Option<&str> {
        self.edit_id.as_deref()
    }

    pub fn pending_images(&self) -> &[String] {
        &self.pending_images
    }

    /// Look up a field on the dialog if one is open, else on the register
    /// form. `nth` picks among repeated spec-row fields.
    pub fn active_field(&self, name: &str, nth: usize) -> Option<FieldId> {
        self.dialog_surface()
            .or_else(|| self.register_form())?
            .nth_named(name, nth)
            .map(|f| f.id)
    }

    pub fn view(&self) -> ListView<'_> {
        list_view::build_view(self.store.items(), &self.list)
    }

    /// Redraw the list
    pub fn render(&mut self) {
        self.list.reconcile_place_filter(self.store.items());
        let view = list_view::build_view(self.store.items(), &self.list);
        let history = History::collect(self.store.items());
        self.renderer.render(&view, &history);
    }

    // --- field events

    /// A field gained focus
    pub fn focus(&mut self, field: FieldId) -> bool {
        if !self.surfaces.focus(field) {
            return false;
        }
        if let Some(f) = self.surfaces.field(field) {
            self.tracker.observe_focus(f);
        }
        true
    }

    /// A field's value changed. Returns whether an undo entry was recorded.
    pub fn input(&mut self, field: FieldId, value: &str) -> bool {
        if !self.surfaces.set_value(field, value) {
            return false;
        }
        match self.surfaces.field(field) {
            Some(f) => self.tracker.record_change(f, &mut self.undo),
            None => false,
        }
    }

    /// Append an empty spec row to the register form. Returns the new
    /// label field, or None when the row limit is reached.
    pub fn add_spec_row(&mut self) -> Option<FieldId> {
        let rows = self.register_form()?.count_named(REGISTER_SPEC[0]);
        if rows >= MAX_SPECS {
            return None;
        }
        let ids = self
            .surfaces
            .append(self.register, spec_row(REGISTER_SPEC, &Spec::default()))?;
        for id in &ids {
            if let Some(f) = self.surfaces.field(*id) {
                self.tracker.observe_focus(f);
            }
        }
        ids.first().copied()
    }

    /// Remove spec row `row` from the register form. The first row is
    /// permanent.
    pub fn remove_spec_row(&mut self, row: usize) -> bool {
        if row == 0 {
            return false;
        }
        let Some(form) = self.register_form() else {
            return false;
        };
        let ids: Vec<FieldId> = REGISTER_SPEC
            .iter()
            .filter_map(|name| form.nth_named(name, row).map(|f| f.id))
            .collect();
        if ids.is_empty() {
            return false;
        }
        self.surfaces.remove_fields(&ids);
        self.tracker.sweep(&self.surfaces);
        true
    }

    // --- register form

    /// Load an existing item into the register form for editing
    pub fn load_into_form(&mut self, id: &str) -> bool {
        let Some(item) = self.store.get(id) else {
            return false;
        };
        let fields = register_fields(Some(item));
        self.remount_register(fields);
        self.edit_id = Some(id.to_string());
        true
    }

    /// Save the register form. An empty name is silently ignored.
    pub fn submit_register(&mut self, now: Timestamp) -> Result<Option<ItemId>, StoreError> {
        let Some(form) = self.surfaces.surface(self.register) else {
            return Ok(None);
        };
        let name = form.value("name").trim().to_string();
        if name.is_empty() {
            return Ok(None);
        }
        let images = match self.edit_id {
            Some(_) => None,
            None => Some(std::mem::take(&mut self.pending_images)),
        };
        let patch = ItemPatch {
            name: Some(name),
            qty: Some(read_qty(form.value("qty"))),
            unit: Some(form.value("unit").to_string()),
            specs: Some(read_specs(form, REGISTER_SPEC)),
            place: Some(form.value("place").trim().to_string()),
            due_date: Some(form.value("dueDate").to_string()),
            due_time: Some(form.value("dueTime").to_string()),
            priority: Some(Priority::parse(form.value("priority"))),
            url: Some(form.value("url").trim().to_string()),
            images,
        };
        let edit_id = self.edit_id.clone();
        let id = self.store.upsert(edit_id.as_deref(), patch, now)?;
        if edit_id.is_some() {
            // Resubmitting an item puts it back on the list
            self.store.modify(&id, |item| {
                let was_checked = item.checked;
                item.set_checked(false, now);
                was_checked
            })?;
        }
        tracing::info!(%id, edited = edit_id.is_some(), "saved register form");

        self.reset_register_form();
        self.render();
        Ok(Some(id))
    }

    /// Clear the register form, the pending images and the undo buffer
    pub fn reset_register_form(&mut self) {
        self.remount_register(register_fields(None));
        self.edit_id = None;
        self.pending_images.clear();
        self.undo.clear();
    }

    fn remount_register(&mut self, fields: Vec<FieldSpec>) {
        self.surfaces.unmount(self.register);
        self.register = self.surfaces.mount(SurfaceKind::RegisterForm, fields);
        self.tracker.sweep(&self.surfaces);
        self.register_surface_inputs(self.register);
    }

    fn register_surface_inputs(&mut self, id: SurfaceId) {
        if let Some(surface) = self.surfaces.surface(id) {
            self.tracker.register_inputs(surface);
        }
    }

    // --- edit dialog

    /// Open the edit dialog for an item. Clears the undo buffer.
    pub fn open_edit_dialog(&mut self, id: &str) -> bool {
        let Some(item) = self.store.get(id) else {
            return false;
        };
        let fields = dialog_fields(item);
        self.close_dialog();
        let surface = self.surfaces.mount(SurfaceKind::EditDialog, fields);
        self.dialog = Some(Dialog {
            surface,
            item_id: id.to_string(),
        });
        self.undo.clear();
        self.register_surface_inputs(surface);
        true
    }

    /// Write the dialog back to its item and close it. Returns false when
    /// no dialog is open or its item has gone.
    pub fn save_dialog(&mut self, now: Timestamp) -> Result<bool, StoreError> {
        let Some(dialog) = self.dialog.clone() else {
            return Ok(false);
        };
        let Some(old_name) = self.store.get(&dialog.item_id).map(|i| i.name.clone()) else {
            self.close_dialog();
            return Ok(false);
        };
        let Some(form) = self.surfaces.surface(dialog.surface) else {
            return Ok(false);
        };

        let title = form.value("title").trim();
        let name = if title.is_empty() { old_name } else { title.to_string() };
        let priority = match Priority::parse(form.value("editPriority")) {
            Priority::Unset => Priority::Mid,
            p => p,
        };
        let patch = ItemPatch {
            name: Some(name),
            qty: Some(read_qty(form.value("editQty"))),
            specs: Some(read_specs(form, DIALOG_SPEC)),
            place: Some(form.value("editPlace").trim().to_string()),
            due_date: Some(form.value("editDueDate").to_string()),
            due_time: Some(form.value("editDueTime").to_string()),
            priority: Some(priority),
            url: Some(form.value("editUrl").trim().to_string()),
            ..Default::default()
        };
        self.store.upsert(Some(&dialog.item_id), patch, now)?;
        tracing::info!(id = %dialog.item_id, "saved edit dialog");

        self.close_dialog();
        self.render();
        Ok(true)
    }

    /// Close the dialog without saving
    pub fn cancel_dialog(&mut self) -> bool {
        self.close_dialog()
    }

    fn close_dialog(&mut self) -> bool {
        let Some(dialog) = self.dialog.take() else {
            return false;
        };
        self.surfaces.unmount(dialog.surface);
        self.tracker.sweep(&self.surfaces);
        true
    }

    // --- item actions

    pub fn delete_item(&mut self, id: &str) -> Result<bool, StoreError> {
        if !self.store.remove(id)? {
            return Ok(false);
        }
        if self.dialog_item() == Some(id) {
            self.close_dialog();
        }
        if self.edit_id.as_deref() == Some(id) {
            self.edit_id = None;
        }
        self.render();
        Ok(true)
    }

    /// Check or uncheck one item, recording the previous state for undo
    pub fn toggle_checked(
        &mut self,
        id: &str,
        checked: bool,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let Some(before) = self.store.set_checked(id, checked, now)? else {
            return Ok(false);
        };
        self.undo.record(UndoEntry::Check(before));
        self.render();
        Ok(true)
    }

    /// Check every item whose place label is `label`. Returns the number
    /// of items touched.
    pub fn check_place_group(&mut self, label: &str, now: Timestamp) -> Result<usize, StoreError> {
        let snapshots = self.store.check_where(|i| i.place_label() == label, now)?;
        self.finish_bulk_check(snapshots)
    }

    /// Check every item
    pub fn check_all(&mut self, now: Timestamp) -> Result<usize, StoreError> {
        let snapshots = self.store.check_where(|_| true, now)?;
        self.finish_bulk_check(snapshots)
    }

    fn finish_bulk_check(
        &mut self,
        snapshots: Vec<CheckSnapshot>,
    ) -> Result<usize, StoreError> {
        let count = snapshots.len();
        if count > 0 {
            self.undo.record(UndoEntry::BulkCheck(snapshots));
        }
        self.render();
        Ok(count)
    }

    /// Delete every checked item. Not undoable.
    pub fn clear_checked(&mut self) -> Result<usize, StoreError> {
        let removed = self.store.remove_where(|i| i.checked)?;
        self.render();
        Ok(removed)
    }

    /// Reverse the most recent change that still applies. Returns false
    /// when nothing was undone.
    pub fn undo(&mut self, now: Timestamp) -> Result<bool, StoreError> {
        let mut ctx = UndoContext {
            store: &mut self.store,
            surfaces: &mut self.surfaces,
            tracker: &mut self.tracker,
            now,
        };
        match self.undo.undo(&mut ctx)? {
            Some(Applied::Items(_)) => {
                self.render();
                Ok(true)
            }
            Some(Applied::Field(_)) => Ok(true),
            None => Ok(false),
        }
    }

    // --- history

    pub fn history(&self) -> History {
        History::collect(self.store.items())
    }

    pub fn rename_history(
        &mut self,
        kind: HistoryKind,
        old: &str,
        new: &str,
    ) -> Result<usize, StoreError> {
        let changed = history::rename(&mut self.store, kind, old, new)?;
        if changed > 0 {
            self.render();
        }
        Ok(changed)
    }

    pub fn purge_history(
        &mut self,
        kind: HistoryKind,
        values: &[String],
    ) -> Result<usize, StoreError> {
        let count = history::purge(&mut self.store, kind, values)?;
        if count > 0 {
            self.render();
        }
        Ok(count)
    }

    // --- list selection

    pub fn set_sort(&mut self, sort: SortMode) {
        self.list.sort = sort;
        self.render();
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.list.scope = scope;
        self.render();
    }

    pub fn set_place_filter(&mut self, filter: Option<String>) {
        self.list.place_filter = filter;
        self.render();
    }

    pub fn rename_place_group(&mut self, label: &str, new_place: &str) -> Result<usize, StoreError> {
        let changed = list_view::rename_place_group(&mut self.store, label, new_place)?;
        if changed > 0 {
            self.render();
        }
        Ok(changed)
    }

    // --- images

    /// Attach decoded image payloads. An item target is re-checked first;
    /// if it was deleted meanwhile the payloads are dropped.
    pub fn attach_images(
        &mut self,
        target: ImageTarget,
        payloads: Vec<String>,
    ) -> Result<bool, StoreError> {
        if payloads.is_empty() {
            return Ok(false);
        }
        match target {
            ImageTarget::RegisterForm => {
                self.pending_images.extend(payloads);
                Ok(true)
            }
            ImageTarget::Item(id) => {
                let changed = self.store.modify(&id, |item| {
                    item.images.extend(payloads);
                    true
                })?;
                if changed.is_none() {
                    tracing::debug!(%id, "dropping images for missing item");
                    return Ok(false);
                }
                self.render();
                Ok(true)
            }
        }
    }

    /// Drop images queued for the register form
    pub fn clear_pending_images(&mut self) {
        self.pending_images.clear();
    }

    pub fn remove_image(&mut self, id: &str, index: usize) -> Result<bool, StoreError> {
        let changed = self.store.modify(id, |item| {
            if index < item.images.len() {
                item.images.remove(index);
                true
            } else {
                false
            }
        })?;
        if changed == Some(true) {
            self.render();
            return Ok(true);
        }
        Ok(false)
    }

    /// Tear the session down, handing back the store and renderer
    pub fn into_parts(self) -> (ItemStore<S>, R) {
        (self.store, self.renderer)
    }
}

/// Handle of one mounted form surface. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u32);

/// Identity of one editable field. Two fields with the same name (e.g.
/// repeated spec rows) have different ids, and an id dies with its
/// surface or row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    surface: SurfaceId,
    slot: u32,
}

impl FieldId {
    pub fn surface(self) -> SurfaceId {
        self.surface
    }
}

/// Input control kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    TextArea,
    Select,
    Date,
    Time,
    Checkbox,
    Radio,
    File,
}

impl FieldKind {
    /// Whether value edits on this kind go through the change tracker.
    /// Toggles and file pickers carry item-level meaning instead.
    pub fn is_tracked(self) -> bool {
        !matches!(self, FieldKind::Checkbox | FieldKind::Radio | FieldKind::File)
    }
}

/// Which surface a mounted form is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    RegisterForm,
    EditDialog,
}

/// Field description used when mounting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub name: String,
    pub value: String,
}

impl FieldSpec {
    pub fn new(kind: FieldKind, name: &str, value: impl Into<String>) -> Self {
        FieldSpec {
            kind,
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub id: FieldId,
    pub kind: FieldKind,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Surface {
    pub id: SurfaceId,
    pub kind: SurfaceKind,
    fields: Vec<Field>,
    next_slot: u32,
}

impl Surface {
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First field with `name`
    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The `nth` field with `name`, in mount order
    pub fn nth_named(&self, name: &str, nth: usize) -> Option<&Field> {
        self.fields.iter().filter(|f| f.name == name).nth(nth)
    }

    /// Value of the first field with `name` (empty if absent)
    pub fn value(&self, name: &str) -> &str {
        self.field_named(name).map(|f| f.value.as_str()).unwrap_or("")
    }

    /// Values of every field with `name`, in mount order
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .map(|f| f.value.as_str())
            .collect()
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.fields.iter().filter(|f| f.name == name).count()
    }

    fn push(&mut self, spec: FieldSpec) -> FieldId {
        let id = FieldId {
            surface: self.id,
            slot: self.next_slot,
        };
        self.next_slot += 1;
        self.fields.push(Field {
            id,
            kind: spec.kind,
            name: spec.name,
            value: spec.value,
        });
        id
    }
}

/// Registry of the currently mounted surfaces, plus keyboard focus.
#[derive(Debug, Default)]
pub struct Surfaces {
    next_id: u32,
    mounted: Vec<Surface>,
    focused: Option<FieldId>,
}

impl Surfaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a new surface with the given fields
    pub fn mount(&mut self, kind: SurfaceKind, fields: Vec<FieldSpec>) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        let mut surface = Surface {
            id,
            kind,
            fields: Vec::with_capacity(fields.len()),
            next_slot: 0,
        };
        for spec in fields {
            surface.push(spec);
        }
        self.mounted.push(surface);
        id
    }

    /// Tear a surface down. Its field ids are dead from here on.
    pub fn unmount(&mut self, id: SurfaceId) -> bool {
        let before = self.mounted.len();
        self.mounted.retain(|s| s.id != id);
        if self.focused.is_some_and(|f| f.surface == id) {
            self.focused = None;
        }
        self.mounted.len() != before
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.mounted.iter().find(|s| s.id == id)
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.mounted
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.surface(id.surface)?.fields.iter().find(|f| f.id == id)
    }

    /// Whether the field is still part of a mounted surface
    pub fn contains(&self, id: FieldId) -> bool {
        self.field(id).is_some()
    }

    /// Overwrite a field's value. Returns false for dead ids.
    pub fn set_value(&mut self, id: FieldId, value: &str) -> bool {
        let Some(field) = self.field_mut(id) else {
            return false;
        };
        field.value = value.to_string();
        true
    }

    pub fn focus(&mut self, id: FieldId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.focused = Some(id);
        true
    }

    pub fn focused(&self) -> Option<FieldId> {
        self.focused
    }

    /// Append fields to a mounted surface. Returns the new ids, or None if
    /// the surface is gone.
    pub fn append(&mut self, id: SurfaceId, fields: Vec<FieldSpec>) -> Option<Vec<FieldId>> {
        let surface = self.mounted.iter_mut().find(|s| s.id == id)?;
        Some(fields.into_iter().map(|spec| surface.push(spec)).collect())
    }

    /// Remove specific fields from a surface. Returns how many were removed.
    pub fn remove_fields(&mut self, ids: &[FieldId]) -> usize {
        let mut removed = 0;
        for surface in &mut self.mounted {
            let before = surface.fields.len();
            surface.fields.retain(|f| !ids.contains(&f.id));
            removed += before - surface.fields.len();
        }
        if self.focused.is_some_and(|f| ids.contains(&f)) {
            self.focused = None;
        }
        removed
    }

    fn field_mut(&mut self, id: FieldId) -> Option<&mut Field> {
        self.mounted
            .iter_mut()
            .find(|s| s.id == id.surface)?
            .fields
            .iter_mut()
            .find(|f| f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(surfaces: &mut Surfaces) -> SurfaceId {
        surfaces.mount(
            SurfaceKind::RegisterForm,
            vec![
                FieldSpec::new(FieldKind::Text, "name", "Milk"),
                FieldSpec::new(FieldKind::Text, "specName", "Color"),
                FieldSpec::new(FieldKind::Text, "specName", "Size"),
                FieldSpec::new(FieldKind::File, "images", ""),
            ],
        )
    }

    #[test]
    fn same_named_fields_have_distinct_ids() {
        let mut surfaces = Surfaces::new();
        let id = form(&mut surfaces);
        let surface = surfaces.surface(id).unwrap();
        let first = surface.nth_named("specName", 0).unwrap().id;
        let second = surface.nth_named("specName", 1).unwrap().id;
        assert_ne!(first, second);
        assert_eq!(surface.values("specName"), vec!["Color", "Size"]);
    }

    #[test]
    fn unmount_kills_ids_and_focus() {
        let mut surfaces = Surfaces::new();
        let id = form(&mut surfaces);
        let name = surfaces.surface(id).unwrap().field_named("name").unwrap().id;
        assert!(surfaces.focus(name));
        assert!(surfaces.unmount(id));
        assert!(!surfaces.contains(name));
        assert_eq!(surfaces.focused(), None);
        assert!(!surfaces.set_value(name, "x"));
    }

    #[test]
    fn remounting_never_reuses_ids() {
        let mut surfaces = Surfaces::new();
        let a = form(&mut surfaces);
        let old = surfaces.surface(a).unwrap().field_named("name").unwrap().id;
        surfaces.unmount(a);
        let b = form(&mut surfaces);
        let new = surfaces.surface(b).unwrap().field_named("name").unwrap().id;
        assert_ne!(a, b);
        assert_ne!(old, new);
        assert!(!surfaces.contains(old));
    }

    #[test]
    fn append_and_remove_rows() {
        let mut surfaces = Surfaces::new();
        let id = form(&mut surfaces);
        let added = surfaces
            .append(id, vec![FieldSpec::new(FieldKind::Text, "specName", "")])
            .unwrap();
        assert_eq!(surfaces.surface(id).unwrap().count_named("specName"), 3);
        assert_eq!(surfaces.remove_fields(&added), 1);
        assert_eq!(surfaces.surface(id).unwrap().count_named("specName"), 2);
        assert!(!surfaces.contains(added[0]));
    }

    #[test]
    fn tracked_kinds() {
        assert!(FieldKind::Text.is_tracked());
        assert!(FieldKind::Select.is_tracked());
        assert!(!FieldKind::Checkbox.is_tracked());
        assert!(!FieldKind::Radio.is_tracked());
        assert!(!FieldKind::File.is_tracked());
    }
}

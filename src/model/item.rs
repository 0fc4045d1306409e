use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch. Stored as a plain number so the
/// persisted blob stays readable by anything that speaks JSON.
pub type Timestamp = i64;

/// Opaque item identifier (a v4 UUID for items created here, but any
/// string is accepted from storage).
pub type ItemId = String;

pub const MAX_SPECS: usize = 10;

/// Item priority. Unset serializes as the empty string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    High,
    Mid,
    Low,
    #[default]
    Unset,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Mid => "mid",
            Priority::Low => "low",
            Priority::Unset => "",
        }
    }

    /// Lenient parse: anything unrecognised is unset.
    pub fn parse(s: &str) -> Priority {
        match s.trim() {
            "high" => Priority::High,
            "mid" => Priority::Mid,
            "low" => Priority::Low,
            _ => Priority::Unset,
        }
    }

    /// Sort rank: high first, unset last
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Mid => 1,
            Priority::Low => 2,
            Priority::Unset => 3,
        }
    }
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        Priority::parse(&s)
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Unset => write!(f, "unset"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// One named attribute/value/unit row attached to an item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub unit: String,
}

impl Spec {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Spec {
            name: name.into(),
            text: text.into(),
            unit: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// A row is kept only when it names something or says something.
    pub fn is_blank(&self) -> bool {
        self.name.is_empty() && self.text.is_empty()
    }
}

/// Trim spec rows, drop blank ones and cap the list length.
pub fn normalize_specs(specs: Vec<Spec>) -> Vec<Spec> {
    specs
        .into_iter()
        .map(|s| Spec {
            name: s.name.trim().to_string(),
            text: s.text.trim().to_string(),
            unit: s.unit,
        })
        .filter(|s| !s.is_blank())
        .take(MAX_SPECS)
        .collect()
}

fn default_qty() -> u32 {
    1
}

/// Accept whatever an older writer left in `qty`: numbers, numeric
/// strings, junk. Anything that is not a positive count becomes 1.
fn lenient_qty<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let n = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(match n {
        Some(n) if n.is_finite() && n >= 1.0 => n.trunc().min(f64::from(u32::MAX)) as u32,
        _ => default_qty(),
    })
}

/// One purchasable or task entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_qty", deserialize_with = "lenient_qty")]
    pub qty: u32,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub specs: Vec<Spec>,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub due_time: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub checked_at: Option<Timestamp>,
}

impl Item {
    /// Create a fresh unchecked item with a new id
    pub fn new(name: impl Into<String>, now: Timestamp) -> Self {
        Item {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            qty: 1,
            unit: String::new(),
            specs: Vec::new(),
            place: String::new(),
            due_date: String::new(),
            due_time: String::new(),
            priority: Priority::Unset,
            url: String::new(),
            images: Vec::new(),
            created_at: now,
            checked: false,
            checked_at: None,
        }
    }

    /// Set the checked flag, keeping `checked_at` in step with it.
    pub fn set_checked(&mut self, checked: bool, now: Timestamp) {
        self.checked = checked;
        self.checked_at = if checked { Some(now) } else { None };
    }

    /// Restore a previously captured checked state. A checked snapshot
    /// without a timestamp is stamped with `now`.
    pub fn restore_checked(&mut self, checked: bool, checked_at: Option<Timestamp>, now: Timestamp) {
        self.checked = checked;
        self.checked_at = if checked {
            Some(checked_at.unwrap_or(now))
        } else {
            None
        };
    }

    pub fn check_snapshot(&self) -> CheckSnapshot {
        CheckSnapshot {
            id: self.id.clone(),
            checked: self.checked,
            checked_at: self.checked_at,
        }
    }

    /// Non-empty lines of the url field
    pub fn urls(&self) -> Vec<&str> {
        self.url
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    }

    /// Place label used for grouping (empty place → `UNSET_PLACE`)
    pub fn place_label(&self) -> &str {
        if self.place.is_empty() {
            UNSET_PLACE
        } else {
            &self.place
        }
    }
}

/// Label shown for items without a place
pub const UNSET_PLACE: &str = "(unset)";

/// Captured checked state of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSnapshot {
    pub id: ItemId,
    pub checked: bool,
    pub checked_at: Option<Timestamp>,
}

/// Partial update merged over an existing item. `None` leaves the field
/// alone; `id`, `created_at` and the checked pair are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub qty: Option<u32>,
    pub unit: Option<String>,
    pub specs: Option<Vec<Spec>>,
    pub place: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<String>,
    pub priority: Option<Priority>,
    pub url: Option<String>,
    pub images: Option<Vec<String>>,
}

impl ItemPatch {
    pub fn named(name: impl Into<String>) -> Self {
        ItemPatch {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Shallow-merge this patch over `item`
    pub fn apply_to(self, item: &mut Item) {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(qty) = self.qty {
            item.qty = qty.max(1);
        }
        if let Some(unit) = self.unit {
            item.unit = unit;
        }
        if let Some(specs) = self.specs {
            item.specs = normalize_specs(specs);
        }
        if let Some(place) = self.place {
            item.place = place;
        }
        if let Some(due_date) = self.due_date {
            item.due_date = due_date;
        }
        if let Some(due_time) = self.due_time {
            item.due_time = due_time;
        }
        if let Some(priority) = self.priority {
            item.priority = priority;
        }
        if let Some(url) = self.url {
            item.url = url;
        }
        if let Some(images) = self.images {
            item.images = images;
        }
    }
}

use serde_json::{Map, Value};

use crate::io::storage::{Storage, StorageError};
use crate::model::item::{Item, Spec};

/// Error type for item persistence
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("could not parse stored items: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("could not decode stored item #{index}: {source}")]
    Decode {
        index: usize,
        source: serde_json::Error,
    },
    #[error("could not serialize items: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("item name cannot be empty")]
    EmptyName,
}

/// Read the item collection stored under `key`. A key with no data is an
/// empty collection. Records in the pre-`specs` shape are migrated.
pub fn load_items<S: Storage + ?Sized>(storage: &S, key: &str) -> Result<Vec<Item>, StoreError> {
    let Some(raw) = storage.get_item(key)? else {
        return Ok(Vec::new());
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    parse_items(&raw)
}

/// Parse a JSON array of item records, migrating legacy records.
pub fn parse_items(raw: &str) -> Result<Vec<Item>, StoreError> {
    let records: Vec<Value> = serde_json::from_str(raw).map_err(StoreError::Parse)?;
    let mut migrated = 0usize;
    let items = records
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            if let Value::Object(obj) = &mut record
                && migrate_legacy_specs(obj)
            {
                migrated += 1;
            }
            serde_json::from_value::<Item>(record)
                .map_err(|source| StoreError::Decode { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if migrated > 0 {
        tracing::debug!(migrated, "migrated legacy spec records");
    }
    Ok(items)
}

/// Write the whole collection under `key`.
pub fn save_items<S: Storage + ?Sized>(
    storage: &mut S,
    key: &str,
    items: &[Item],
) -> Result<(), StoreError> {
    let content = serialize_items(items)?;
    storage.set_item(key, &content)?;
    Ok(())
}

pub fn serialize_items(items: &[Item]) -> Result<String, StoreError> {
    serde_json::to_string_pretty(items).map_err(StoreError::Serialize)
}

/// Build `specs` for a record that predates multi-spec items. Returns
/// true if the record was rewritten.
///
/// - `details: ["A","B"]` + `specText: "note"` → one row per detail, each
///   carrying the note
/// - `specText` alone → a single unnamed row
/// - neither → one empty row
fn migrate_legacy_specs(obj: &mut Map<String, Value>) -> bool {
    if matches!(obj.get("specs"), Some(Value::Array(_))) {
        return false;
    }
    let details: Vec<String> = match obj.get("details") {
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };
    let note = match obj.get("specText") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    let specs: Vec<Spec> = if !details.is_empty() {
        details
            .into_iter()
            .map(|name| Spec::new(name, note.clone()))
            .collect()
    } else {
        vec![Spec::new("", note)]
    };

    obj.remove("details");
    obj.remove("specText");
    let specs = specs
        .into_iter()
        .map(|s| serde_json::json!({ "name": s.name, "text": s.text, "unit": s.unit }))
        .collect();
    obj.insert("specs".to_string(), Value::Array(specs));
    true
}

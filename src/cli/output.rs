use std::io::Write;

use chrono::DateTime;
use serde::Serialize;

use crate::io::image::payload_mime;
use crate::model::item::{Item, Priority, Spec, Timestamp};
use crate::ops::history::{History, HistoryKind};
use crate::ops::list_view::ListView;
use crate::session::Renderer;
use crate::util::unicode::{pad_to_width, short_id, truncate_to_width};

const ID_CHARS: usize = 8;
const NAME_CELLS: usize = 32;
const URL_CELLS: usize = 60;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ItemJson {
    pub id: String,
    pub name: String,
    pub qty: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unit: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub specs: Vec<Spec>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub place: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    pub images: usize,
    pub created: String,
    pub checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<String>,
}

#[derive(Serialize)]
pub struct GroupJson {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub place: String,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
pub struct ListJson {
    pub groups: Vec<GroupJson>,
    pub checked: Vec<ItemJson>,
    pub places: Vec<String>,
}

#[derive(Serialize)]
pub struct CountJson {
    pub action: &'static str,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Epoch millis as `YYYY-MM-DD HH:MM` (UTC)
pub fn format_timestamp(ms: Timestamp) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn due_label(item: &Item) -> Option<String> {
    match (item.due_date.is_empty(), item.due_time.is_empty()) {
        (true, true) => None,
        (false, true) => Some(item.due_date.clone()),
        (true, false) => Some(item.due_time.clone()),
        (false, false) => Some(format!("{} {}", item.due_date, item.due_time)),
    }
}

pub fn item_to_json(item: &Item) -> ItemJson {
    ItemJson {
        id: item.id.clone(),
        name: item.name.clone(),
        qty: item.qty,
        unit: item.unit.clone(),
        specs: item.specs.clone(),
        place: item.place.clone(),
        due: due_label(item),
        priority: (item.priority != Priority::Unset).then(|| item.priority.as_str().to_string()),
        urls: item.urls().into_iter().map(str::to_string).collect(),
        images: item.images.len(),
        created: format_timestamp(item.created_at),
        checked: item.checked,
        checked_at: item.checked_at.map(format_timestamp),
    }
}

pub fn view_to_json(view: &ListView<'_>) -> ListJson {
    ListJson {
        groups: view
            .groups
            .iter()
            .map(|g| GroupJson {
                place: g.title.clone(),
                items: g.items.iter().map(|i| item_to_json(i)).collect(),
            })
            .collect(),
        checked: view.checked.iter().map(|i| item_to_json(i)).collect(),
        places: view.place_options.clone(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn qty_label(item: &Item) -> Option<String> {
    if item.qty > 1 || !item.unit.is_empty() {
        Some(format!("x{}{}", item.qty, item.unit))
    } else {
        None
    }
}

/// One-line summary: `[ ] 3f2a9c1e Milk x2 @Market due 2025-06-01 !high`
pub fn format_item_line(item: &Item, show_place: bool) -> String {
    let mark = if item.checked { 'x' } else { ' ' };
    let mut line = format!(
        "[{}] {} {}",
        mark,
        pad_to_width(short_id(&item.id, ID_CHARS), ID_CHARS),
        truncate_to_width(&item.name, NAME_CELLS)
    );
    if let Some(q) = qty_label(item) {
        line.push(' ');
        line.push_str(&q);
    }
    if show_place && !item.place.is_empty() {
        line.push_str(&format!(" @{}", item.place));
    }
    if let Some(due) = due_label(item) {
        line.push_str(&format!(" due {}", due));
    }
    if item.priority != Priority::Unset {
        line.push_str(&format!(" !{}", item.priority));
    }
    line
}

/// The whole list: active groups, then the checked section
pub fn format_view(view: &ListView<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let grouped = view.groups.iter().any(|g| !g.title.is_empty());

    if view.active_count() == 0 {
        lines.push("(nothing on the list)".to_string());
    }
    for group in view.groups.iter().filter(|g| !g.items.is_empty()) {
        if grouped {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("== {} ({}) ==", group.title, group.items.len()));
        }
        for item in &group.items {
            lines.push(format_item_line(item, !grouped));
        }
    }

    if !view.checked.is_empty() {
        lines.push(String::new());
        lines.push("-- Checked --".to_string());
        for item in &view.checked {
            lines.push(format_item_line(item, true));
        }
    }
    lines
}

/// Detailed single-item view
pub fn format_item_detail(item: &Item) -> Vec<String> {
    let mut lines = vec![format_item_line(item, false)];
    lines.push(format!("id: {}", item.id));
    if let Some(q) = qty_label(item) {
        lines.push(format!("qty: {}", q));
    }
    if !item.place.is_empty() {
        lines.push(format!("place: {}", item.place));
    }
    if let Some(due) = due_label(item) {
        lines.push(format!("due: {}", due));
    }
    lines.push(format!("priority: {}", item.priority));
    if !item.specs.is_empty() {
        lines.push("specs:".to_string());
        for spec in &item.specs {
            let label = if spec.name.is_empty() { "-" } else { spec.name.as_str() };
            let unit = if spec.unit.is_empty() {
                String::new()
            } else {
                format!(" {}", spec.unit)
            };
            lines.push(format!("  {}: {}{}", label, spec.text, unit));
        }
    }
    for url in item.urls() {
        lines.push(format!("url: {}", truncate_to_width(url, URL_CELLS)));
    }
    for (i, image) in item.images.iter().enumerate() {
        lines.push(format!(
            "image {}: {}",
            i + 1,
            payload_mime(image).unwrap_or("unknown")
        ));
    }
    lines.push(format!("created: {}", format_timestamp(item.created_at)));
    if let Some(at) = item.checked_at {
        lines.push(format!("checked: {}", format_timestamp(at)));
    }
    lines
}

/// History listing, all kinds or just one
pub fn format_history(history: &History, kind: Option<HistoryKind>) -> Vec<String> {
    let kinds = match kind {
        Some(k) => vec![k],
        None => vec![HistoryKind::Names, HistoryKind::SpecLabels, HistoryKind::Places],
    };
    let mut lines = Vec::new();
    for k in kinds {
        if kind.is_none() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("== {} ==", k));
        }
        for value in history.values(k) {
            lines.push(value.clone());
        }
    }
    lines
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Writes the list as text after every change
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        TextRenderer { out }
    }

    /// The underlying writer, for messages between renders
    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, view: &ListView<'_>, _history: &History) {
        let mut text = format_view(view).join("\n");
        text.push('\n');
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::warn!(error = %e, "could not write list");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::UNSET_PLACE;
    use crate::ops::list_view::{ListState, Scope, build_view};

    const T0: Timestamp = 1_748_736_000_000; // 2025-06-01 00:00 UTC

    fn item(id: &str, name: &str) -> Item {
        let mut item = Item::new(name, T0);
        item.id = id.to_string();
        item
    }

    fn sample() -> Vec<Item> {
        let mut milk = item("a1b2c3d4-milk", "Milk");
        milk.qty = 2;
        milk.place = "Market".into();
        milk.due_date = "2025-06-02".into();
        milk.priority = Priority::High;

        let mut tape = item("e5f6-tape", "Tape");
        tape.unit = "roll".into();

        let mut soap = item("99aa88bb77", "Soap");
        soap.place = "Market".into();
        soap.set_checked(true, T0 + 60_000);
        vec![milk, tape, soap]
    }

    #[test]
    fn item_line_shows_only_set_fields() {
        let items = sample();
        assert_eq!(
            format_item_line(&items[0], true),
            "[ ] a1b2c3d4 Milk x2 @Market due 2025-06-02 !high"
        );
        assert_eq!(format_item_line(&items[1], true), "[ ] e5f6-tap Tape x1roll");
    }

    #[test]
    fn long_names_are_truncated() {
        let long = item("id", &"a".repeat(40));
        let line = format_item_line(&long, false);
        assert!(line.ends_with('…'));
        assert!(line.starts_with("[ ] id       aaaa"));
    }

    #[test]
    fn view_all_scope() {
        let items = sample();
        let view = build_view(&items, &ListState::default());
        insta::assert_snapshot!(format_view(&view).join("\n"), @"[ ] a1b2c3d4 Milk x2 @Market due 2025-06-02 !high\n[ ] e5f6-tap Tape x1roll\n\n-- Checked --\n[x] 99aa88bb Soap @Market");
    }

    #[test]
    fn view_place_scope() {
        let items = sample();
        let state = ListState {
            scope: Scope::Place,
            ..Default::default()
        };
        let view = build_view(&items, &state);
        let text = format_view(&view).join("\n");
        insta::assert_snapshot!(text, @"== Market (1) ==\n[ ] a1b2c3d4 Milk x2 due 2025-06-02 !high\n\n== (unset) (1) ==\n[ ] e5f6-tap Tape x1roll\n\n-- Checked --\n[x] 99aa88bb Soap @Market");
        assert!(text.contains(UNSET_PLACE));
    }

    #[test]
    fn empty_view() {
        let view = build_view(&[], &ListState::default());
        assert_eq!(format_view(&view), vec!["(nothing on the list)"]);
    }

    #[test]
    fn detail_lists_specs_urls_and_images() {
        let mut it = item("a1b2c3d4", "Shirt");
        it.specs = vec![Spec::new("Color", "blue"), Spec::new("", "cotton").with_unit("%")];
        it.url = "https://shop.example/shirt\n".into();
        it.images = vec!["data:image/png;base64,aGk=".into()];
        insta::assert_snapshot!(format_item_detail(&it).join("\n"), @"[ ] a1b2c3d4 Shirt\nid: a1b2c3d4\npriority: unset\nspecs:\n  Color: blue\n  -: cotton %\nurl: https://shop.example/shirt\nimage 1: image/png\ncreated: 2025-06-01 00:00");
    }

    #[test]
    fn json_skips_empty_fields() {
        let items = sample();
        let value = serde_json::to_value(item_to_json(&items[1])).unwrap();
        assert_eq!(value["unit"], "roll");
        assert!(value.get("place").is_none());
        assert!(value.get("priority").is_none());
        assert!(value.get("checked_at").is_none());
        assert_eq!(value["created"], "2025-06-01 00:00");
    }

    #[test]
    fn history_listing() {
        let history = History::collect(&sample());
        assert_eq!(
            format_history(&history, Some(HistoryKind::Places)),
            vec!["Market"]
        );
        let all = format_history(&history, None).join("\n");
        insta::assert_snapshot!(all, @"== names ==\nMilk\nTape\nSoap\n\n== specs ==\n\n== places ==\nMarket");
    }

    #[test]
    fn text_renderer_writes_view() {
        let items = sample();
        let view = build_view(&items, &ListState::default());
        let mut renderer = TextRenderer::new(Vec::new());
        renderer.render(&view, &History::default());
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(out.starts_with("[ ] a1b2c3d4 Milk"));
        assert!(out.ends_with("Soap @Market\n"));
    }
}

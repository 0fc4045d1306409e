mod init;
mod session;
pub use init::cmd_init;
pub use session::run_session;

use std::error::Error;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io::{self, ConfigError};
use crate::io::image;
use crate::io::storage::FileStorage;
use crate::model::config::Config;
use crate::model::item::{Item, ItemId, ItemPatch, Priority, Spec, Timestamp};
use crate::ops::history::{self, History, HistoryKind};
use crate::ops::list_view::{self, ListState};
use crate::ops::store::ItemStore;
use crate::util::unicode::short_id;

/// Directory (under the -C target or cwd) holding config and data
pub const DATA_DIR: &str = ".shoplist";

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn Error>> {
    let json = cli.json;
    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    let command = cli.command.unwrap_or(Commands::List(ListArgs::default()));
    // Init runs before any config is read, so it can replace a broken one
    let ctx = || Context::load(data_dir.clone(), json);

    match command {
        Commands::Init(args) => cmd_init(&data_dir, args),

        // Read commands
        Commands::List(args) => cmd_list(&ctx()?, args),
        Commands::Show(args) => cmd_show(&ctx()?, args),
        Commands::History(cmd) => cmd_history(&ctx()?, cmd),

        // Write commands
        Commands::Add(args) => cmd_add(&ctx()?, args),
        Commands::Edit(args) => cmd_edit(&ctx()?, args),
        Commands::Check(args) => cmd_set_checked(&ctx()?, args, true),
        Commands::Uncheck(args) => cmd_set_checked(&ctx()?, args, false),
        Commands::CheckAll => cmd_check_all(&ctx()?),
        Commands::CheckPlace(args) => cmd_check_place(&ctx()?, args),
        Commands::Rm(args) => cmd_rm(&ctx()?, args),
        Commands::ClearChecked => cmd_clear_checked(&ctx()?),
        Commands::Image(cmd) => cmd_image(&ctx()?, cmd),

        // Interactive
        Commands::Session => cmd_session(&ctx()?),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_data_dir(dir: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
    let base = match dir {
        Some(dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir()?,
    };
    Ok(base.join(DATA_DIR))
}

pub(crate) fn now() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Resolved data directory plus its configuration
pub(crate) struct Context {
    data_dir: PathBuf,
    config: Config,
    json: bool,
}

impl Context {
    fn load(data_dir: PathBuf, json: bool) -> Result<Self, ConfigError> {
        let config = config_io::read_config(&data_dir)?;
        Ok(Context {
            data_dir,
            config,
            json,
        })
    }

    /// Open the store without the startup prune
    fn open_store_raw(&self) -> Result<ItemStore<FileStorage>, Box<dyn Error>> {
        let storage = FileStorage::open(&self.data_dir)?;
        Ok(ItemStore::open(storage, &self.config.storage.key)?)
    }

    /// Open the store and drop expired checked items. Every invocation is
    /// a fresh start, so this is where retention runs.
    fn open_store(&self) -> Result<ItemStore<FileStorage>, Box<dyn Error>> {
        let mut store = self.open_store_raw()?;
        store.prune(now(), self.config.retention.window())?;
        Ok(store)
    }
}

/// Find an item by full id, unique id prefix, or exact name.
pub(crate) fn resolve_item(items: &[Item], query: &str) -> Result<ItemId, String> {
    if let Some(item) = items.iter().find(|i| i.id == query) {
        return Ok(item.id.clone());
    }
    let by_prefix: Vec<&Item> = items.iter().filter(|i| i.id.starts_with(query)).collect();
    match by_prefix.len() {
        1 => return Ok(by_prefix[0].id.clone()),
        n if n > 1 => return Err(format!("'{}' matches {} items; use a longer id", query, n)),
        _ => {}
    }
    let by_name: Vec<&Item> = items.iter().filter(|i| i.name == query).collect();
    match by_name.len() {
        1 => Ok(by_name[0].id.clone()),
        0 => Err(format!("no item matches '{}'", query)),
        n => Err(format!("'{}' names {} items; use an id", query, n)),
    }
}

/// `LABEL=VALUE[=UNIT]`; a bare string is a value with no label
fn parse_spec(raw: &str) -> Spec {
    let mut parts = raw.splitn(3, '=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(label), Some(value), unit) => {
            Spec::new(label.trim(), value.trim()).with_unit(unit.unwrap_or("").trim())
        }
        _ => Spec::new("", raw.trim()),
    }
}

fn parse_due_date(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(String::new());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| format!("invalid due date '{}' (expected YYYY-MM-DD)", raw))
}

fn parse_due_time(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(String::new());
    }
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| format!("invalid time '{}' (expected HH:MM)", raw))
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    match raw.trim() {
        "" | "unset" | "none" => Ok(Priority::Unset),
        s => match Priority::parse(s) {
            Priority::Unset => Err(format!(
                "unknown priority '{}' (expected: high, mid, low, unset)",
                s
            )),
            p => Ok(p),
        },
    }
}

fn fields_to_patch(fields: ItemFields) -> Result<ItemPatch, String> {
    Ok(ItemPatch {
        qty: fields.qty,
        unit: fields.unit.map(|u| u.trim().to_string()),
        specs: if fields.specs.is_empty() {
            None
        } else {
            Some(fields.specs.iter().map(|s| parse_spec(s)).collect())
        },
        place: fields.place.map(|p| p.trim().to_string()),
        due_date: fields.due.as_deref().map(parse_due_date).transpose()?,
        due_time: fields.time.as_deref().map(parse_due_time).transpose()?,
        priority: fields.priority.as_deref().map(parse_priority).transpose()?,
        url: if fields.urls.is_empty() {
            None
        } else {
            Some(fields.urls.join("\n"))
        },
        ..Default::default()
    })
}

fn print_item(item: &Item, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(&item_to_json(item))?);
    } else {
        println!("{}", format_item_line(item, true));
    }
    Ok(())
}

fn print_count(action: &'static str, count: usize, noun: &str, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string(&CountJson { action, count })?);
    } else {
        let plural = if count == 1 { "" } else { "s" };
        println!("{} {} {}{}", action, count, noun, plural);
    }
    Ok(())
}

fn parse_kind(raw: &str) -> Result<HistoryKind, Box<dyn Error>> {
    Ok(raw.parse::<HistoryKind>()?)
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(ctx: &Context, args: ListArgs) -> Result<(), Box<dyn Error>> {
    let store = ctx.open_store()?;
    let mut state = ListState {
        sort: ctx.config.list.sort,
        scope: ctx.config.list.scope,
        place_filter: None,
    };
    if let Some(sort) = args.sort {
        state.sort = sort.parse()?;
    }
    if let Some(scope) = args.scope {
        state.scope = scope.parse()?;
    }
    if let Some(place) = args.place {
        state.scope = list_view::Scope::Place;
        state.place_filter = Some(place);
    }
    state.reconcile_place_filter(store.items());
    let view = list_view::build_view(store.items(), &state);

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&view_to_json(&view))?);
    } else {
        for line in format_view(&view) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_show(ctx: &Context, args: ShowArgs) -> Result<(), Box<dyn Error>> {
    let store = ctx.open_store()?;
    let id = resolve_item(store.items(), &args.id)?;
    let Some(item) = store.get(&id) else {
        return Err(format!("no item matches '{}'", args.id).into());
    };
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&item_to_json(item))?);
    } else {
        for line in format_item_detail(item) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_history(ctx: &Context, cmd: HistoryCmd) -> Result<(), Box<dyn Error>> {
    let mut store = ctx.open_store()?;
    match cmd.action {
        None => {
            let kind = cmd.kind.as_deref().map(parse_kind).transpose()?;
            let history = History::collect(store.items());
            if ctx.json {
                match kind {
                    Some(k) => println!("{}", serde_json::to_string_pretty(history.values(k))?),
                    None => println!("{}", serde_json::to_string_pretty(&history)?),
                }
            } else {
                for line in format_history(&history, kind) {
                    println!("{}", line);
                }
            }
        }
        Some(HistoryAction::Rename(args)) => {
            let kind = parse_kind(&args.kind)?;
            let new = args.new.trim();
            let changed = history::rename(&mut store, kind, &args.old, new)?;
            print_count("renamed in", changed, "item", ctx.json)?;
        }
        Some(HistoryAction::Purge(args)) => {
            let kind = parse_kind(&args.kind)?;
            let count = history::purge(&mut store, kind, &args.values)?;
            let action = if kind == HistoryKind::Names { "deleted" } else { "updated" };
            print_count(action, count, "item", ctx.json)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(ctx: &Context, args: AddArgs) -> Result<(), Box<dyn Error>> {
    let mut patch = fields_to_patch(args.fields)?;
    patch.name = Some(args.name);
    if !args.images.is_empty() {
        let images = args
            .images
            .iter()
            .map(|p| image::read_image_file(p))
            .collect::<Result<Vec<_>, _>>()?;
        patch.images = Some(images);
    }

    let mut store = ctx.open_store()?;
    let id = store.upsert(None, patch, now())?;
    if let Some(item) = store.get(&id) {
        print_item(item, ctx.json)?;
    }
    Ok(())
}

fn cmd_edit(ctx: &Context, args: EditArgs) -> Result<(), Box<dyn Error>> {
    let mut store = ctx.open_store()?;
    let id = resolve_item(store.items(), &args.id)?;
    let mut patch = fields_to_patch(args.fields)?;
    patch.name = args.name;
    if patch == ItemPatch::default() {
        return Err("nothing to change (pass at least one field option)".into());
    }
    store.upsert(Some(&id), patch, now())?;
    if let Some(item) = store.get(&id) {
        print_item(item, ctx.json)?;
    }
    Ok(())
}

fn cmd_set_checked(ctx: &Context, args: IdsArgs, checked: bool) -> Result<(), Box<dyn Error>> {
    let mut store = ctx.open_store()?;
    let ids = args
        .ids
        .iter()
        .map(|q| resolve_item(store.items(), q))
        .collect::<Result<Vec<_>, _>>()?;
    let at = now();
    for id in &ids {
        store.set_checked(id, checked, at)?;
        if let Some(item) = store.get(id) {
            print_item(item, ctx.json)?;
        }
    }
    Ok(())
}

fn cmd_check_all(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let mut store = ctx.open_store()?;
    let checked = store.check_where(|_| true, now())?;
    print_count("checked", checked.len(), "item", ctx.json)
}

fn cmd_check_place(ctx: &Context, args: CheckPlaceArgs) -> Result<(), Box<dyn Error>> {
    let mut store = ctx.open_store()?;
    let label = args.place.trim();
    let checked = store.check_where(|i| i.place_label() == label, now())?;
    if checked.is_empty() {
        return Err(format!("no items at '{}'", label).into());
    }
    print_count("checked", checked.len(), "item", ctx.json)
}

fn cmd_rm(ctx: &Context, args: IdsArgs) -> Result<(), Box<dyn Error>> {
    let mut store = ctx.open_store()?;
    let ids = args
        .ids
        .iter()
        .map(|q| resolve_item(store.items(), q))
        .collect::<Result<Vec<_>, _>>()?;
    let mut removed = 0;
    for id in &ids {
        if store.remove(id)? {
            removed += 1;
            if !ctx.json {
                eprintln!("removed {}", short_id(id, 8));
            }
        }
    }
    print_count("removed", removed, "item", ctx.json)
}

fn cmd_clear_checked(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let mut store = ctx.open_store()?;
    let removed = store.remove_where(|i| i.checked)?;
    print_count("cleared", removed, "item", ctx.json)
}

fn cmd_image(ctx: &Context, cmd: ImageCmd) -> Result<(), Box<dyn Error>> {
    let mut store = ctx.open_store()?;
    match cmd.action {
        ImageAction::Add(args) => {
            let id = resolve_item(store.items(), &args.id)?;
            let payloads = args
                .paths
                .iter()
                .map(|p| image::read_image_file(p))
                .collect::<Result<Vec<_>, _>>()?;
            let count = payloads.len();
            store.modify(&id, |item| {
                item.images.extend(payloads);
                true
            })?;
            print_count("attached", count, "image", ctx.json)
        }
        ImageAction::Rm(args) => {
            let id = resolve_item(store.items(), &args.id)?;
            let Some(index) = args.index.checked_sub(1) else {
                return Err("image positions start at 1".into());
            };
            let removed = store.modify(&id, |item| {
                if index < item.images.len() {
                    item.images.remove(index);
                    true
                } else {
                    false
                }
            })?;
            if removed != Some(true) {
                return Err(format!("item has no image #{}", args.index).into());
            }
            print_count("removed", 1, "image", ctx.json)
        }
    }
}

// ---------------------------------------------------------------------------
// Interactive
// ---------------------------------------------------------------------------

fn cmd_session(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let store = ctx.open_store_raw()?;
    let stdin = std::io::stdin();
    run_session(store, &ctx.config, stdin.lock(), std::io::stdout())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<Item> {
        let mut a = Item::new("Milk", 0);
        a.id = "3f2a0001".into();
        let mut b = Item::new("Milk", 0);
        b.id = "3f2b0002".into();
        let mut c = Item::new("Eggs", 0);
        c.id = "77aa0003".into();
        vec![a, b, c]
    }

    #[test]
    fn resolve_by_id_prefix_and_name() {
        let items = items();
        assert_eq!(resolve_item(&items, "3f2a0001").unwrap(), "3f2a0001");
        assert_eq!(resolve_item(&items, "3f2b").unwrap(), "3f2b0002");
        assert_eq!(resolve_item(&items, "Eggs").unwrap(), "77aa0003");
    }

    #[test]
    fn resolve_reports_ambiguity_and_misses() {
        let items = items();
        assert!(resolve_item(&items, "3f2").unwrap_err().contains("matches 2 items"));
        assert!(resolve_item(&items, "Milk").unwrap_err().contains("names 2 items"));
        assert!(resolve_item(&items, "Tea").unwrap_err().contains("no item"));
    }

    #[test]
    fn spec_argument_forms() {
        assert_eq!(parse_spec("Color=blue"), Spec::new("Color", "blue"));
        assert_eq!(parse_spec("Length = 3 = cm"), Spec::new("Length", "3").with_unit("cm"));
        assert_eq!(parse_spec("organic"), Spec::new("", "organic"));
    }

    #[test]
    fn due_fields_are_validated() {
        assert_eq!(parse_due_date("2025-06-01").unwrap(), "2025-06-01");
        assert_eq!(parse_due_date("").unwrap(), "");
        assert!(parse_due_date("06/01/2025").is_err());
        assert_eq!(parse_due_time("09:05").unwrap(), "09:05");
        assert!(parse_due_time("25:00").is_err());
    }

    #[test]
    fn priority_argument() {
        assert_eq!(parse_priority("high").unwrap(), Priority::High);
        assert_eq!(parse_priority("unset").unwrap(), Priority::Unset);
        assert!(parse_priority("urgent").is_err());
    }

    #[test]
    fn patch_leaves_unspecified_fields_alone() {
        let patch = fields_to_patch(ItemFields {
            place: Some(" Market ".into()),
            urls: vec!["https://a.example".into(), "https://b.example".into()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(patch.place.as_deref(), Some("Market"));
        assert_eq!(patch.url.as_deref(), Some("https://a.example\nhttps://b.example"));
        assert_eq!(patch.qty, None);
        assert_eq!(patch.specs, None);
        assert_eq!(patch.priority, None);
    }
}

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::io::{self, BufRead, Write};

use super::{now, resolve_item};
use crate::cli::output::TextRenderer;
use crate::io::storage::Storage;
use crate::model::config::Config;
use crate::model::item::UNSET_PLACE;
use crate::ops::list_view::{Scope, SortMode};
use crate::ops::store::ItemStore;
use crate::session::surface::FieldKind;
use crate::session::{Session, SessionOptions};
use crate::util::unicode::short_id;

const HELP: &str = "\
commands:
  list                      redraw the list
  add NAME                  add an item
  check ID | uncheck ID     toggle one item
  check-all                 check everything
  check-place [PLACE]       check every item at PLACE (default: unset)
  rm ID                     delete an item
  clear-checked             delete checked items
  edit ID                   open the edit dialog
  set FIELD[#N] VALUE       type into a field of the open form
  save | cancel             close the edit dialog
  undo                      undo the last change (up to 3)
  sort due|priority|created
  scope all|place
  place [PLACE]             filter by place (no argument clears)
  quit";

type TextSession<S, W> = Session<S, TextRenderer<W>>;

enum Flow {
    Continue,
    Quit,
}

fn say<S: Storage, W: Write>(session: &mut TextSession<S, W>, msg: impl Display) -> io::Result<()> {
    writeln!(session.renderer_mut().writer(), "{}", msg)
}

/// `specName#2` → (`specName`, 1)
fn parse_field_ref(raw: &str) -> Option<(&str, usize)> {
    match raw.split_once('#') {
        Some((name, n)) => {
            let n: usize = n.parse().ok()?;
            Some((name, n.checked_sub(1)?))
        }
        None => Some((raw, 0)),
    }
}

/// Fields of the open dialog (or the register form) as `name = value` lines
fn field_lines<S: Storage, W: Write>(session: &TextSession<S, W>) -> Vec<String> {
    let Some(surface) = session.dialog_surface().or_else(|| session.register_form()) else {
        return Vec::new();
    };
    let mut seen: HashMap<&str, usize> = HashMap::new();
    surface
        .fields()
        .iter()
        .filter(|f| f.kind != FieldKind::File)
        .map(|f| {
            let n = seen.entry(f.name.as_str()).or_default();
            *n += 1;
            let name = if *n > 1 {
                format!("{}#{}", f.name, n)
            } else {
                f.name.clone()
            };
            format!("  {} = {}", name, f.value.replace('\n', "\\n"))
        })
        .collect()
}

fn show_fields<S: Storage, W: Write>(session: &mut TextSession<S, W>) -> io::Result<()> {
    for line in field_lines(session) {
        say(session, line)?;
    }
    Ok(())
}

fn run_line<S: Storage, W: Write>(
    session: &mut TextSession<S, W>,
    line: &str,
) -> Result<Flow, Box<dyn Error>> {
    let line = line.trim();
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };
    let at = now();

    // Commands that address one item
    if matches!(cmd, "check" | "uncheck" | "rm" | "edit") {
        let id = match resolve_item(session.items(), rest) {
            Ok(id) => id,
            Err(msg) => {
                say(session, format!("error: {}", msg))?;
                return Ok(Flow::Continue);
            }
        };
        match cmd {
            "check" | "uncheck" => {
                session.toggle_checked(&id, cmd == "check", at)?;
            }
            "rm" => {
                session.delete_item(&id)?;
            }
            _ => {
                session.open_edit_dialog(&id);
                say(session, format!("editing {}", short_id(&id, 8)))?;
                show_fields(session)?;
            }
        }
        return Ok(Flow::Continue);
    }

    match cmd {
        "" => {}
        "list" | "ls" => session.render(),
        "add" => {
            let field = session
                .register_form()
                .and_then(|f| f.field_named("name"))
                .map(|f| f.id);
            if let Some(field) = field {
                session.focus(field);
                session.input(field, rest);
            }
            // A blank name is ignored without comment
            if let Some(id) = session.submit_register(at)? {
                say(session, format!("added {}", short_id(&id, 8)))?;
            }
        }
        "check-all" => {
            let n = session.check_all(at)?;
            say(session, format!("checked {} items", n))?;
        }
        "check-place" => {
            let label = if rest.is_empty() { UNSET_PLACE } else { rest };
            let n = session.check_place_group(label, at)?;
            say(session, format!("checked {} items", n))?;
        }
        "clear-checked" => {
            let n = session.clear_checked()?;
            say(session, format!("cleared {} items", n))?;
        }
        "set" => {
            let (target, value) = rest.split_once(' ').unwrap_or((rest, ""));
            let field = parse_field_ref(target).and_then(|(name, nth)| session.active_field(name, nth));
            match field {
                Some(field) => {
                    session.focus(field);
                    session.input(field, value);
                }
                None => say(session, format!("error: no field '{}'", target))?,
            }
        }
        "save" => {
            if !session.save_dialog(at)? {
                say(session, "error: no dialog open")?;
            }
        }
        "cancel" => {
            if !session.cancel_dialog() {
                say(session, "error: no dialog open")?;
            }
        }
        "undo" => {
            if session.undo(at)? {
                say(session, "undone")?;
                if session.dialog_surface().is_some() {
                    show_fields(session)?;
                }
            } else {
                say(session, "nothing to undo")?;
            }
        }
        "sort" => match rest.parse::<SortMode>() {
            Ok(mode) => session.set_sort(mode),
            Err(e) => say(session, format!("error: {}", e))?,
        },
        "scope" => match rest.parse::<Scope>() {
            Ok(scope) => session.set_scope(scope),
            Err(e) => say(session, format!("error: {}", e))?,
        },
        "place" => {
            let filter = (!rest.is_empty() && rest != "all").then(|| rest.to_string());
            session.set_place_filter(filter);
        }
        "help" | "?" => say(session, HELP)?,
        "quit" | "exit" | "q" => return Ok(Flow::Quit),
        other => say(session, format!("error: unknown command '{}' (try help)", other))?,
    }
    Ok(Flow::Continue)
}

/// Drive a session from line-oriented input until EOF or `quit`. Input
/// mistakes are reported on `out`; storage failures end the session.
pub fn run_session<S, In, W>(
    store: ItemStore<S>,
    config: &Config,
    input: In,
    out: W,
) -> Result<(ItemStore<S>, W), Box<dyn Error>>
where
    S: Storage,
    In: BufRead,
    W: Write,
{
    let options = SessionOptions::from(config);
    let mut session = Session::start(store, TextRenderer::new(out), options, now())?;
    for line in input.lines() {
        let line = line?;
        tracing::debug!(line = %line, "session input");
        if let Flow::Quit = run_line(&mut session, &line)? {
            break;
        }
    }
    let (store, renderer) = session.into_parts();
    Ok((store, renderer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::storage::MemoryStorage;
    use crate::model::item::ItemPatch;

    fn store_with(names: &[&str]) -> ItemStore<MemoryStorage> {
        let mut store = ItemStore::open(MemoryStorage::new(), "items").unwrap();
        for name in names.iter().rev() {
            store.upsert(None, ItemPatch::named(*name), now()).unwrap();
        }
        store
    }

    fn run(store: ItemStore<MemoryStorage>, script: &str) -> (ItemStore<MemoryStorage>, String) {
        let (store, out) =
            run_session(store, &Config::default(), script.as_bytes(), Vec::new()).unwrap();
        (store, String::from_utf8(out).unwrap())
    }

    #[test]
    fn field_refs() {
        assert_eq!(parse_field_ref("editPlace"), Some(("editPlace", 0)));
        assert_eq!(parse_field_ref("specName#2"), Some(("specName", 1)));
        assert_eq!(parse_field_ref("specName#0"), None);
        assert_eq!(parse_field_ref("specName#x"), None);
    }

    #[test]
    fn add_and_check_through_the_loop() {
        let (store, out) = run(store_with(&[]), "add Milk\ncheck Milk\nquit\nadd Never\n");
        assert_eq!(store.len(), 1);
        assert!(store.items()[0].checked);
        assert!(out.contains("added "));
        assert!(out.contains("-- Checked --"));
    }

    #[test]
    fn edit_place_then_undo_restores_field() {
        let mut store = store_with(&["Milk"]);
        let id = store.items()[0].id.clone();
        store
            .modify(&id, |i| {
                i.place = "A".into();
                true
            })
            .unwrap();

        let (store, out) = run(store, "edit Milk\nset editPlace B\nundo\nsave\n");
        let (_, after_undo) = out.split_once("undone\n").unwrap();
        assert!(after_undo.contains("  editPlace = A\n"), "{}", out);
        assert_eq!(store.items()[0].place, "A");
    }

    #[test]
    fn undo_check_through_the_loop() {
        let (store, out) = run(store_with(&["Milk", "Eggs"]), "check Eggs\nundo\nundo\n");
        assert!(store.items().iter().all(|i| !i.checked));
        assert!(out.contains("undone"));
        assert!(out.ends_with("nothing to undo\n"));
    }

    #[test]
    fn input_errors_do_not_end_the_session() {
        let (store, out) = run(store_with(&["Milk"]), "frobnicate\ncheck Tea\nset nope x\ncheck Milk\n");
        assert!(out.contains("error: unknown command 'frobnicate'"));
        assert!(out.contains("error: no item matches 'Tea'"));
        assert!(out.contains("error: no field 'nope'"));
        assert!(store.items()[0].checked);
    }

    #[test]
    fn blank_add_is_silently_ignored() {
        let (store, out) = run(store_with(&[]), "add   \n");
        assert!(store.is_empty());
        assert_eq!(out, "(nothing on the list)\n");
    }

    #[test]
    fn check_place_defaults_to_unset_group() {
        let (store, out) = run(store_with(&["Tape", "Glue"]), "check-place\n");
        assert!(out.contains("checked 2 items"));
        assert!(store.items().iter().all(|i| i.checked));
    }
}

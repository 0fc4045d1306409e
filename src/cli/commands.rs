use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sl", about = concat!("shoplist v", env!("CARGO_PKG_VERSION"), " - shopping and errand lists that tidy themselves"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use the list stored under a different directory
    #[arg(short = 'C', long = "data-dir", global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and a default shoplist.toml
    Init(InitArgs),
    /// Add an item to the list
    Add(AddArgs),
    /// Change fields of an existing item
    Edit(EditArgs),
    /// Show the list (default when no command is given)
    List(ListArgs),
    /// Show one item in full
    Show(ShowArgs),
    /// Mark items as bought/done
    Check(IdsArgs),
    /// Put checked items back on the list
    Uncheck(IdsArgs),
    /// Check every item
    CheckAll,
    /// Check every item at one place
    CheckPlace(CheckPlaceArgs),
    /// Delete items
    Rm(IdsArgs),
    /// Delete every checked item now instead of waiting for expiry
    ClearChecked,
    /// Show or manage previously used names, spec labels and places
    History(HistoryCmd),
    /// Attach or remove item images
    Image(ImageCmd),
    /// Interactive line-based session with undo (reads stdin)
    Session,
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Storage key for the item list
    #[arg(long)]
    pub key: Option<String>,
    /// Hours a checked item is kept before it is dropped
    #[arg(long, value_name = "HOURS")]
    pub retention_hours: Option<u32>,
    /// Overwrite an existing shoplist.toml
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Item args
// ---------------------------------------------------------------------------

#[derive(Args, Default)]
pub struct ItemFields {
    /// Quantity (at least 1)
    #[arg(long)]
    pub qty: Option<u32>,
    /// Unit label shown after the quantity
    #[arg(long)]
    pub unit: Option<String>,
    /// Spec row as LABEL=VALUE or LABEL=VALUE=UNIT (repeatable)
    #[arg(long = "spec", value_name = "LABEL=VALUE[=UNIT]")]
    pub specs: Vec<String>,
    /// Where to buy it / where it happens
    #[arg(long)]
    pub place: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
    /// Due time (HH:MM)
    #[arg(long)]
    pub time: Option<String>,
    /// Priority: high, mid, low or unset
    #[arg(long)]
    pub priority: Option<String>,
    /// Reference URL (repeatable)
    #[arg(long = "url")]
    pub urls: Vec<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Item name
    pub name: String,
    #[command(flatten)]
    pub fields: ItemFields,
    /// Image file to attach (repeatable)
    #[arg(long = "image", value_name = "PATH")]
    pub images: Vec<PathBuf>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Item id (or unique prefix, or exact name)
    pub id: String,
    /// New name
    #[arg(long)]
    pub name: Option<String>,
    #[command(flatten)]
    pub fields: ItemFields,
}

#[derive(Args, Default)]
pub struct ListArgs {
    /// Sort by: due, priority or created
    #[arg(long)]
    pub sort: Option<String>,
    /// Group by: all or place
    #[arg(long)]
    pub scope: Option<String>,
    /// Only show this place (implies --scope place)
    #[arg(long)]
    pub place: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Item id (or unique prefix, or exact name)
    pub id: String,
}

#[derive(Args)]
pub struct IdsArgs {
    /// Item ids (or unique prefixes, or exact names)
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct CheckPlaceArgs {
    /// Place label; use "(unset)" for items without a place
    pub place: String,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct HistoryCmd {
    #[command(subcommand)]
    pub action: Option<HistoryAction>,
    /// Only show one kind: names, specs or places
    pub kind: Option<String>,
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Rename a value everywhere it is used
    Rename(HistoryRenameArgs),
    /// Forget values (names delete their items)
    Purge(HistoryPurgeArgs),
}

#[derive(Args)]
pub struct HistoryRenameArgs {
    /// names, specs or places
    pub kind: String,
    pub old: String,
    pub new: String,
}

#[derive(Args)]
pub struct HistoryPurgeArgs {
    /// names, specs or places
    pub kind: String,
    #[arg(required = true)]
    pub values: Vec<String>,
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ImageCmd {
    #[command(subcommand)]
    pub action: ImageAction,
}

#[derive(Subcommand)]
pub enum ImageAction {
    /// Attach image files to an item
    Add(ImageAddArgs),
    /// Remove an image by its position (starting at 1)
    Rm(ImageRmArgs),
}

#[derive(Args)]
pub struct ImageAddArgs {
    pub id: String,
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct ImageRmArgs {
    pub id: String,
    pub index: usize,
}

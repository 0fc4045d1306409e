use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io::{self, CONFIG_FILE};
use crate::io::storage::FileStorage;
use crate::model::config::Config;

/// Build the config an `init` run should write
fn config_from_args(args: &InitArgs) -> Config {
    let mut config = Config::default();
    if let Some(key) = &args.key {
        config.storage.key = key.trim().to_string();
    }
    if let Some(hours) = args.retention_hours {
        config.retention.checked_hours = hours;
    }
    config
}

pub fn cmd_init(data_dir: &Path, args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = data_dir.join(CONFIG_FILE);
    if config_path.exists() && !args.force {
        return Err(format!(
            "shoplist already initialized at {} (use --force to overwrite)",
            config_path.display()
        )
        .into());
    }
    if args.retention_hours == Some(0) {
        return Err("--retention-hours must be at least 1".into());
    }

    let config = config_from_args(&args);
    // Reject keys that cannot be stored before writing anything
    let storage = FileStorage::open(data_dir)?;
    let items_path = storage.path_for(&config.storage.key)?;

    config_io::write_config(data_dir, &config)?;

    println!("Initialized shoplist in {}", data_dir.display());
    println!("  items: {}", items_path.display());
    println!("  checked items kept for {}h", config.retention.checked_hours);
    Ok(())
}

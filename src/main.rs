use clap::Parser;
use shoplist::cli::commands::Cli;
use shoplist::cli::handlers;
use tracing_subscriber::EnvFilter;

/// Log to stderr so stdout stays clean for list and JSON output.
///
/// Level comes from SHOPLIST_LOG, then RUST_LOG (default: warn).
fn init_logging() {
    let filter = EnvFilter::try_from_env("SHOPLIST_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = handlers::dispatch(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

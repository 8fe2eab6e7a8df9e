//! Depot CLI
//!
//! Run the share service against a console transport and drive it from
//! stdin, one command per line.
//!
//! Usage:
//!   depot-cli --serve                     # Config from DEPOT_* environment
//!   depot-cli --serve --testing           # Built-in test profile
//!   depot-cli --serve --db-path depot.db  # Override the database file

mod commands;
mod console;
mod events;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use depot_core::{Depot, DepotConfig};

use console::ConsoleTransport;

fn print_usage() {
    println!("Depot share service v0.1.0");
    println!();
    println!("Usage:");
    println!("  depot-cli --serve                   Run the service");
    println!("  depot-cli --serve --testing         Use the built-in test profile");
    println!();
    println!("Options:");
    println!("  --serve, -s                 Run in serve mode (required)");
    println!("  --db-path <PATH>            Database path (default: depot.db)");
    println!("  --testing                   Test profile instead of the environment");
    println!("  --help, -h                  Show this help");
    println!();
    println!("{}", commands::HELP);
    println!();
    println!("Environment:");
    println!("  DEPOT_CHANNEL_ID            Storage channel id (required)");
    println!("  DEPOT_BOT_USERNAME          Bot username used in links (required)");
    println!("  DEPOT_OPERATORS             Comma-separated operator ids");
    println!("  DEPOT_FORCE_SUB_CHANNELS    Channels users must join first");
    println!("  DEPOT_*                     Any other option, e.g. DEPOT_AUTO_DELETE_SECS");
    println!("  RUST_LOG                    Set log level (e.g., info, debug)");
}

async fn run_console(depot: Arc<Depot>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match commands::parse_command(&line) {
            Ok(command) => match commands::execute(&depot, command).await {
                Ok(output) => println!("{}", output),
                Err(e) => println!("error: {}", e),
            },
            Err(e) => println!("{} (try 'help')", e),
        }
    }
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let show_help = args.iter().any(|a| a == "--help" || a == "-h");
    let serve_mode = args.iter().any(|a| a == "--serve" || a == "-s");
    let testing_mode = args.iter().any(|a| a == "--testing");

    let db_path: Option<PathBuf> = args
        .windows(2)
        .find(|w| w[0] == "--db-path")
        .map(|w| PathBuf::from(&w[1]));

    if show_help || !serve_mode {
        print_usage();
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = if testing_mode {
        DepotConfig::for_testing()
    } else {
        match DepotConfig::from_env() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid configuration: {}", e);
                return;
            }
        }
    };
    let config = match db_path {
        Some(path) => config.with_db_path(path),
        None => config,
    };

    println!("Starting Depot...");
    let depot = match Depot::start(config, Arc::new(ConsoleTransport::new())).await {
        Ok(depot) => Arc::new(depot),
        Err(e) => {
            eprintln!("Failed to start Depot: {}", e);
            return;
        }
    };

    let event_task = tokio::spawn(events::run_event_loop(depot.clone()));

    println!("Depot running. Type 'help' for commands, Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!();
            info!("Received shutdown signal");
        }
        _ = run_console(depot.clone()) => {
            info!("Input closed");
        }
    }

    println!("Shutting down...");
    depot.stop().await;
    event_task.abort();
    println!("Done");
}

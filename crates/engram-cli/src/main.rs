//! `engram` – interactive shell over a [`MemoryCoordinator`].
//!
//! 1. Initialises tracing (`RUST_LOG`, `ENGRAM_LOG_FORMAT`, optional OTLP).
//! 2. Loads `~/.engram/config.toml`, falling back to defaults.
//! 3. Builds the engine and drops into the slash-command REPL.
//! 4. Ctrl-C stops the REPL at the next prompt.

mod repl;

use colored::Colorize;
use engram_runtime::config::{self, EngineConfig};
use engram_runtime::{MemoryCoordinator, telemetry};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

fn main() {
    let _guard = telemetry::init_tracing("engram");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – leaving after the current command.".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let cfg = load_config();
    let engine = match MemoryCoordinator::new(cfg) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "engine configuration rejected");
            println!("{}: {}", "Invalid configuration".red(), e);
            std::process::exit(1);
        }
    };

    println!(
        "  Type {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    repl::run(engine, shutdown);
}

fn load_config() -> EngineConfig {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            println!(
                "  No config at {} – using defaults.",
                config::config_path().display().to_string().dimmed()
            );
            let mut cfg = EngineConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            EngineConfig::default()
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___ _ __   __ _ _ __ __ _ _ __ ___  "#.bold().cyan());
    println!("{}", r#"  / _ \ '_ \ / _` | '__/ _` | '_ ` _ \ "#.bold().cyan());
    println!("{}", r#" |  __/ | | | (_| | | | (_| | | | | | |"#.bold().cyan());
    println!("{}", r#"  \___|_| |_|\__, |_|  \__,_|_| |_| |_|"#.bold().cyan());
    println!("{}", r#"             |___/                     "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "engram".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Tiered memory engine");
    println!();
}

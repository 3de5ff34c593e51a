//! `atsbridge-cli` – interactive shell for the ATS bridge
//!
//! This binary drives one simulated train through the bridge.  It:
//!
//! 1. Checks for `~/.atsbridge/config.toml`; runs a **First-Run Wizard** when
//!    the file is absent.
//! 2. Installs logging (`RUST_LOG`, `ATSBRIDGE_LOG_FORMAT`, optional OTLP).
//! 3. Reports whether this host can run legacy native modules.
//! 4. Drops the user into an **interactive REPL**; an optional argument names
//!    a train folder to load first.
//! 5. Intercepts **Ctrl-C**: cancels a load in progress, otherwise exits.

mod config;
mod repl;

use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::warn;

use atsbridge_runtime::{ModuleLoader, NativeLoader, telemetry};

fn main() {
    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => Some(cfg),
        Ok(None) => None,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            Some(config::Config::default())
        }
    };

    let _telemetry = telemetry::init_tracing_with(
        "atsbridge",
        cfg.as_ref().map(|c| c.log_format).unwrap_or_else(telemetry::LogFormat::from_env),
    );

    print_banner();

    let cfg = match cfg {
        Some(cfg) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        None => run_first_run_wizard(),
    };

    if NativeLoader.supports_platform() {
        println!("  Native safety modules: {}", "supported".green());
    } else {
        println!(
            "  Native safety modules: {} ({})",
            "unavailable".yellow(),
            "32-bit Windows only; use /load builtin".dimmed()
        );
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let signals = repl::Signals::default();
    let handler_signals = signals.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        if handler_signals.loading.load(Ordering::SeqCst) {
            println!("{}", "⚠  Ctrl-C received – cancelling load …".yellow().bold());
            handler_signals.cancel.store(true, Ordering::SeqCst);
        } else {
            println!("{}", "⚠  Ctrl-C received – exiting after the current command.".yellow().bold());
            handler_signals.shutdown.store(true, Ordering::SeqCst);
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    let initial_folder = std::env::args().nth(1).map(PathBuf::from);
    repl::run(cfg, signals, initial_folder);
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║     ATS Bridge First-Run Wizard      ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up the bridge.\n");

    let mut cfg = config::Config::default();

    println!("  How should the train start?");
    println!("    1) Service brakes, ATS on  (default)");
    println!("    2) Emergency brakes, ATS on");
    println!("    3) Emergency brakes, ATS off");
    let choice = repl::prompt_str("  Enter choice [1]: ", "1");
    cfg.start_mode = match choice.trim() {
        "2" => atsbridge_types::StartMode::EmergencyBrakesAts,
        "3" => atsbridge_types::StartMode::EmergencyBrakesNoAts,
        _ => atsbridge_types::StartMode::ServiceBrakesAts,
    };

    let encoding = repl::prompt_str(
        &format!("  Train file encoding [{}]: ", cfg.train_encoding),
        &cfg.train_encoding,
    );
    match atsbridge_runtime::resolve_encoding(&encoding) {
        Ok(_) => cfg.train_encoding = encoding,
        Err(e) => println!("  {} {}, keeping {}", "Warning:".yellow(), e, cfg.train_encoding),
    }

    let tick = repl::prompt_str(
        &format!("  Tick interval in ms [{}]: ", cfg.tick_interval_ms),
        &cfg.tick_interval_ms.to_string(),
    );
    match tick.parse::<u64>() {
        Ok(ms) if ms > 0 => cfg.tick_interval_ms = ms,
        _ => println!(
            "  {} '{}' is not a valid interval, keeping {}",
            "Warning:".yellow(),
            tick,
            cfg.tick_interval_ms
        ),
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___  ______ ____    ____       _     __        "#.bold().cyan());
    println!("{}", r#"   / _ |/_  __// __/   / __ )_____(_)___/ /___ ____"#.bold().cyan());
    println!("{}", r#"  / __ | / /  _\ \    / __  / __/ / __  / __ `/ -_)"#.bold().cyan());
    println!("{}", r#" /_/ |_|/_/  /___/   /____/_/ /_/\_,_/\_, /\__/ "#.bold().cyan());
    println!("{}", r#"                                     /___/        "#.bold().cyan());
    println!();
    println!("  {} {}", "ATS Bridge".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Train safety-system protocol bridge");
    println!();
}

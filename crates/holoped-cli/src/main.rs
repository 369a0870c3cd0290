//! `holoped` – HoloPed Command Line Interface
//!
//! A headless driver for the pedestrian synchronization core:
//!
//! - `holoped replay <file>` replays a recorded telemetry session (one JSON
//!   batch per line) through the full readiness → store → synchronizer path
//!   and prints a summary.
//! - `holoped config` prints the effective configuration.
//! - `holoped config init` writes the defaults to `~/.holoped/config.toml`.
//!
//! **Ctrl-C** stops a running replay after the current tick.

mod config;
mod replay;

use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

fn main() -> ExitCode {
    // Hold the guard until exit so pending spans are flushed.
    let _tracing = holoped_runtime::init_tracing("holoped");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["replay", file] => cmd_replay(PathBuf::from(*file)),
        ["config"] => cmd_show_config(),
        ["config", "init"] => cmd_init_config(),
        [] | ["help"] | ["--help"] | ["-h"] => {
            print_banner();
            print_usage();
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("{}: unrecognised arguments {:?}", "Error".red(), args);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_replay(path: PathBuf) -> ExitCode {
    print_banner();
    let cfg = load_config();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping replay …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; replay can only end with the recording");
    }

    println!("  Replaying {}", path.display().to_string().bold());
    match replay::run_replay(&cfg, &path, shutdown) {
        Ok(summary) => {
            println!();
            println!("  {} Replay finished", "✓".green().bold());
            println!("    ticks          {}", summary.ticks);
            println!("    agents         {}", summary.agents);
            println!("    created        {}", summary.created);
            println!("    handle updates {}", summary.updates);
            println!("    last batch     #{}", summary.last_sequence);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Replay failed".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_show_config() -> ExitCode {
    let cfg = load_config();
    println!();
    println!("  {}", "Current Configuration".bold().underline());
    println!("  {:<20} {} (live feed only)", "rosbridge url", cfg.rosbridge_url);
    println!("  {:<20} {} (live feed only)", "telemetry topic", cfg.telemetry_topic);
    println!("  {:<20} {} Hz", "tick rate", cfg.tick_hz);
    println!("  {:<20} {} ms", "replay interval", cfg.replay_interval_ms);
    println!("  {:<20} {}", "world scale", cfg.session.scale);
    println!("  {:<20} {}", "base speed", cfg.session.base_speed);
    println!("  {:<20} {}", "speed multiplier", cfg.session.speed_multiplier);
    println!(
        "  {:<20} {}",
        "file",
        config::config_path().display().to_string().dimmed()
    );
    println!();
    ExitCode::SUCCESS
}

fn cmd_init_config() -> ExitCode {
    let cfg = config::Config::default();
    match config::save(&cfg) {
        Ok(()) => {
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                config::config_path().display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error saving config".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Load the persisted config, falling back to defaults (with env overrides)
/// when it is absent or unreadable.
fn load_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => config::defaults_with_env(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::defaults_with_env()
        }
    }
}

fn print_usage() {
    println!("  {}", "Usage:".bold());
    println!("    {} {:<18} replay a recorded telemetry session", "holoped".cyan(), "replay <file>");
    println!("    {} {:<18} show the effective configuration", "holoped".cyan(), "config");
    println!("    {} {:<18} write the default configuration", "holoped".cyan(), "config init");
    println!();
}

fn print_banner() {
    println!();
    println!("{}", r#"   __ __     __     ___         __"#.bold().cyan());
    println!("{}", r#"  / // /__  / /__  / _ \___ ___/ /"#.bold().cyan());
    println!("{}", r#" / _  / _ \/ / _ \/ ___/ -_) _  / "#.bold().cyan());
    println!("{}", r#"/_//_/\___/_/\___/_/   \__/\_,_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "HoloPed".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Pedestrian telemetry for mixed-reality headsets");
    println!();
}

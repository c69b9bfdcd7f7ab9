//! `sarar` – SARAR robot command line.
//!
//! This binary boots the whole robot and hands the operator a prompt.  It:
//!
//! 1. Checks for `~/.sarar/config.toml` (or `$SARAR_CONFIG`); runs a
//!    **First-Run Wizard** when the file is absent.
//! 2. Boots the journal, drive, sensors, face, voice and AI backends.
//! 3. Greets the operator and drops into an **interactive REPL**: plain
//!    lines are robot commands, `/`-lines are shell commands.
//! 4. Intercepts **Ctrl-C** to halt the motors and exit safely.

mod config;
mod repl;
mod robot;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use tracing::{error, warn};

use sarar_hal::{ActuationGateway, Platform};
use sarar_runtime::{TelemetryConfig, init_tracing};

use crate::config::{ApiKey, Config, VoiceKind};
use crate::robot::Robot;

const GREETING: &str = "Hello, I am online and ready.";

fn main() {
    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Structured logging ────────────────────────────────────────────────
    // The guard flushes pending spans when main returns.
    let _tracing = init_tracing(
        "sarar",
        &TelemetryConfig {
            json: cfg.logging.format.eq_ignore_ascii_case("json"),
            otlp_endpoint: cfg.logging.otlp_endpoint.clone(),
        },
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            std::process::exit(1);
        }
    };

    // ── Boot ──────────────────────────────────────────────────────────────
    println!();
    let robot = match runtime.block_on(Robot::boot(&cfg, &config::home_dir())) {
        Ok(robot) => Arc::new(robot),
        Err(e) => {
            println!("{}", "FAILED".red().bold());
            println!("{}: {}", "Boot error".red(), e);
            std::process::exit(1);
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let drive = robot.drive.clone();
    let handle = runtime.handle().clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – halting motors …".yellow().bold());
        if let Err(e) = handle.block_on(drive.stop()) {
            warn!(subsystem = "MOTOR_ERROR", error = %e, "emergency stop failed");
        }
        println!("{}", "  ✓ Motors stopped.".green());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; emergency stop on Ctrl-C will not be available");
    }

    println!();
    runtime.block_on(robot.interpreter.announce(GREETING));
    println!(
        "\n  Type a command for SARAR, or {} for the shell commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&runtime, &robot, shutdown);

    println!("{}", "  Shutting down …".dimmed());
    runtime.block_on(robot.shutdown());
    println!("{}", "  ✓ SARAR offline.".green());
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        SARAR First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up SARAR.\n");

    let mut cfg = Config::default();

    // Primary AI
    let key = prompt_line("  OpenAI-compatible API key (Enter to skip): ", "");
    cfg.ai.openai_api_key = ApiKey::new(key);
    if !cfg.ai.openai_api_key.is_empty() {
        cfg.ai.openai_api_base = prompt_line(
            &format!("  API base URL [{}]: ", cfg.ai.openai_api_base),
            &cfg.ai.openai_api_base,
        );
    }

    // Fallback AI
    cfg.ai.local_model = prompt_line(
        &format!("  Local Ollama model [{}]: ", cfg.ai.local_model),
        &cfg.ai.local_model,
    );

    // Platform
    println!("  Which platform is this?");
    println!("    1) Simulation    (default)");
    println!("    2) Raspberry Pi");
    cfg.hardware.platform = match prompt_line("  Enter choice [1]: ", "1").trim() {
        "2" => Platform::RaspberryPi,
        _ => Platform::Simulation,
    };

    // Voice
    println!("  How should SARAR speak?");
    println!("    1) Print to the console  (default)");
    println!("    2) Piper text-to-speech");
    cfg.audio.voice = match prompt_line("  Enter choice [1]: ", "1").trim() {
        "2" => VoiceKind::Piper,
        _ => VoiceKind::Console,
    };

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _____ ___    ____  ___    ____ "#.bold().cyan());
    println!("{}", r#"  / ___//   |  / __ \/   |  / __ \"#.bold().cyan());
    println!("{}", r#"  \__ \/ /| | / /_/ / /| | / /_/ /"#.bold().cyan());
    println!("{}", r#" ___/ / ___ |/ _, _/ ___ |/ _, _/ "#.bold().cyan());
    println!("{}", r#"/____/_/  |_/_/ |_/_/  |_/_/ |_|  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "SARAR".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Voice-commanded robot with AI conversation");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}

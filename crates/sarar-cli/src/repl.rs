//! REPL – Read-Eval-Print Loop for talking to SARAR.
//!
//! Plain lines are robot commands ("go forward", "what do you see?").
//! Supported slash-commands:
//!   /help          – show this list
//!   /ask <text>    – send text straight to the AI, skipping the keywords
//!   /face          – show the current expression
//!   /history       – recent conversations from the journal
//!   /log [n]       – the last `n` activity lines (default 20)
//!   /forget        – clear conversation memory
//!   /models        – list models on both AI backends
//!   /quit | /exit  – halt the motors and exit

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::runtime::Runtime;
use tracing::warn;

use sarar_face::ExpressionSink;
use sarar_hal::ActuationGateway;
use sarar_runtime::CommandOutcome;

use crate::robot::Robot;

const PROMPT: &str = "sarar> ";
const HISTORY_LIMIT: usize = 10;
const DEFAULT_LOG_LINES: usize = 20;

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
enum Line<'a> {
    Empty,
    Command(&'a str),
    Help,
    Ask(&'a str),
    Face,
    History,
    Log(usize),
    Forget,
    Models,
    Quit,
    Unknown(&'a str),
}

fn parse(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Line::Empty;
    }
    if !line.starts_with('/') {
        return Line::Command(line);
    }
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match cmd {
        "/help" => Line::Help,
        "/ask" => Line::Ask(rest),
        "/face" => Line::Face,
        "/history" => Line::History,
        "/log" => Line::Log(rest.parse().unwrap_or(DEFAULT_LOG_LINES)),
        "/forget" => Line::Forget,
        "/models" => Line::Models,
        "/quit" | "/exit" => Line::Quit,
        _ => Line::Unknown(cmd),
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(runtime: &Runtime, robot: &Arc<Robot>, shutdown: Arc<AtomicBool>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        runtime.block_on(robot.interpreter.set_listening(true));
        let read = editor.readline(PROMPT);
        runtime.block_on(robot.interpreter.set_listening(false));

        let line = match read {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                // Raw mode swallows SIGINT, so Ctrl-C at the prompt lands here.
                println!("{}", "⚠  Ctrl-C received – halting motors …".yellow().bold());
                if let Err(e) = runtime.block_on(robot.drive.stop()) {
                    warn!(subsystem = "MOTOR_ERROR", error = %e, "emergency stop failed");
                }
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        if !line.trim().is_empty() {
            editor.add_history_entry(line.as_str()).ok();
        }

        match parse(&line) {
            Line::Empty => {}
            Line::Command(text) => {
                let outcome = runtime.block_on(robot.interpreter.interpret(text));
                print_outcome(robot, &outcome);
            }
            Line::Help => cmd_help(),
            Line::Ask("") => println!("  Usage: {} <text>", "/ask".bold()),
            Line::Ask(text) => {
                if let Some(reply) = runtime.block_on(robot.interpreter.process_text_input(text))
                    && robot.echo_responses
                {
                    println!("  {} {}", "SARAR ›".bold().magenta(), reply);
                }
            }
            Line::Face => println!("  Face: {}", robot.face.current_state().to_string().bold()),
            Line::History => cmd_history(robot),
            Line::Log(n) => cmd_log(robot, n),
            Line::Forget => {
                runtime.block_on(robot.interpreter.orchestrator().forget());
                println!("  {} Conversation memory cleared.", "✓".green());
            }
            Line::Models => runtime.block_on(cmd_models(robot)),
            Line::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Line::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn print_outcome(robot: &Robot, outcome: &CommandOutcome) {
    if outcome.actuated
        && let Some(intent) = outcome.intent
    {
        println!("  {} {}", "✓".green(), intent.to_string().dimmed());
    }
    if robot.echo_responses
        && let Some(response) = &outcome.response
    {
        println!("  {} {}", "SARAR ›".bold().magenta(), response);
    }
    if let Some(source) = outcome.source {
        println!("  {}", format!("(answered by {source})").dimmed());
    }
}

fn cmd_help() {
    println!();
    println!("{}", "SARAR Commands".bold().underline());
    println!("  Plain text is a command: \"go forward\", \"turn left\", \"stop\", \"status\",");
    println!("  or anything else to chat.");
    println!("  {}  – send text straight to the AI", "/ask <text>".bold().cyan());
    println!("  {}        – show the current expression", "/face".bold().cyan());
    println!("  {}     – recent conversations", "/history".bold().cyan());
    println!("  {}     – recent activity log", "/log [n]".bold().cyan());
    println!("  {}      – clear conversation memory", "/forget".bold().cyan());
    println!("  {}      – list AI models", "/models".bold().cyan());
    println!("  {} – halt and exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_history(robot: &Robot) {
    match robot.journal.recent_conversations(HISTORY_LIMIT) {
        Ok(records) if records.is_empty() => println!("  {}", "No conversations yet.".dimmed()),
        Ok(records) => {
            for r in records.iter().rev() {
                println!(
                    "  {} [{} {:.1}s]",
                    r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    r.ai_source,
                    r.processing_time
                );
                println!("    {} {}", "you  ›".bold(), r.user_input);
                println!("    {} {}", "SARAR›".bold().magenta(), r.ai_response);
            }
        }
        Err(e) => println!("{}: {}", "Journal error".red(), e),
    }
}

fn cmd_log(robot: &Robot, n: usize) {
    match robot.journal.recent_activity(n) {
        Ok(entries) => {
            for e in entries.iter().rev() {
                let tag = if e.tag.contains("ERROR") || e.tag.contains("WARN") {
                    e.tag.yellow()
                } else {
                    e.tag.cyan()
                };
                println!(
                    "  {} {:<20} {}",
                    e.timestamp.format("%H:%M:%S").to_string().dimmed(),
                    tag,
                    e.details
                );
            }
        }
        Err(e) => println!("{}: {}", "Journal error".red(), e),
    }
}

async fn cmd_models(robot: &Robot) {
    println!("{}", "Primary".bold().underline());
    match &robot.primary {
        None => println!("  {}", "not configured (no API key)".dimmed()),
        Some(backend) => {
            println!("  Active: {}", backend.model().bold());
            match backend.list_models().await {
                Ok(models) => {
                    for m in models {
                        println!("    • {}", m);
                    }
                }
                Err(e) => println!("  {} {}", "unreachable:".yellow(), e),
            }
        }
    }

    println!("{}", "Fallback".bold().underline());
    match &robot.local {
        None => println!("  {}", "not configured".dimmed()),
        Some(backend) => {
            let state = if backend.is_loaded() { "loaded".green() } else { "not loaded".yellow() };
            println!("  Model: {} ({})", backend.model().bold(), state);
            match backend.list_models().await {
                Ok(models) => {
                    for m in models {
                        println!("    • {}", m.name);
                    }
                }
                Err(e) => println!("  {} {}", "offline:".yellow(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_robot_command() {
        assert_eq!(parse("  go forward "), Line::Command("go forward"));
        assert_eq!(parse("   "), Line::Empty);
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(parse("/help"), Line::Help);
        assert_eq!(parse("/ask  what is your name? "), Line::Ask("what is your name?"));
        assert_eq!(parse("/ask"), Line::Ask(""));
        assert_eq!(parse("/face"), Line::Face);
        assert_eq!(parse("/history"), Line::History);
        assert_eq!(parse("/forget"), Line::Forget);
        assert_eq!(parse("/models"), Line::Models);
        assert_eq!(parse("/quit"), Line::Quit);
        assert_eq!(parse("/exit"), Line::Quit);
    }

    #[test]
    fn log_takes_optional_count() {
        assert_eq!(parse("/log"), Line::Log(DEFAULT_LOG_LINES));
        assert_eq!(parse("/log 5"), Line::Log(5));
        assert_eq!(parse("/log many"), Line::Log(DEFAULT_LOG_LINES));
    }

    #[test]
    fn unknown_slash_command_is_reported() {
        assert_eq!(parse("/dance now"), Line::Unknown("/dance"));
    }
}

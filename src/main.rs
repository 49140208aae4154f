// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parley main entry point - CLI and REPL.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use parley::config::{self, CliOptions, ResolvedConfig};
use parley::error::SessionError;
use parley::session::{ChatSession, StopHandle, TurnOutcome};
use parley::telemetry::{init_telemetry, TelemetryConfig, GLOBAL_METRICS};
use parley::transport::OpenAiTransport;
use parley::types::Role;

/// Parley - chat with an OpenAI-compatible model from the terminal.
#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about = "Streaming chat with OpenAI-compatible models", long_about = None)]
struct Cli {
    /// Base URL for the API
    #[arg(long, env = "PARLEY_BASE_URL")]
    base_url: Option<String>,

    /// Model to use
    #[arg(short, long, env = "PARLEY_MODEL")]
    model: Option<String>,

    /// Environment variable holding the API key
    #[arg(long)]
    api_key_env: Option<String>,

    /// System prompt for the conversation
    #[arg(short, long)]
    system: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Maximum tokens per reply
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Run a single prompt and exit
    #[arg(short = 'P', long)]
    prompt: Option<String>,

    /// Show debug logs and a metrics report on exit
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> CliOptions {
        CliOptions {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key_env: self.api_key_env.clone(),
            system_prompt: self.system.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Result sent back for tool calls; the CLI has no tools to run.
const TOOL_UNAVAILABLE: &str = "Tool execution is not available in this client.";

/// Follow-up generations allowed per prompt before giving up on tool calls.
const MAX_TOOL_ROUNDS: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = init_telemetry(&TelemetryConfig::for_cli(cli.verbose))?;

    let workspace_root = std::env::current_dir()?;
    let config = config::load_config(&workspace_root, cli.options())?;

    let transport = OpenAiTransport::from_config(&config)?;
    let session = Arc::new(ChatSession::new(transport, config.session_options()));
    attach_printers(&session);
    spawn_interrupt_handler(session.stop_handle());

    let result = match cli.prompt {
        Some(ref prompt) => run_turn(&session, prompt).await.map_err(anyhow::Error::from),
        None => run_repl(&session, &config).await,
    };

    if cli.verbose {
        eprintln!("{}", GLOBAL_METRICS.snapshot().format_report());
    }
    result
}

fn attach_printers(session: &ChatSession) {
    session.on_delta(|text| {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    });
    session.on_tool_call(|call| {
        println!(
            "\n{} {}({})",
            "tool".bright_magenta().bold(),
            call.name.bright_white(),
            call.arguments.to_string().dimmed()
        );
    });
    session.on_error(|err| {
        eprintln!("\n{} {}", "error:".red().bold(), err);
    });
    session.on_aborted(|| {
        println!("\n{}", "[stopped]".yellow());
    });
}

/// Ctrl-C stops the active generation; outside a generation it exits.
fn spawn_interrupt_handler(handle: StopHandle) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !handle.stop() {
                std::process::exit(130);
            }
        }
    });
}

/// Send one message and keep answering tool calls until the model replies
/// with text only.
async fn run_turn(session: &ChatSession, prompt: &str) -> Result<(), SessionError> {
    let mut outcome = session.send_user_message(prompt).await?;
    let mut rounds = 0;

    loop {
        let completion = match outcome {
            TurnOutcome::Completed(completion) => completion,
            TurnOutcome::Aborted => return Ok(()),
        };
        println!();

        if !completion.has_tool_calls() {
            return Ok(());
        }
        if rounds == MAX_TOOL_ROUNDS {
            println!(
                "{}",
                format!("Stopped after {} tool-call rounds.", MAX_TOOL_ROUNDS).yellow()
            );
            return Ok(());
        }
        rounds += 1;

        for call in &completion.tool_calls {
            session.append_tool_result(&call.id, &serde_json::json!({ "error": TOOL_UNAVAILABLE }))?;
        }
        outcome = session.generate().await?;
    }
}

async fn run_repl(session: &ChatSession, config: &ResolvedConfig) -> anyhow::Result<()> {
    println!(
        "{} {} via {} ({})",
        "parley".bright_cyan().bold(),
        parley::VERSION,
        session.transport_name(),
        config.model.bright_white()
    );
    println!("{}", "Commands: /reset /history /exit. Ctrl-C stops a reply.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".bright_green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/exit" | "/quit" => break,
            "/reset" => {
                match config.system_prompt {
                    Some(ref prompt) => session.initialize(prompt.clone()),
                    None => session.reset(),
                }
                println!("{}", "Conversation cleared.".dimmed());
            }
            "/history" => print_history(session),
            _ => {
                match run_turn(session, input).await {
                    Ok(()) => {}
                    // Already reported through the error signal
                    Err(SessionError::Transport(_)) => {}
                    Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
                }
            }
        }
    }

    Ok(())
}

fn print_history(session: &ChatSession) {
    for message in session.history() {
        let role = match message.role {
            Role::System => "system".dimmed(),
            Role::User => "user".bright_green(),
            Role::Assistant => "assistant".bright_cyan(),
            Role::Tool => "tool".bright_magenta(),
        };
        if let Some(text) = message.as_text() {
            println!("{}: {}", role, text);
        }
        for call in message.requested_tool_calls() {
            println!("{}: -> {}({})", role, call.name, call.arguments_json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley::session::SessionOptions;
    use parley::transport::{Script, ScriptedTransport};
    use parley::types::ToolCallFragment;

    fn tool_call_script(id: &str) -> Script {
        Script::new().fragment(
            ToolCallFragment::new(0)
                .with_id(id)
                .with_name("lookup")
                .with_arguments("{}"),
        )
    }

    #[tokio::test]
    async fn test_run_turn_stops_after_max_tool_rounds() {
        let scripts: Vec<Script> = (0..MAX_TOOL_ROUNDS + 2)
            .map(|i| tool_call_script(&format!("call_{}", i)))
            .collect();
        let transport = Arc::new(ScriptedTransport::with_scripts(scripts));
        let session = ChatSession::from_shared(transport.clone(), SessionOptions::default());

        run_turn(&session, "loop forever").await.unwrap();

        assert_eq!(transport.requests().len(), MAX_TOOL_ROUNDS + 1);
        assert_eq!(transport.remaining(), 1);
        // The last round's calls are left unanswered
        assert_eq!(session.pending_tool_call_ids(), vec![format!("call_{}", MAX_TOOL_ROUNDS)]);
    }

    #[tokio::test]
    async fn test_run_turn_answers_tool_calls_until_text() {
        let transport = Arc::new(ScriptedTransport::with_scripts([
            tool_call_script("call_0"),
            Script::new().text("done"),
        ]));
        let session = ChatSession::from_shared(transport.clone(), SessionOptions::default());

        run_turn(&session, "hi").await.unwrap();

        assert_eq!(transport.requests().len(), 2);
        assert!(session.pending_tool_call_ids().is_empty());
        assert_eq!(session.last_message().map(|m| m.role), Some(Role::Assistant));
    }
}

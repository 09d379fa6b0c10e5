//! Magic Sheets CLI - spreadsheet assistant in the terminal

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use magic_sheets::prelude::*;
use magic_sheets::prompt::{predefined_prompt, PREDEFINED_PROMPTS};
use magic_sheets::{encode_frame, AssistantConfig, CsvReadOptions, SandboxConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "magic")]
#[command(author, version, about = "Spreadsheet assistant with reviewable changes")]
struct Cli {
    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a CSV file, apply cell edits and print the result as CSV
    Eval {
        /// Input CSV file (default: empty sheet)
        input: Option<PathBuf>,

        /// Cell edit as TARGET=CONTENTS, e.g. C2==SUM(A2:B2)
        #[arg(short, long = "set", value_name = "TARGET=CONTENTS")]
        edits: Vec<String>,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Chat with the assistant about a sheet
    Chat {
        /// CSV file to start from
        input: Option<PathBuf>,

        /// Model name (default: $MAGIC_SHEETS_MODEL or gpt-4o)
        #[arg(short, long)]
        model: Option<String>,

        /// Python interpreter for analysis code
        #[arg(long, default_value = "python3")]
        python: String,

        /// Analysis time limit in milliseconds
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,

        /// Tidy analysis output with a second model call
        #[arg(long)]
        structure_output: bool,

        /// Print events as `data: {json}` frames instead of text
        #[arg(long)]
        sse: bool,
    },

    /// List the predefined prompts
    Prompts,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Eval {
            input,
            edits,
            output,
        } => eval(input.as_deref(), &edits, output.as_deref()),
        Commands::Chat {
            input,
            model,
            python,
            timeout_ms,
            structure_output,
            sse,
        } => {
            let mut config = AssistantConfig::from_env();
            if let Some(model) = model {
                config.model = model;
            }
            config.structure_analysis_output = structure_output;
            let sandbox = SandboxConfig {
                python,
                timeout: Duration::from_millis(timeout_ms),
                ..Default::default()
            };

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(chat(input.as_deref(), config, sandbox, sse))
        }
        Commands::Prompts => {
            for prompt in PREDEFINED_PROMPTS.iter() {
                println!("{:<16} {}", prompt.id, prompt.title);
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_sheet(session: &mut Session, input: Option<&Path>) -> Result<()> {
    if let Some(path) = input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        session
            .load_csv(&text, &CsvReadOptions::default())
            .with_context(|| format!("Failed to parse '{}'", path.display()))?;
        info!(path = %path.display(), "sheet loaded");
    }
    Ok(())
}

fn parse_edit(edit: &str) -> Result<(&str, &str)> {
    match edit.split_once('=') {
        Some((target, contents)) if !target.trim().is_empty() => Ok((target.trim(), contents)),
        _ => bail!("Expected TARGET=CONTENTS, got '{}'", edit),
    }
}

/// Apply a `TARGET=CONTENTS` edit typed at the chat prompt
fn set_cell(session: &mut Session, edit: &str) -> Result<()> {
    let (target, contents) = parse_edit(edit)?;
    if session.edit_cell(target, contents).failed() > 0 {
        bail!("Invalid cell reference '{}'", target);
    }
    Ok(())
}

fn eval(input: Option<&Path>, edits: &[String], output: Option<&Path>) -> Result<()> {
    let mut reconciler = Reconciler::new();
    if let Some(path) = input {
        let grid = CsvReader::read_file(path, &CsvReadOptions::default())
            .with_context(|| format!("Failed to open '{}'", path.display()))?;
        reconciler.sheet_mut().load_grid(grid);
    }

    let updates = edits
        .iter()
        .map(|edit| parse_edit(edit).map(|(target, contents)| CellUpdate::new(target, contents)))
        .collect::<Result<Vec<_>>>()?;

    let report = reconciler.set_many(&updates);
    if report.failed() > 0 {
        eprintln!(
            "Applied {} edits ({} skipped)",
            report.applied(),
            report.failed()
        );
    }

    let csv = reconciler.sheet().to_csv()?;
    match output {
        Some(path) => std::fs::write(path, csv)
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => print!("{}", csv),
    }
    Ok(())
}

const CHAT_HELP: &str = "Commands:
  :accept        apply the last proposal
  :reject        discard the last proposal
  :show          print the sheet as CSV
  :json          print the chat history as JSON
  :prompt <id>   send a predefined prompt
  :set A1=...    edit a cell directly
  :quit          exit
Ctrl-C stops a running answer.";

async fn chat(
    input: Option<&Path>,
    config: AssistantConfig,
    sandbox: SandboxConfig,
    sse: bool,
) -> Result<()> {
    let mut session = Session::openai(config, sandbox).context("Failed to set up the assistant")?;
    load_sheet(&mut session, input)?;
    eprintln!("{}", CHAT_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_turn: Option<String> = None;

    loop {
        eprint!("> ");
        std::io::stderr().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        let message = match line.split_once(' ').unwrap_or((line, "")) {
            ("", _) => continue,
            (":quit", _) | (":q", _) => break,
            (":help", _) => {
                eprintln!("{}", CHAT_HELP);
                continue;
            }
            (":accept", _) => {
                match &last_turn {
                    Some(id) => {
                        let report = session.accept(id)?;
                        eprintln!(
                            "Applied {} changes ({} skipped, {} charts)",
                            report.applied(),
                            report.failed(),
                            report.charts.len()
                        );
                    }
                    None => eprintln!("Nothing to accept"),
                }
                continue;
            }
            (":reject", _) => {
                match &last_turn {
                    Some(id) if session.reject(id)? => eprintln!("Proposal discarded"),
                    _ => eprintln!("Nothing to reject"),
                }
                continue;
            }
            (":show", _) => {
                print!("{}", session.sheet().to_csv()?);
                continue;
            }
            (":json", _) => {
                println!("{}", serde_json::to_string_pretty(session.history().turns())?);
                continue;
            }
            (":set", edit) => {
                if let Err(err) = set_cell(&mut session, edit) {
                    eprintln!("{}", err);
                }
                continue;
            }
            (":prompt", id) => match predefined_prompt(id.trim()) {
                Some(prompt) => prompt.content.to_string(),
                None => {
                    eprintln!("Unknown prompt '{}'", id.trim());
                    continue;
                }
            },
            _ => line.to_string(),
        };

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let mut printed = String::new();
        let turn = session
            .chat(&message, cancel, |event| print_event(event, sse, &mut printed))
            .await?;
        watcher.abort();
        debug!(turn = %turn.id, status = ?turn.status, "turn finished");

        if !sse {
            println!();
            if turn.is_pending() {
                eprintln!("(:accept to apply, :reject to discard)");
            }
        }
        last_turn = Some(turn.id);
    }

    Ok(())
}

fn print_event(event: &TurnEvent, sse: bool, printed: &mut String) {
    if sse {
        if let Some(frame) = event.to_frame() {
            match encode_frame(&frame) {
                Ok(encoded) => print!("{}", encoded),
                Err(err) => eprintln!("Failed to encode event: {}", err),
            }
        }
    } else {
        match event {
            TurnEvent::TextDelta(text) => {
                print!("{}", text);
                printed.push_str(text);
            }
            // only print what streaming has not shown yet
            TurnEvent::ToolResult(outcome) => match outcome.text().strip_prefix(printed.as_str()) {
                Some(rest) => print!("{}", rest),
                None => print!("\n{}", outcome.text()),
            },
            TurnEvent::Failed(message) => eprint!("Error: {}", message),
            TurnEvent::Aborted => print!("{}", magic_sheets::STOP_MARKER),
            TurnEvent::Done => {}
        }
    }
    let _ = std::io::stdout().flush();
}

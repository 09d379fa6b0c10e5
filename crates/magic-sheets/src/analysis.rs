//! Analysis requests, the code sandbox and the output-to-cells mapper

use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::completion::{ChatMessage, CompletionService};
use crate::config::SandboxConfig;
use crate::error::{CompletionError, Result, SandboxError};
use crate::update::CellUpdate;
use magic_sheets_core::CellAddress;

fn default_start_cell() -> String {
    "A1".to_string()
}

/// Arguments of an `execute_python_code` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(rename = "analysis_goal")]
    pub goal: String,
    #[serde(rename = "suggested_code")]
    pub code: String,
    /// Anchor of the first output row
    #[serde(default = "default_start_cell")]
    pub start_cell: String,
}

/// What the sandbox printed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Analysis summary shown alongside a chat turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub goal: String,
    pub output: String,
    /// Sandbox stderr or the failure message
    pub error: String,
}

/// Isolated code executor
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run `code` with `csv` as the sheet's contents
    async fn run(&self, code: &str, csv: &str) -> std::result::Result<SandboxOutput, SandboxError>;
}

const PRELUDE: &str = r#"import io
import sys
import pandas as pd
import numpy as np
_sheet_csv = sys.stdin.read()
df = pd.read_csv(io.StringIO(_sheet_csv)) if _sheet_csv.strip() else pd.DataFrame()
"#;

/// Runs code with a local Python interpreter in a child process
///
/// The sheet arrives on stdin and is loaded into the DataFrame `df` with
/// pandas and numpy already imported. The child is killed when the
/// configured timeout elapses.
#[derive(Debug, Clone, Default)]
pub struct PythonSandbox {
    config: SandboxConfig,
}

impl PythonSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Sandbox for PythonSandbox {
    async fn run(&self, code: &str, csv: &str) -> std::result::Result<SandboxOutput, SandboxError> {
        let mut command = Command::new(&self.config.python);
        command
            .arg("-c")
            .arg(format!("{}{}", PRELUDE, code))
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(python = %self.config.python, code_len = code.len(), "starting analysis sandbox");
        let mut child = command.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SandboxError::NotFound(self.config.python.clone())
            } else {
                SandboxError::Io(err)
            }
        })?;

        let stdin = child.stdin.take();
        let input = csv.as_bytes().to_vec();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let run = async move { tokio::join!(feed, child.wait_with_output()) };
        let limit = self.config.timeout;
        let (fed, output) = tokio::time::timeout(limit, run)
            .await
            .map_err(|_| SandboxError::Timeout(limit.as_millis() as u64))?;

        if let Err(err) = fed {
            // the script may exit without reading the sheet
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(SandboxError::Io(err));
            }
        }

        let output = output?;
        debug!(status = ?output.status, "analysis sandbox finished");
        Ok(SandboxOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Map comma-separated output lines onto cells anchored at `start_cell`
///
/// Line `i`, field `j` lands `i` rows down and `j` columns right of the
/// anchor, rolling over from `Z` to `AA` like any other column. Fields are
/// trimmed. Blank output maps to no updates.
pub fn map_output(stdout: &str, start_cell: &str) -> Result<Vec<CellUpdate>> {
    let start = CellAddress::decode(start_cell)?;
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Ok(Vec::new());
    }

    let updates = stdout
        .lines()
        .enumerate()
        .flat_map(|(i, line)| {
            line.split(',').enumerate().map(move |(j, field)| {
                CellUpdate::new(start.offset(i as u32, j as u32).encode(), field.trim())
            })
        })
        .collect();

    Ok(updates)
}

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```").expect("valid code fence pattern"));

/// Remove fenced blocks and stray backticks
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").replace("```", "").trim().to_string()
}

const STRUCTURE_PROMPT: &str = "Convert the following analysis output into a clean tabular format.
Each row should be comma-separated values, with the first row being headers.
Ensure numbers are properly formatted and aligned.
The output should be ready to insert into a spreadsheet.

IMPORTANT: Do not use any markdown formatting or code blocks in your response.
Just return plain text with comma-separated values.";

/// Ask the model to turn raw analysis output into CSV rows with a header
pub async fn structure_output(
    service: &dyn CompletionService,
    raw_output: &str,
    goal: &str,
) -> std::result::Result<String, CompletionError> {
    let messages = [
        ChatMessage::system(STRUCTURE_PROMPT),
        ChatMessage::user(format!(
            "Analysis Goal: {}\n\nRaw Output:\n{}\n\nConvert this into comma-separated rows with headers.",
            goal,
            strip_code_fences(raw_output)
        )),
    ];

    let reply = service.complete(&messages, 0.1).await?;
    Ok(strip_code_fences(&reply))
}

/// Result of running one analysis request end to end
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub updates: Vec<CellUpdate>,
    pub report: AnalysisReport,
}

/// Run `request` against `csv` and map its output to cell updates
///
/// With a `structurer`, stdout is first tidied by the model; if that call
/// fails the raw stdout is mapped instead. Sandbox failures and timeouts
/// are returned as errors and leave nothing to apply.
pub async fn run_analysis(
    sandbox: &dyn Sandbox,
    structurer: Option<&dyn CompletionService>,
    request: &AnalysisRequest,
    csv: &str,
) -> Result<AnalysisResult> {
    let output = sandbox.run(&request.code, csv).await?;
    if !output.stderr.trim().is_empty() {
        warn!(goal = %request.goal, stderr = %output.stderr.trim(), "analysis wrote to stderr");
    }

    let table = match structurer {
        Some(service) if !output.stdout.trim().is_empty() => {
            match structure_output(service, &output.stdout, &request.goal).await {
                Ok(table) => table,
                Err(err) => {
                    warn!(error = %err, "output structuring failed, using raw stdout");
                    output.stdout.clone()
                }
            }
        }
        _ => output.stdout.clone(),
    };

    let updates = map_output(&table, &request.start_cell)?;
    Ok(AnalysisResult {
        updates,
        report: AnalysisReport {
            goal: request.goal.clone(),
            output: output.stdout,
            error: output.stderr,
        },
    })
}

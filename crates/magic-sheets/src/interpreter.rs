//! Tool-call interpreter: runs one chat turn against the completion service
//!
//! A turn streams free text first, then asks the model to pick a tool with
//! that text as context. Only the first tool call is acted on. Progress is
//! reported as [`TurnEvent`]s over a channel; the turn never touches the
//! sheet or the queue itself.

use std::sync::Arc;

use futures::StreamExt;
use magic_sheets_chart::ChartSpecification;
use magic_sheets_core::Grid;
use magic_sheets_csv::{CsvWriteOptions, CsvWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analysis::{run_analysis, AnalysisReport, AnalysisRequest, Sandbox};
use crate::completion::{CompletionRequest, CompletionService};
use crate::config::AssistantConfig;
use crate::error::{Result, SessionError, ToolError};
use crate::prompt;
use crate::tools::{tool_definitions, ToolCall};
use crate::update::{ensure_unique_targets, CellUpdate};
use crate::workflow::{ChatTurn, Proposal};

/// Progress of a running turn
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A streamed piece of assistant text
    TextDelta(String),
    /// The tool phase finished
    ToolResult(TurnOutcome),
    /// The turn failed; nothing is proposed
    Failed(String),
    /// The turn completed normally
    Done,
    /// The caller cancelled the turn
    Aborted,
}

/// What a finished turn proposes
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    TextOnly {
        text: String,
    },
    CellUpdates {
        updates: Vec<CellUpdate>,
        text: String,
    },
    Chart {
        chart: ChartSpecification,
        text: String,
    },
    Analysis {
        updates: Vec<CellUpdate>,
        report: AnalysisReport,
        text: String,
    },
}

impl TurnOutcome {
    /// Full assistant text for the transcript
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::TextOnly { text }
            | TurnOutcome::CellUpdates { text, .. }
            | TurnOutcome::Chart { text, .. }
            | TurnOutcome::Analysis { text, .. } => text,
        }
    }

    /// Changes awaiting review, if the outcome carries any
    pub fn proposal(&self) -> Option<Proposal> {
        match self {
            TurnOutcome::TextOnly { .. } => None,
            TurnOutcome::CellUpdates { updates, .. } | TurnOutcome::Analysis { updates, .. } => {
                if updates.is_empty() {
                    None
                } else {
                    Some(Proposal::Updates(updates.clone()))
                }
            }
            TurnOutcome::Chart { chart, .. } => Some(Proposal::Chart(chart.clone())),
        }
    }

    pub fn analysis(&self) -> Option<&AnalysisReport> {
        match self {
            TurnOutcome::Analysis { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Everything a turn needs from the session, captured when it starts
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub user_text: String,
    /// Earlier turns, oldest first
    pub history: Vec<ChatTurn>,
    /// Displayed sheet values
    pub snapshot: Grid,
}

/// Drives chat turns through the completion service and the sandbox
#[derive(Clone)]
pub struct Interpreter {
    completion: Arc<dyn CompletionService>,
    sandbox: Arc<dyn Sandbox>,
    config: AssistantConfig,
}

impl Interpreter {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        sandbox: Arc<dyn Sandbox>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            completion,
            sandbox,
            config,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Run one turn, reporting progress on `events`
    ///
    /// The last event sent is `Done`, `Failed` or `Aborted`. `cancel` is
    /// honoured before each streamed chunk, before tool selection and
    /// before the sandbox starts; a sandbox run already started finishes
    /// but its result is discarded.
    pub async fn run(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
        events: mpsc::Sender<TurnEvent>,
    ) {
        let last = match self.drive(&request, &cancel, &events).await {
            Ok(outcome) => {
                let _ = events.send(TurnEvent::ToolResult(outcome)).await;
                TurnEvent::Done
            }
            Err(SessionError::Aborted) => {
                info!("turn aborted");
                TurnEvent::Aborted
            }
            Err(err) => {
                warn!(error = %err, "turn failed");
                TurnEvent::Failed(err.to_string())
            }
        };
        let _ = events.send(last).await;
    }

    async fn drive(
        &self,
        request: &TurnRequest,
        cancel: &CancellationToken,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome> {
        let prompt = prompt::build_request(
            &request.snapshot,
            &request.history,
            &request.user_text,
            self.config.history_turns,
            self.config.history_chars,
        );

        let text = self.stream_text(&prompt, cancel, events).await?;

        ensure_live(cancel)?;
        let tools = tool_definitions();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Aborted),
            response = self.completion.select_tool(&prompt, &text, &tools) => response?,
        };
        ensure_live(cancel)?;

        let text = if text.is_empty() {
            response.assistant_text
        } else {
            text
        };

        let Some(raw) = response.tool_calls.first() else {
            return Ok(TurnOutcome::TextOnly { text });
        };
        if response.tool_calls.len() > 1 {
            debug!(
                ignored = response.tool_calls.len() - 1,
                "only the first tool call is used"
            );
        }

        let call = match ToolCall::parse(raw) {
            Ok(call) => call,
            Err(ToolError::UnknownTool(name)) => {
                warn!(tool = %name, "model asked for an unknown tool");
                return Ok(TurnOutcome::TextOnly { text });
            }
            Err(err) => return Err(err.into()),
        };
        info!(tool = call.name(), "tool selected");

        match call {
            ToolCall::SetCells(updates) => {
                ensure_unique_targets(&updates)?;
                let listing: Vec<String> = updates.iter().map(ToString::to_string).collect();
                let text = format!("{}\n\nSpreadsheet Updates:\n{}", text, listing.join("\n"));
                Ok(TurnOutcome::CellUpdates { updates, text })
            }
            ToolCall::CreateChart(chart) => {
                let text = format!(
                    "{}\n\nChart Data:\nType: {}\nTitle: {}\nData:\n{}",
                    text,
                    chart.kind,
                    chart.title,
                    chart.text_rows().join("\n")
                );
                Ok(TurnOutcome::Chart { chart, text })
            }
            ToolCall::ExecutePython(analysis) => {
                ensure_live(cancel)?;
                let outcome = self.analyze(&analysis, &request.snapshot).await?;
                ensure_live(cancel)?;
                Ok(outcome)
            }
        }
    }

    /// Phase one: forward text deltas until the stream ends
    async fn stream_text(
        &self,
        prompt: &CompletionRequest,
        cancel: &CancellationToken,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Result<String> {
        ensure_live(cancel)?;
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Aborted),
            stream = self.completion.stream_text(prompt) => stream?,
        };

        let mut text = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SessionError::Aborted),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(delta)) => {
                    text.push_str(&delta);
                    let _ = events.send(TurnEvent::TextDelta(delta)).await;
                }
                Some(Err(err)) => return Err(err.into()),
                None => break,
            }
        }

        debug!(chars = text.len(), "text phase finished");
        Ok(text)
    }

    /// Run analysis code; sandbox failures become part of the outcome
    async fn analyze(
        &self,
        request: &AnalysisRequest,
        snapshot: &Grid,
    ) -> Result<TurnOutcome> {
        let csv = CsvWriter::to_string(snapshot, &CsvWriteOptions::default())?;
        let structurer = if self.config.structure_analysis_output {
            Some(self.completion.as_ref())
        } else {
            None
        };

        match run_analysis(self.sandbox.as_ref(), structurer, request, &csv).await {
            Ok(result) => {
                let text = format!(
                    "Analysis: {}\n\nResults:\n{}",
                    request.goal, result.report.output
                );
                Ok(TurnOutcome::Analysis {
                    updates: result.updates,
                    report: result.report,
                    text,
                })
            }
            Err(err) => {
                warn!(goal = %request.goal, error = %err, "analysis failed");
                let text = match &err {
                    SessionError::InvalidAddress(_) => {
                        format!("Could not place the analysis results: {}", err)
                    }
                    _ => format!("An error occurred while executing the Python code: {}", err),
                };
                Ok(TurnOutcome::Analysis {
                    updates: Vec::new(),
                    report: AnalysisReport {
                        goal: request.goal.clone(),
                        output: String::new(),
                        error: err.to_string(),
                    },
                    text,
                })
            }
        }
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(SessionError::Aborted)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SandboxOutput;
    use crate::completion::{ChatMessage, TextStream, ToolResponse};
    use crate::error::{CompletionError, SandboxError};
    use crate::tools::RawToolCall;
    use async_trait::async_trait;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    struct Scripted {
        deltas: Vec<&'static str>,
        tool_calls: Vec<RawToolCall>,
    }

    #[async_trait]
    impl CompletionService for Scripted {
        async fn stream_text(
            &self,
            _request: &CompletionRequest,
        ) -> std::result::Result<TextStream, CompletionError> {
            let deltas: Vec<std::result::Result<String, CompletionError>> =
                self.deltas.iter().map(|d| Ok(d.to_string())).collect();
            Ok(stream::iter(deltas).boxed())
        }

        async fn select_tool(
            &self,
            _request: &CompletionRequest,
            _assistant_text: &str,
            _tools: &Value,
        ) -> std::result::Result<ToolResponse, CompletionError> {
            Ok(ToolResponse {
                assistant_text: String::new(),
                tool_calls: self.tool_calls.clone(),
            })
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _temperature: f32,
        ) -> std::result::Result<String, CompletionError> {
            Ok(String::new())
        }
    }

    struct NoSandbox;

    #[async_trait]
    impl Sandbox for NoSandbox {
        async fn run(
            &self,
            _code: &str,
            _csv: &str,
        ) -> std::result::Result<SandboxOutput, SandboxError> {
            Err(SandboxError::Timeout(5000))
        }
    }

    struct Prints(&'static str);

    #[async_trait]
    impl Sandbox for Prints {
        async fn run(
            &self,
            _code: &str,
            _csv: &str,
        ) -> std::result::Result<SandboxOutput, SandboxError> {
            Ok(SandboxOutput {
                stdout: self.0.to_string(),
                stderr: String::new(),
            })
        }
    }

    async fn run_turn(service: Scripted) -> Vec<TurnEvent> {
        run_turn_with(service, Arc::new(NoSandbox)).await
    }

    async fn run_turn_with(service: Scripted, sandbox: Arc<dyn Sandbox>) -> Vec<TurnEvent> {
        let interpreter = Interpreter::new(Arc::new(service), sandbox, AssistantConfig::default());
        let (tx, mut rx) = mpsc::channel(16);
        let request = TurnRequest {
            user_text: "go".into(),
            history: Vec::new(),
            snapshot: Grid::new(),
        };

        interpreter.run(request, CancellationToken::new(), tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_text_only_turn() {
        let events = run_turn(Scripted {
            deltas: vec!["Hi", " there"],
            tool_calls: Vec::new(),
        })
        .await;

        assert_eq!(
            events,
            vec![
                TurnEvent::TextDelta("Hi".into()),
                TurnEvent::TextDelta(" there".into()),
                TurnEvent::ToolResult(TurnOutcome::TextOnly {
                    text: "Hi there".into()
                }),
                TurnEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_only_first_tool_call_counts() {
        let events = run_turn(Scripted {
            deltas: vec!["Adding."],
            tool_calls: vec![
                RawToolCall::new(
                    "set_spreadsheet_cells",
                    r#"{"cellUpdates":[{"formula":"5","target":"A1"}]}"#,
                ),
                RawToolCall::new("create_chart", r#"{"type":"bar","title":"t","data":[["a"]]}"#),
            ],
        })
        .await;

        match &events[1] {
            TurnEvent::ToolResult(TurnOutcome::CellUpdates { updates, text }) => {
                assert_eq!(updates, &vec![CellUpdate::new("A1", "5")]);
                assert_eq!(text, "Adding.\n\nSpreadsheet Updates:\nA1: 5");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_targets_fail_the_turn() {
        let events = run_turn(Scripted {
            deltas: vec![],
            tool_calls: vec![RawToolCall::new(
                "set_spreadsheet_cells",
                r#"{"cellUpdates":[{"formula":"1","target":"A1"},{"formula":"2","target":"A1"}]}"#,
            )],
        })
        .await;

        assert!(matches!(events.last(), Some(TurnEvent::Failed(msg)) if msg.contains("A1")));
    }

    #[tokio::test]
    async fn test_chart_text() {
        let events = run_turn(Scripted {
            deltas: vec!["Plotting."],
            tool_calls: vec![RawToolCall::new(
                "create_chart",
                r#"{"type":"pie","title":"Share","data":[["Team","Votes"],["A",3]]}"#,
            )],
        })
        .await;

        assert_eq!(
            events[1],
            TurnEvent::ToolResult(TurnOutcome::Chart {
                chart: ChartSpecification::new(
                    magic_sheets_chart::ChartKind::Pie,
                    "Share",
                    vec![vec!["Team".into(), "Votes".into()], vec!["A".into(), 3.0.into()]],
                ),
                text: "Plotting.\n\nChart Data:\nType: pie\nTitle: Share\nData:\nTeam, Votes\nA, 3"
                    .into(),
            })
        );
    }

    #[tokio::test]
    async fn test_sandbox_timeout_is_reported() {
        let events = run_turn(Scripted {
            deltas: vec![],
            tool_calls: vec![RawToolCall::new(
                "execute_python_code",
                r#"{"analysis_goal":"Average","suggested_code":"print(1)"}"#,
            )],
        })
        .await;

        match &events[0] {
            TurnEvent::ToolResult(outcome) => {
                assert!(outcome.proposal().is_none());
                let report = outcome.analysis().unwrap();
                assert_eq!(report.goal, "Average");
                assert!(report.error.contains("timed out"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(events.last(), Some(&TurnEvent::Done));
    }

    #[tokio::test]
    async fn test_bad_start_cell_is_a_placement_error() {
        let events = run_turn_with(
            Scripted {
                deltas: vec![],
                tool_calls: vec![RawToolCall::new(
                    "execute_python_code",
                    r#"{"analysis_goal":"Totals","suggested_code":"print(1)","start_cell":"1A"}"#,
                )],
            },
            Arc::new(Prints("Total\n3\n")),
        )
        .await;

        match &events[0] {
            TurnEvent::ToolResult(outcome) => {
                assert!(outcome.proposal().is_none());
                assert!(outcome
                    .text()
                    .starts_with("Could not place the analysis results:"));
                assert!(outcome.analysis().unwrap().error.contains("1A"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(events.last(), Some(&TurnEvent::Done));
    }

    #[tokio::test]
    async fn test_sandbox_failure_is_an_execution_error() {
        let events = run_turn(Scripted {
            deltas: vec![],
            tool_calls: vec![RawToolCall::new(
                "execute_python_code",
                r#"{"analysis_goal":"Totals","suggested_code":"print(1)"}"#,
            )],
        })
        .await;

        match &events[0] {
            TurnEvent::ToolResult(outcome) => assert!(outcome
                .text()
                .starts_with("An error occurred while executing the Python code:")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_text_only() {
        let events = run_turn(Scripted {
            deltas: vec!["ok"],
            tool_calls: vec![RawToolCall::new("format_disk", "{}")],
        })
        .await;
        assert_eq!(
            events[1],
            TurnEvent::ToolResult(TurnOutcome::TextOnly { text: "ok".into() })
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let interpreter = Interpreter::new(
            Arc::new(Scripted {
                deltas: vec!["never"],
                tool_calls: Vec::new(),
            }),
            Arc::new(NoSandbox),
            AssistantConfig::default(),
        );
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        interpreter
            .run(
                TurnRequest {
                    user_text: "go".into(),
                    history: Vec::new(),
                    snapshot: Grid::new(),
                },
                cancel,
                tx,
            )
            .await;

        assert_eq!(rx.recv().await, Some(TurnEvent::Aborted));
        assert_eq!(rx.recv().await, None);
    }
}

//! Tests for chat turns and the accept/reject workflow through a session

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use magic_sheets::prelude::*;
use magic_sheets::{
    AssistantConfig, ChatMessage, CompletionError, CompletionRequest, Proposal, RawToolCall,
    SandboxError, SandboxOutput, TextStream, ToolResponse, STOP_MARKER,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

/// Completion service that replays a fixed script
struct Scripted {
    deltas: Vec<&'static str>,
    tool_calls: Vec<RawToolCall>,
    /// Keep the text stream open after the last delta
    stall: bool,
}

impl Scripted {
    fn proposing(arguments: &str) -> Self {
        Self {
            deltas: vec!["Filling cells."],
            tool_calls: vec![RawToolCall::new("set_spreadsheet_cells", arguments)],
            stall: false,
        }
    }
}

#[async_trait]
impl CompletionService for Scripted {
    async fn stream_text(
        &self,
        _request: &CompletionRequest,
    ) -> std::result::Result<TextStream, CompletionError> {
        let deltas: Vec<std::result::Result<String, CompletionError>> =
            self.deltas.iter().map(|d| Ok(d.to_string())).collect();
        if self.stall {
            Ok(stream::iter(deltas).chain(stream::pending()).boxed())
        } else {
            Ok(stream::iter(deltas).boxed())
        }
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

/// Completion service whose network calls fail, optionally after some text
struct Unreachable {
    partial: Vec<&'static str>,
}

fn service_unavailable() -> CompletionError {
    CompletionError::Status {
        status: 503,
        body: "upstream unavailable".into(),
    }
}

#[async_trait]
impl CompletionService for Unreachable {
    async fn stream_text(
        &self,
        _request: &CompletionRequest,
    ) -> std::result::Result<TextStream, CompletionError> {
        if self.partial.is_empty() {
            return Err(service_unavailable());
        }
        let items: Vec<std::result::Result<String, CompletionError>> = self
            .partial
            .iter()
            .map(|d| Ok(d.to_string()))
            .chain(std::iter::once(Err(service_unavailable())))
            .collect();
        Ok(stream::iter(items).boxed())
    }

    async fn select_tool(
        &self,
        _request: &CompletionRequest,
        _assistant_text: &str,
        _tools: &Value,
    ) -> std::result::Result<ToolResponse, CompletionError> {
        Err(service_unavailable())
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _temperature: f32,
    ) -> std::result::Result<String, CompletionError> {
        Err(service_unavailable())
    }
}

/// Sandbox that prints a fixed table
struct Printing(&'static str);

#[async_trait]
impl Sandbox for Printing {
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

fn session(service: Scripted) -> Session {
    Session::with_services(
        Arc::new(service),
        Arc::new(Printing("")),
        AssistantConfig::default(),
    )
}

fn addr(reference: &str) -> CellAddress {
    CellAddress::decode(reference).unwrap()
}

const THREE_UPDATES: &str = r#"{"cellUpdates":[
    {"formula":"Score","target":"A1"},
    {"formula":"90","target":"A2"},
    {"formula":"=A2/2","target":"B2"}
]}"#;

#[tokio::test]
async fn test_accept_applies_every_update() {
    let mut session = session(Scripted::proposing(THREE_UPDATES));
    let turn = session
        .chat("add a score", CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(turn.status, Some(TurnStatus::Pending));
    assert!(!turn.streaming);
    assert_eq!(
        turn.assistant_text,
        "Filling cells.\n\nSpreadsheet Updates:\nA1: Score\nA2: 90\nB2: =A2/2"
    );
    // nothing reaches the sheet before review
    assert!(session.snapshot().is_empty());

    let report = session.accept(&turn.id).unwrap();
    assert_eq!(report.applied(), 3);
    assert!(session.queue().is_empty());
    assert_eq!(session.sheet().value(addr("B2")), &CellValue::Number(45.0));
    assert_eq!(
        session.history().turn(&turn.id).unwrap().status,
        Some(TurnStatus::Accepted)
    );
}

#[tokio::test]
async fn test_second_accept_applies_nothing() {
    let mut session = session(Scripted::proposing(THREE_UPDATES));
    let turn = session
        .chat("add a score", CancellationToken::new(), |_| {})
        .await
        .unwrap();

    session.accept(&turn.id).unwrap();
    session.edit_cell("A2", "100");

    let report = session.accept(&turn.id).unwrap();
    assert!(report.is_empty());
    assert_eq!(session.sheet().value(addr("A2")), &CellValue::Number(100.0));
    assert_eq!(session.sheet().value(addr("B2")), &CellValue::Number(50.0));
}

#[tokio::test]
async fn test_reject_leaves_sheet_untouched() {
    let mut session = session(Scripted::proposing(THREE_UPDATES));
    session.edit_cell("A1", "Existing");
    let before = session.snapshot();
    let csv_before = session.sheet().to_csv().unwrap();

    let id = session
        .chat("overwrite", CancellationToken::new(), |_| {})
        .await
        .unwrap()
        .id;
    assert!(session.reject(&id).unwrap());

    assert_eq!(session.snapshot(), before);
    assert_eq!(session.sheet().to_csv().unwrap(), csv_before);
    assert!(session.queue().is_empty());

    let turn = session.history().turn(&id).unwrap();
    assert_eq!(turn.status, Some(TurnStatus::Rejected));
    assert!(turn.proposal.is_none());

    // accepting after a reject is a no-op
    assert!(session.accept(&id).unwrap().is_empty());
    assert_eq!(session.snapshot(), before);
}

#[tokio::test]
async fn test_abort_mid_stream() {
    let mut session = session(Scripted {
        deltas: vec!["Partial"],
        tool_calls: vec![RawToolCall::new(
            "set_spreadsheet_cells",
            r#"{"cellUpdates":[{"formula":"1","target":"A1"}]}"#,
        )],
        stall: true,
    });
    let before = session.snapshot();

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    let mut seen = Vec::new();
    let turn = session
        .chat("long answer", cancel, |event| {
            if matches!(event, TurnEvent::TextDelta(_)) {
                stop.cancel();
            }
            seen.push(event.clone());
        })
        .await
        .unwrap();

    assert_eq!(seen.last(), Some(&TurnEvent::Aborted));
    assert!(!turn.streaming);
    assert_eq!(turn.assistant_text, format!("Partial{}", STOP_MARKER));
    assert_eq!(turn.status, None);
    assert!(turn.proposal.is_none());
    assert!(session.queue().is_empty());
    assert_eq!(session.snapshot(), before);
}

async fn chat_with_unreachable_service(partial: Vec<&'static str>) {
    let mut session = Session::with_services(
        Arc::new(Unreachable { partial }),
        Arc::new(Printing("")),
        AssistantConfig::default(),
    );
    session.edit_cell("A1", "Existing");
    let before = session.snapshot();
    let csv_before = session.sheet().to_csv().unwrap();

    let mut seen = Vec::new();
    let turn = session
        .chat("sum the column", CancellationToken::new(), |event| {
            seen.push(event.clone())
        })
        .await
        .unwrap();

    assert!(matches!(seen.last(), Some(TurnEvent::Failed(msg)) if msg.contains("503")));
    assert!(turn.assistant_text.starts_with("Error: "));
    assert!(!turn.streaming);
    assert_eq!(turn.status, None);
    assert!(turn.proposal.is_none());
    assert!(session.queue().is_empty());
    assert_eq!(session.snapshot(), before);
    assert_eq!(session.sheet().to_csv().unwrap(), csv_before);
    assert!(session.accept(&turn.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_network_failure_before_any_text() {
    chat_with_unreachable_service(Vec::new()).await;
}

#[tokio::test]
async fn test_network_failure_mid_stream() {
    chat_with_unreachable_service(vec!["Let me", " check"]).await;
}

#[tokio::test]
async fn test_network_failure_during_tool_selection() {
    // text streams fine, the tool call request fails
    struct ToolsDown;

    #[async_trait]
    impl CompletionService for ToolsDown {
        async fn stream_text(
            &self,
            _request: &CompletionRequest,
        ) -> std::result::Result<TextStream, CompletionError> {
            Ok(stream::iter(vec![Ok("Working on it.".to_string())]).boxed())
        }

        async fn select_tool(
            &self,
            _request: &CompletionRequest,
            _assistant_text: &str,
            _tools: &Value,
        ) -> std::result::Result<ToolResponse, CompletionError> {
            Err(service_unavailable())
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _temperature: f32,
        ) -> std::result::Result<String, CompletionError> {
            Ok(String::new())
        }
    }

    let mut session = Session::with_services(
        Arc::new(ToolsDown),
        Arc::new(Printing("")),
        AssistantConfig::default(),
    );
    let turn = session
        .chat("fill it", CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert!(turn.assistant_text.starts_with("Error: "));
    assert_eq!(turn.status, None);
    assert!(session.queue().is_empty());
    assert!(session.snapshot().is_empty());
}

#[tokio::test]
async fn test_duplicate_targets_fail_turn() {
    let mut session = session(Scripted::proposing(
        r#"{"cellUpdates":[{"formula":"1","target":"A1"},{"formula":"2","target":"A1"}]}"#,
    ));
    let turn = session
        .chat("twice", CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert!(turn.assistant_text.starts_with("Error: "));
    assert!(turn.proposal.is_none());
    assert!(session.accept(&turn.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_analysis_output_is_proposed() {
    let service = Scripted {
        deltas: vec![],
        tool_calls: vec![RawToolCall::new(
            "execute_python_code",
            r#"{"analysis_goal":"Scores","suggested_code":"print(df)","start_cell":"D1"}"#,
        )],
        stall: false,
    };
    let mut session = Session::with_services(
        Arc::new(service),
        Arc::new(Printing("Name,Score\nAlice,90\n")),
        AssistantConfig::default(),
    );

    let turn = session
        .chat("analyze", CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(
        turn.proposal,
        Some(Proposal::Updates(vec![
            CellUpdate::new("D1", "Name"),
            CellUpdate::new("E1", "Score"),
            CellUpdate::new("D2", "Alice"),
            CellUpdate::new("E2", "90"),
        ]))
    );
    assert_eq!(turn.analysis.as_ref().unwrap().goal, "Scores");

    session.accept(&turn.id).unwrap();
    assert_eq!(session.sheet().value(addr("E2")), &CellValue::Number(90.0));
}

#[tokio::test]
async fn test_chart_proposal_is_placed_on_accept() {
    let service = Scripted {
        deltas: vec!["Charting."],
        tool_calls: vec![RawToolCall::new(
            "create_chart",
            r#"{"type":"bar","title":"Votes","data":[["Team","Votes"],["A",3],["B",5]]}"#,
        )],
        stall: false,
    };
    let mut session = session(service);
    let turn = session
        .chat("chart it", CancellationToken::new(), |_| {})
        .await
        .unwrap();
    assert!(session.sheet().charts().is_empty());

    let report = session.accept(&turn.id).unwrap();
    assert_eq!(report.charts.len(), 1);
    assert_eq!(session.sheet().charts()[0].spec.kind, ChartKind::Bar);
}

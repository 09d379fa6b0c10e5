//! Session facade tying the sheet, the chat history and the interpreter together

use std::sync::Arc;

use magic_sheets_core::{CellValue, Grid};
use magic_sheets_csv::{CsvReadOptions, CsvReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::analysis::{PythonSandbox, Sandbox};
use crate::completion::CompletionService;
use crate::config::{AssistantConfig, SandboxConfig};
use crate::error::{Result, SessionError};
use crate::interpreter::{Interpreter, TurnEvent, TurnRequest};
use crate::openai::OpenAiClient;
use crate::queue::PendingChangeQueue;
use crate::reconciler::{PassReport, Reconciler};
use crate::sheet::Sheet;
use crate::workflow::{ChatHistory, ChatTurn, Proposal};

const EVENT_BUFFER: usize = 64;

/// One user's spreadsheet and conversation
///
/// Direct edits are applied at once. Assistant proposals reach the sheet
/// only through [`accept`](Self::accept).
pub struct Session {
    reconciler: Reconciler,
    history: ChatHistory,
    interpreter: Interpreter,
}

impl Session {
    pub fn new(interpreter: Interpreter) -> Self {
        Self::with_sheet(interpreter, Sheet::new())
    }

    pub fn with_sheet(interpreter: Interpreter, sheet: Sheet) -> Self {
        Self {
            reconciler: Reconciler::with_sheet(sheet),
            history: ChatHistory::new(),
            interpreter,
        }
    }

    /// Session backed by the given completion service and sandbox
    pub fn with_services(
        completion: Arc<dyn CompletionService>,
        sandbox: Arc<dyn Sandbox>,
        config: AssistantConfig,
    ) -> Self {
        Self::new(Interpreter::new(completion, sandbox, config))
    }

    /// Session talking to an OpenAI-compatible API with a local Python sandbox
    pub fn openai(config: AssistantConfig, sandbox: SandboxConfig) -> Result<Self> {
        let client = OpenAiClient::new(config.clone())?;
        Ok(Self::with_services(
            Arc::new(client),
            Arc::new(PythonSandbox::new(sandbox)),
            config,
        ))
    }

    /// Apply a direct user edit
    pub fn edit_cell(&mut self, target: &str, raw: &str) -> PassReport {
        self.reconciler.set(target, raw)
    }

    /// Replace the sheet with a 2D array anchored at A1
    pub fn load_rows(&mut self, rows: Vec<Vec<CellValue>>) {
        self.reconciler.sheet_mut().load_rows(rows);
    }

    /// Replace the sheet with parsed CSV text
    pub fn load_csv(&mut self, text: &str, options: &CsvReadOptions) -> Result<()> {
        let grid = CsvReader::read_str(text, options)?;
        self.reconciler.sheet_mut().load_grid(grid);
        Ok(())
    }

    /// Displayed values of every non-empty cell
    pub fn snapshot(&self) -> Grid {
        self.reconciler.sheet().snapshot()
    }

    pub fn sheet(&self) -> &Sheet {
        self.reconciler.sheet()
    }

    pub fn sheet_mut(&mut self) -> &mut Sheet {
        self.reconciler.sheet_mut()
    }

    pub fn queue(&self) -> &PendingChangeQueue {
        self.reconciler.queue()
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Run one chat turn to completion
    ///
    /// Every event is passed to `on_event` as it arrives and folded into
    /// the new turn, which is returned once the interpreter finishes.
    /// Failures and cancellation end up in the returned turn's text; the
    /// sheet and queue are left untouched.
    pub async fn chat<F>(
        &mut self,
        text: &str,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> Result<ChatTurn>
    where
        F: FnMut(&TurnEvent),
    {
        let request = TurnRequest {
            user_text: text.to_string(),
            history: self.history.turns().to_vec(),
            snapshot: self.snapshot(),
        };
        let id = self.history.begin_turn(text);
        info!(turn = %id, "chat turn started");

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let producer = self.interpreter.run(request, cancel, tx);

        let history = &mut self.history;
        let turn_id = id.as_str();
        let consumer = async move {
            while let Some(event) = rx.recv().await {
                on_event(&event);
                history.apply_event(turn_id, &event)?;
            }
            Ok::<_, SessionError>(())
        };

        let ((), consumed) = tokio::join!(producer, consumer);
        consumed?;

        self.history
            .turn(&id)
            .cloned()
            .ok_or(SessionError::UnknownTurn(id))
    }

    /// Apply a pending turn's proposal
    ///
    /// Accepting a turn that was already decided, or has nothing to apply,
    /// returns an empty report.
    pub fn accept(&mut self, id: &str) -> Result<PassReport> {
        match self.history.accept(id)? {
            Some(Proposal::Updates(updates)) => {
                info!(turn = %id, updates = updates.len(), "proposal accepted");
                Ok(self.reconciler.set_many(&updates))
            }
            Some(Proposal::Chart(chart)) => {
                info!(turn = %id, title = %chart.title, "chart accepted");
                self.reconciler.set_chart(&chart)
            }
            None => Ok(PassReport::default()),
        }
    }

    /// Discard a pending turn's proposal; returns whether anything changed
    pub fn reject(&mut self, id: &str) -> Result<bool> {
        let rejected = self.history.reject(id)?;
        if rejected {
            info!(turn = %id, "proposal rejected");
        }
        Ok(rejected)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Empty the sheet, the queue and the history
    pub fn reset(&mut self) {
        self.reconciler.reset();
        self.history.clear();
    }
}

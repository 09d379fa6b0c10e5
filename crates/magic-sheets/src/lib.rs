//! # magic-sheets
//!
//! An assistant-driven spreadsheet session.
//!
//! Changes reach the sheet through one path: a pending-change queue drained
//! by the [`Reconciler`], which writes each entry into the grid and the
//! formula engine. Direct edits go straight to the queue. Changes proposed
//! by the language model (cell updates, charts, analysis output) wait in
//! the chat history until the user accepts them.
//!
//! - [`PendingChangeQueue`] - ordered, deduplicating store of cell and chart changes
//! - [`FormulaAdapter`] - the session's formula engine, failures shown as `#ERROR`
//! - [`Reconciler`] - applies queued changes, skipping bad targets
//! - [`Interpreter`] - streams a chat turn and turns its tool call into a [`TurnOutcome`]
//! - [`map_output`] - places sandbox output on the sheet
//! - [`ChatHistory`] - accept/reject workflow for proposals
//! - [`Session`] - all of the above behind one facade
//!
//! ## Example
//!
//! ```rust
//! use magic_sheets::prelude::*;
//!
//! let mut reconciler = Reconciler::new();
//! reconciler.set_many(&[
//!     CellUpdate::new("A1", "5"),
//!     CellUpdate::new("B1", "=A1*2"),
//! ]);
//!
//! let b1 = CellAddress::decode("B1").unwrap();
//! assert_eq!(reconciler.sheet().value(b1), &CellValue::Number(10.0));
//! assert!(reconciler.queue().is_empty());
//! ```

pub mod adapter;
pub mod analysis;
pub mod completion;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod openai;
pub mod prelude;
pub mod prompt;
pub mod queue;
pub mod reconciler;
pub mod session;
pub mod sheet;
pub mod tools;
pub mod transport;
pub mod update;
pub mod workflow;

pub use adapter::FormulaAdapter;
pub use analysis::{
    map_output, run_analysis, AnalysisReport, AnalysisRequest, AnalysisResult, PythonSandbox,
    Sandbox, SandboxOutput,
};
pub use completion::{
    ChatMessage, CompletionRequest, CompletionService, Role, TextStream, ToolResponse,
};
pub use config::{AssistantConfig, SandboxConfig};
pub use error::{CompletionError, Result, SandboxError, SessionError, ToolError};
pub use interpreter::{Interpreter, TurnEvent, TurnOutcome, TurnRequest};
pub use openai::OpenAiClient;
pub use queue::{PendingChangeQueue, QueueKey, QueuePayload};
pub use reconciler::{EntryState, PassReport, Reconciler};
pub use session::Session;
pub use sheet::{PlacedChart, Sheet};
pub use tools::{tool_definitions, RawToolCall, ToolCall};
pub use transport::{decode_frame, encode_frame, SseDecoder, TurnFrame};
pub use update::{ensure_unique_targets, CellUpdate};
pub use workflow::{ChatHistory, ChatTurn, Proposal, TurnStatus, STOP_MARKER};

// Re-export the building blocks
pub use magic_sheets_chart::{ChartKind, ChartPlacement, ChartSeries, ChartSpecification};
pub use magic_sheets_core::{CellAddress, CellError, CellRange, CellValue, Grid, ERROR_SENTINEL};
pub use magic_sheets_csv::{CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter};
pub use magic_sheets_formula::FormulaEngine;

pub use tokio_util::sync::CancellationToken;

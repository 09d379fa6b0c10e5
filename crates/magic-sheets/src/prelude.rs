//! Prelude module - common imports for magic-sheets users
//!
//! ```rust
//! use magic_sheets::prelude::*;
//! ```

pub use crate::{
    // Addressing and values
    CellAddress,
    CellUpdate,
    CellValue,
    // Charts
    ChartKind,
    ChartSpecification,
    // Chat
    ChatHistory,
    ChatTurn,
    CompletionService,
    // I/O
    CsvReader,
    CsvWriter,
    Interpreter,
    PendingChangeQueue,
    Reconciler,
    Result,
    Sandbox,
    Session,
    SessionError,
    TurnEvent,
    TurnOutcome,
    TurnStatus,
    CancellationToken,
};

//! Error types for the assistant session

use magic_sheets_chart::ChartError;
use magic_sheets_csv::CsvError;
use thiserror::Error;

/// Result type alias using [`SessionError`]
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by session operations
///
/// Formula failures never appear here: they are stored in the grid as the
/// `#ERROR` sentinel instead.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Cell reference does not match `[A-Z]+[0-9]+`
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// A proposed batch writes the same cell twice
    #[error("Duplicate target in update batch: {0}")]
    DuplicateTarget(String),

    /// The analysis sandbox did not answer in time
    #[error("Analysis timed out after {0} ms")]
    AnalysisTimeout(u64),

    /// The caller cancelled the turn
    #[error("Generation stopped")]
    Aborted,

    #[error("Completion service error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Sandbox error: {0}")]
    Sandbox(SandboxError),

    #[error("Tool call error: {0}")]
    Tool(#[from] ToolError),

    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No chat turn carries this id
    #[error("Unknown chat turn: {0}")]
    UnknownTurn(String),
}

impl From<magic_sheets_core::Error> for SessionError {
    fn from(err: magic_sheets_core::Error) -> Self {
        match err {
            magic_sheets_core::Error::InvalidAddress(reference) => {
                SessionError::InvalidAddress(reference)
            }
            other => SessionError::InvalidAddress(other.to_string()),
        }
    }
}

impl From<SandboxError> for SessionError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::Timeout(ms) => SessionError::AnalysisTimeout(ms),
            other => SessionError::Sandbox(other),
        }
    }
}

/// Failures talking to the language-model completion service
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No API key configured. Set OPENAI_API_KEY.")]
    MissingApiKey,

    /// The response body did not have the expected shape
    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures running analysis code
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Execution exceeded the configured timeout, in milliseconds
    #[error("execution timed out after {0} ms")]
    Timeout(u64),

    #[error("Python interpreter not found: {0}")]
    NotFound(String),

    #[error("Failed to run sandbox process: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures turning a raw tool call into a typed one
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {source}")]
    Arguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_timeout_maps_to_analysis_timeout() {
        let err: SessionError = SandboxError::Timeout(5000).into();
        assert!(matches!(err, SessionError::AnalysisTimeout(5000)));

        let err: SessionError = SandboxError::NotFound("python3".into()).into();
        assert!(matches!(err, SessionError::Sandbox(SandboxError::NotFound(_))));
    }

    #[test]
    fn test_core_address_error_keeps_reference() {
        let err: SessionError = magic_sheets_core::Error::InvalidAddress("1A".into()).into();
        assert_eq!(err.to_string(), "Invalid cell address: 1A");
    }
}

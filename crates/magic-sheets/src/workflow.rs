//! Chat history and the accept/reject review workflow
//!
//! A turn that proposes updates or a chart waits in `Pending` until the
//! user accepts or rejects it. Either decision is final; repeating it, or
//! making the other one, changes nothing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::AnalysisReport;
use crate::error::{Result, SessionError};
use crate::interpreter::TurnEvent;
use crate::update::CellUpdate;
use magic_sheets_chart::ChartSpecification;

/// Appended to the transcript of a cancelled turn
pub const STOP_MARKER: &str = "\n\n[Generation stopped]";

/// Review state of a turn that proposed changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Changes a turn proposes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Proposal {
    Updates(Vec<CellUpdate>),
    Chart(ChartSpecification),
}

/// One user message and the assistant's answer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub id: String,
    pub user_text: String,
    pub assistant_text: String,
    pub timestamp: DateTime<Utc>,
    /// `None` for turns with nothing to review
    pub status: Option<TurnStatus>,
    pub proposal: Option<Proposal>,
    pub analysis: Option<AnalysisReport>,
    pub streaming: bool,
}

impl ChatTurn {
    /// A freshly sent turn: pending and streaming
    pub fn new<S: Into<String>>(user_text: S) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_text: user_text.into(),
            assistant_text: String::new(),
            timestamp: Utc::now(),
            status: Some(TurnStatus::Pending),
            proposal: None,
            analysis: None,
            streaming: true,
        }
    }

    /// Fold one interpreter event into the turn
    pub fn apply_event(&mut self, event: &TurnEvent) {
        match event {
            TurnEvent::TextDelta(text) => self.assistant_text.push_str(text),
            TurnEvent::ToolResult(outcome) => {
                self.assistant_text = outcome.text().to_string();
                self.proposal = outcome.proposal();
                self.analysis = outcome.analysis().cloned();
                self.status = self.proposal.as_ref().map(|_| TurnStatus::Pending);
                self.streaming = false;
            }
            TurnEvent::Failed(message) => {
                self.assistant_text = format!("Error: {}", message);
                self.finish_without_proposal();
            }
            TurnEvent::Aborted => {
                self.assistant_text.push_str(STOP_MARKER);
                self.finish_without_proposal();
            }
            TurnEvent::Done => {
                self.streaming = false;
                if self.proposal.is_none() {
                    self.status = None;
                }
            }
        }
    }

    fn finish_without_proposal(&mut self) {
        self.proposal = None;
        self.status = None;
        self.streaming = false;
    }

    /// Whether the turn still waits for a decision
    pub fn is_pending(&self) -> bool {
        self.status == Some(TurnStatus::Pending) && self.proposal.is_some() && !self.streaming
    }
}

/// Ordered list of chat turns
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new turn for `user_text`, returning its id
    pub fn begin_turn<S: Into<String>>(&mut self, user_text: S) -> String {
        let turn = ChatTurn::new(user_text);
        let id = turn.id.clone();
        self.turns.push(turn);
        id
    }

    pub fn apply_event(&mut self, id: &str, event: &TurnEvent) -> Result<()> {
        self.turn_mut(id)?.apply_event(event);
        Ok(())
    }

    pub fn turn(&self, id: &str) -> Option<&ChatTurn> {
        self.turns.iter().find(|turn| turn.id == id)
    }

    fn turn_mut(&mut self, id: &str) -> Result<&mut ChatTurn> {
        self.turns
            .iter_mut()
            .find(|turn| turn.id == id)
            .ok_or_else(|| SessionError::UnknownTurn(id.to_string()))
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Mark a pending turn accepted and hand back its proposal
    ///
    /// Returns `None` when the turn has nothing to apply or was already
    /// decided, so the caller can never apply a proposal twice.
    pub fn accept(&mut self, id: &str) -> Result<Option<Proposal>> {
        let turn = self.turn_mut(id)?;
        if !turn.is_pending() {
            return Ok(None);
        }
        turn.status = Some(TurnStatus::Accepted);
        Ok(turn.proposal.clone())
    }

    /// Mark a pending turn rejected, discarding its proposal
    ///
    /// Returns whether anything changed.
    pub fn reject(&mut self, id: &str) -> Result<bool> {
        let turn = self.turn_mut(id)?;
        if !turn.is_pending() {
            return Ok(false);
        }
        turn.status = Some(TurnStatus::Rejected);
        turn.proposal = None;
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::TurnOutcome;
    use pretty_assertions::assert_eq;

    fn proposing_turn(history: &mut ChatHistory) -> String {
        let id = history.begin_turn("fill A1");
        let outcome = TurnOutcome::CellUpdates {
            updates: vec![CellUpdate::new("A1", "5")],
            text: "Done".into(),
        };
        history.apply_event(&id, &TurnEvent::ToolResult(outcome)).unwrap();
        history.apply_event(&id, &TurnEvent::Done).unwrap();
        id
    }

    #[test]
    fn test_new_turn_is_pending_and_streaming() {
        let turn = ChatTurn::new("hi");
        assert_eq!(turn.status, Some(TurnStatus::Pending));
        assert!(turn.streaming);
        assert!(!turn.is_pending());
    }

    #[test]
    fn test_streamed_text_only_turn() {
        let mut history = ChatHistory::new();
        let id = history.begin_turn("hello");
        history.apply_event(&id, &TurnEvent::TextDelta("Hi".into())).unwrap();
        history.apply_event(&id, &TurnEvent::TextDelta("!".into())).unwrap();
        assert_eq!(history.turn(&id).unwrap().assistant_text, "Hi!");

        let outcome = TurnOutcome::TextOnly { text: "Hi!".into() };
        history.apply_event(&id, &TurnEvent::ToolResult(outcome)).unwrap();
        history.apply_event(&id, &TurnEvent::Done).unwrap();

        let turn = history.turn(&id).unwrap();
        assert_eq!(turn.status, None);
        assert!(!turn.streaming);
        assert_eq!(history.accept(&id).unwrap(), None);
    }

    #[test]
    fn test_accept_is_idempotent() {
        let mut history = ChatHistory::new();
        let id = proposing_turn(&mut history);

        assert_eq!(
            history.accept(&id).unwrap(),
            Some(Proposal::Updates(vec![CellUpdate::new("A1", "5")]))
        );
        assert_eq!(history.accept(&id).unwrap(), None);
        assert!(!history.reject(&id).unwrap());
        assert_eq!(history.turn(&id).unwrap().status, Some(TurnStatus::Accepted));
    }

    #[test]
    fn test_reject_is_terminal() {
        let mut history = ChatHistory::new();
        let id = proposing_turn(&mut history);

        assert!(history.reject(&id).unwrap());
        assert!(!history.reject(&id).unwrap());
        assert_eq!(history.accept(&id).unwrap(), None);
        let turn = history.turn(&id).unwrap();
        assert_eq!(turn.status, Some(TurnStatus::Rejected));
        assert!(turn.proposal.is_none());
    }

    #[test]
    fn test_abort_and_failure() {
        let mut history = ChatHistory::new();
        let id = history.begin_turn("long answer");
        history.apply_event(&id, &TurnEvent::TextDelta("Working".into())).unwrap();
        history.apply_event(&id, &TurnEvent::Aborted).unwrap();

        let turn = history.turn(&id).unwrap();
        assert_eq!(turn.assistant_text, "Working\n\n[Generation stopped]");
        assert!(!turn.streaming);
        assert_eq!(turn.status, None);

        let id = history.begin_turn("again");
        history
            .apply_event(&id, &TurnEvent::Failed("connection refused".into()))
            .unwrap();
        assert_eq!(
            history.turn(&id).unwrap().assistant_text,
            "Error: connection refused"
        );
    }

    #[test]
    fn test_unknown_turn() {
        let mut history = ChatHistory::new();
        assert!(matches!(history.accept("nope"), Err(SessionError::UnknownTurn(_))));
        history.begin_turn("x");
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_turn_serializes_camel_case() {
        let mut history = ChatHistory::new();
        let id = proposing_turn(&mut history);
        let json = serde_json::to_value(history.turn(&id).unwrap()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["userText"], "fill A1");
        assert_eq!(json["proposal"]["updates"][0]["target"], "A1");
    }
}

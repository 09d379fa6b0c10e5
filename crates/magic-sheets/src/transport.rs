//! Server-sent-event framing for chat turns
//!
//! Each event is written as `data: <JSON>\n\n`. The same decoder reads the
//! completion service's own event stream.

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisReport;
use crate::error::Result;
use crate::interpreter::{TurnEvent, TurnOutcome};
use crate::update::CellUpdate;
use crate::workflow::STOP_MARKER;
use magic_sheets_chart::ChartSpecification;

/// JSON payload of one chat event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<Vec<CellUpdate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<ChartSpecification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnEvent {
    /// Frame sent to the client for this event; `Done` sends nothing
    pub fn to_frame(&self) -> Option<TurnFrame> {
        match self {
            TurnEvent::TextDelta(text) => Some(TurnFrame {
                response: Some(text.clone()),
                streaming: true,
                ..Default::default()
            }),
            TurnEvent::ToolResult(outcome) => Some(outcome_frame(outcome)),
            TurnEvent::Failed(message) => Some(TurnFrame {
                error: Some(message.clone()),
                ..Default::default()
            }),
            TurnEvent::Aborted => Some(TurnFrame {
                response: Some(STOP_MARKER.to_string()),
                ..Default::default()
            }),
            TurnEvent::Done => None,
        }
    }
}

fn outcome_frame(outcome: &TurnOutcome) -> TurnFrame {
    let mut frame = TurnFrame {
        response: Some(outcome.text().to_string()),
        ..Default::default()
    };

    match outcome {
        TurnOutcome::TextOnly { .. } => {}
        TurnOutcome::CellUpdates { updates, .. } => frame.updates = Some(updates.clone()),
        TurnOutcome::Chart { chart, .. } => frame.chart_data = Some(chart.clone()),
        TurnOutcome::Analysis {
            updates, report, ..
        } => {
            frame.updates = Some(updates.clone());
            frame.analysis = Some(report.clone());
        }
    }

    frame
}

/// Encode a frame as one event
pub fn encode_frame(frame: &TurnFrame) -> Result<String> {
    Ok(format!("data: {}\n\n", serde_json::to_string(frame)?))
}

/// Parse the data of one event back into a frame
pub fn decode_frame(data: &str) -> Result<TurnFrame> {
    Ok(serde_json::from_str(data)?)
}

/// Incremental event-stream decoder
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence;
/// only complete events are returned.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning the data of every event completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some((end, separator)) = find_boundary(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + separator).collect();
            if let Some(data) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                events.push(data);
            }
        }
        events
    }

    /// Data of a trailing event the stream ended without terminating
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        parse_block(&String::from_utf8_lossy(&rest))
    }
}

fn find_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|i| {
        let rest = &buffer[i..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

fn parse_block(block: &str) -> Option<String> {
    let data: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_delta_frame() {
        let frame = TurnEvent::TextDelta("Hel".into()).to_frame().unwrap();
        assert_eq!(
            encode_frame(&frame).unwrap(),
            "data: {\"response\":\"Hel\",\"streaming\":true}\n\n"
        );
    }

    #[test]
    fn test_outcome_frame_fields() {
        let outcome = TurnOutcome::CellUpdates {
            updates: vec![CellUpdate::new("A1", "5")],
            text: "Done\n\nSpreadsheet Updates:\nA1: 5".into(),
        };
        let frame = TurnEvent::ToolResult(outcome).to_frame().unwrap();
        let json = serde_json::to_value(&frame).unwrap();

        assert_eq!(json["streaming"], false);
        assert_eq!(json["updates"][0]["target"], "A1");
        assert!(json.get("chartData").is_none());
        assert!(TurnEvent::Done.to_frame().is_none());
    }

    #[test]
    fn test_error_frame() {
        let frame = TurnEvent::Failed("boom".into()).to_frame().unwrap();
        let encoded = encode_frame(&frame).unwrap();
        let data = encoded.trim_end().strip_prefix("data: ").unwrap();
        assert_eq!(decode_frame(data).unwrap().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_decoder_handles_split_events() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert_eq!(decoder.push(b":1}\n\ndata: [DONE]\n"), vec!["{\"a\":1}"]);
        assert_eq!(decoder.push(b"\n"), vec!["[DONE]"]);
    }

    #[test]
    fn test_decoder_crlf_comments_and_multiline() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\r\n\r\ndata: one\r\ndata: two\r\n\r\n");
        assert_eq!(events, vec!["one\ntwo"]);

        decoder.push("data: caf\u{e9}".as_bytes());
        assert_eq!(decoder.finish().as_deref(), Some("caf\u{e9}"));
    }
}

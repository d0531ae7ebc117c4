//! Streaming wire events
//!
//! The workflow endpoint streams newline-delimited lines; payload lines
//! carry a `data: ` prefix and a JSON event body, and the run ends with
//! the `data: [DONE]` sentinel. Lines that fail to decode are dropped,
//! never fatal.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Prefix marking a payload line
const DATA_PREFIX: &str = "data: ";

/// Sentinel payload that terminates the stream
const DONE_SENTINEL: &str = "[DONE]";

/// A decoded stream event, tagged by the `event` field.
///
/// Only the two variants the generator consumes are modeled; every other
/// event kind the platform emits (node_started, ping, ...) is dropped at
/// the decoding layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    TextChunk { data: TextChunkData },
    WorkflowFinished { data: WorkflowFinishedData },
}

/// Incremental text fragment
#[derive(Debug, Clone, Deserialize)]
pub struct TextChunkData {
    #[serde(default)]
    pub text: String,
}

/// Final status and outputs of the run
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowFinishedData {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub outputs: Value,
}

/// Outcome of decoding one stream line
#[derive(Debug)]
pub enum LineOutcome {
    /// A recognized event
    Event(StreamEvent),
    /// The terminal sentinel
    Done,
    /// Blank, unrecognized or malformed; drop and continue
    Skip,
}

/// Decode one line of the event stream.
///
/// A `data: `-prefixed line is a JSON payload (or the `[DONE]` sentinel);
/// a bare non-empty line is tried as JSON directly.
pub fn decode_line(raw: &str) -> LineOutcome {
    let line = raw.trim();
    if line.is_empty() {
        return LineOutcome::Skip;
    }

    if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
        let payload = rest.trim();
        if payload == DONE_SENTINEL {
            return LineOutcome::Done;
        }
        decode_payload(payload)
    } else {
        decode_payload(line)
    }
}

fn decode_payload(payload: &str) -> LineOutcome {
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => LineOutcome::Event(event),
        Err(err) => {
            debug!(%err, line = payload, "dropping undecodable stream line");
            LineOutcome::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_text_chunk() {
        let line = r#"data: {"event":"text_chunk","data":{"text":"| case |"}}"#;
        match decode_line(line) {
            LineOutcome::Event(StreamEvent::TextChunk { data }) => {
                assert_eq!(data.text, "| case |");
            }
            other => panic!("expected text chunk, got: {other:?}"),
        }
    }

    #[test]
    fn decodes_workflow_finished() {
        let line = r#"data: {"event":"workflow_finished","data":{"status":"succeeded","outputs":{"resultnew":"cases"}}}"#;
        match decode_line(line) {
            LineOutcome::Event(StreamEvent::WorkflowFinished { data }) => {
                assert_eq!(data.status, "succeeded");
                assert_eq!(data.outputs, json!({"resultnew": "cases"}));
            }
            other => panic!("expected workflow finished, got: {other:?}"),
        }
    }

    #[test]
    fn done_sentinel_terminates() {
        assert!(matches!(decode_line("data: [DONE]"), LineOutcome::Done));
        assert!(matches!(decode_line("data: [DONE]\r"), LineOutcome::Done));
    }

    #[test]
    fn malformed_payload_is_skipped() {
        assert!(matches!(
            decode_line("data: {not json"),
            LineOutcome::Skip
        ));
    }

    #[test]
    fn unknown_event_kind_is_dropped() {
        let line = r#"data: {"event":"node_started","data":{}}"#;
        assert!(matches!(decode_line(line), LineOutcome::Skip));
    }

    #[test]
    fn bare_json_line_is_decoded() {
        let line = r#"{"event":"text_chunk","data":{"text":"t"}}"#;
        assert!(matches!(
            decode_line(line),
            LineOutcome::Event(StreamEvent::TextChunk { .. })
        ));
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert!(matches!(decode_line(""), LineOutcome::Skip));
        assert!(matches!(decode_line("  \r"), LineOutcome::Skip));
    }

    #[test]
    fn missing_data_fields_default() {
        let line = r#"data: {"event":"workflow_finished","data":{}}"#;
        match decode_line(line) {
            LineOutcome::Event(StreamEvent::WorkflowFinished { data }) => {
                assert_eq!(data.status, "");
                assert_eq!(data.outputs, Value::Null);
            }
            other => panic!("expected workflow finished, got: {other:?}"),
        }
    }
}

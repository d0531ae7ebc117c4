//! Result extraction from workflow outputs
//!
//! Supports dotted field paths only:
//! - `resultnew` (direct field)
//! - `data.output.result` (nested fields)
//!
//! Does NOT support array indexing, wildcards or filters: every
//! intermediate value must be a JSON object.

use serde_json::Value;

use crate::error::{CasegenError, Result};

/// Fields tried, in order, when the configured path matches nothing
pub const FALLBACK_FIELDS: [&str; 3] = ["resultnew", "testcases", "result"];

/// Substrings that mark an embedded failure inside otherwise-successful text
const FAILURE_MARKERS: [&str; 2] = ["错误", "异常"];

/// Completion status that may carry an embedded failure
const PARTIAL_SUCCEEDED: &str = "partial-succeeded";

/// The single output field inspected by the soft-failure gate
const GATED_FIELD: &str = "text";

/// Walk a dotted path through nested JSON objects.
///
/// Returns the terminal value, or `None` the instant a segment is missing
/// or the current value is not an object. Uses references internally,
/// only clones once at the end.
pub fn extract_by_path(document: &Value, dotted_path: &str) -> Option<Value> {
    let mut current = document;

    for segment in dotted_path.split('.') {
        current = current.as_object()?.get(segment)?;
    }

    Some(current.clone())
}

/// Reject a success-shaped response whose text payload signals an error.
///
/// Fires only when the status is `partial-succeeded` and the `text` output
/// contains a failure marker. Only that one field is inspected; other
/// outputs are not gated.
pub fn soft_failure_gate(status: &str, outputs: &Value) -> Result<()> {
    if status != PARTIAL_SUCCEEDED {
        return Ok(());
    }

    if let Some(text) = outputs.get(GATED_FIELD).and_then(Value::as_str) {
        if FAILURE_MARKERS.iter().any(|marker| text.contains(marker)) {
            return Err(CasegenError::SoftFailure {
                text: text.to_string(),
            });
        }
    }

    Ok(())
}

/// Extract the generated text from workflow outputs.
///
/// Tries the configured field path first, then each fallback field in
/// order, and finally serializes the whole outputs mapping. String values
/// are returned verbatim; anything else is serialized.
pub fn extract_result(status: &str, outputs: &Value, preferred_field: &str) -> Result<String> {
    soft_failure_gate(status, outputs)?;

    for field in std::iter::once(preferred_field).chain(FALLBACK_FIELDS) {
        if let Some(value) = extract_by_path(outputs, field) {
            return Ok(value_to_text(value));
        }
    }

    Ok(outputs.to_string())
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

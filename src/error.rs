//! Error types with fix suggestions

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CasegenError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
///
/// Per-line decode failures during streaming are not represented here:
/// they are logged and skipped inside the stream, never propagated.
#[derive(Error, Debug)]
pub enum CasegenError {
    /// Network-level failure before a response arrived
    #[error("network failure: {0}")]
    Transport(String),

    /// No response within the configured deadline
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The workflow API answered with a non-2xx status
    #[error("workflow API returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// A response body that should be JSON was not
    #[error("undecodable response: {0}")]
    Decode(String),

    /// A success-shaped response whose text payload signals an error
    #[error("workflow reported an embedded failure: {text}")]
    SoftFailure { text: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("mind-map error: {reason}")]
    MindMap { reason: String },

    #[error("export error: {reason}")]
    Export { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FixSuggestion for CasegenError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            CasegenError::Transport(_) => {
                Some("Check the base URL and that the workflow service is reachable")
            }
            CasegenError::Timeout { .. } => {
                Some("Raise timeout_secs in the config; generation can take several minutes")
            }
            CasegenError::Remote { .. } => {
                Some("Check the API key and that the workflow is published")
            }
            CasegenError::Decode(_) => {
                Some("The service answered with an unexpected body; check the base URL points at a workflow API")
            }
            CasegenError::SoftFailure { .. } => {
                Some("The workflow finished but flagged its own output; re-run or inspect the workflow logs")
            }
            CasegenError::Config { .. } => {
                Some("Run `casegen config init` and set the API key (or export CASEGEN_API_KEY)")
            }
            CasegenError::MindMap { .. } => {
                Some("Check the file is a .xmind archive or its content.json")
            }
            CasegenError::Export { .. } => Some("Check the output path is writable"),
            CasegenError::Io(_) => Some("Check file path and permissions"),
        }
    }
}

//! casegen - AI-assisted test case generation via remote workflows

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod extract;
pub mod generate;
pub mod mindmap;

pub use client::{ResponseMode, WorkflowClient};
pub use config::CasegenConfig;
pub use error::{CasegenError, FixSuggestion, Result};
pub use event::StreamEvent;
pub use generate::{CaseMix, GenerateOptions, TestCaseGenerator};

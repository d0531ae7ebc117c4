//! Workflow API client
//!
//! Thin wrapper around the remote workflow endpoints:
//! - `POST /v1/workflows/run` (blocking JSON or streaming events)
//! - `POST /v1/files/upload` (multipart)
//!
//! One shared `reqwest::Client` with request and connect timeouts; every
//! call forwards the bearer token and the configured user identifier.
//! Transport and decoding failures are normalized into [`CasegenError`].

use std::path::Path;
use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt};
use reqwest::multipart;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::CasegenConfig;
use crate::error::{CasegenError, Result};
use crate::event::{decode_line, LineOutcome, StreamEvent};

const WORKFLOW_RUN_PATH: &str = "/v1/workflows/run";
const FILE_UPLOAD_PATH: &str = "/v1/files/upload";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the endpoint delivers the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Blocking,
    Streaming,
}

/// Wire body for `POST /v1/workflows/run`
#[derive(Debug, Serialize)]
struct WorkflowRequest<'a> {
    inputs: &'a Map<String, Value>,
    response_mode: ResponseMode,
    user: &'a str,
}

/// Client for one workflow application
pub struct WorkflowClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    user: String,
    timeout: Duration,
}

impl WorkflowClient {
    /// Create a client from plain values.
    ///
    /// The base URL is validated and its trailing `/` trimmed.
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        user: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|e| CasegenError::Config {
            reason: format!("invalid base URL '{}': {}", base_url, e),
        })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent("casegen/0.1")
            .build()
            .map_err(|e| CasegenError::Config {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url,
            user: user.into(),
            timeout,
        })
    }

    /// Create a client from the loaded configuration.
    ///
    /// Fails when no API key is configured.
    pub fn from_config(config: &CasegenConfig) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| CasegenError::Config {
            reason: "no API key configured".to_string(),
        })?;

        Self::new(
            api_key,
            &config.base_url,
            config.user.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Run the workflow and wait for the full response body.
    pub async fn run_workflow(
        &self,
        inputs: &Map<String, Value>,
        mode: ResponseMode,
    ) -> Result<Value> {
        let response = self.send_run(inputs, mode).await?;

        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(e))?;

        serde_json::from_str(&body)
            .map_err(|e| CasegenError::Decode(format!("invalid JSON response: {}", e)))
    }

    /// Run the workflow in streaming mode.
    ///
    /// Fails exactly like the blocking call when the initial response
    /// status is not 2xx. The returned stream is finite, forward-only and
    /// not restartable; dropping it closes the connection. Per-line decode
    /// failures are logged and skipped, and a transport error mid-stream
    /// ends the sequence.
    pub async fn run_workflow_streaming(
        &self,
        inputs: &Map<String, Value>,
    ) -> Result<impl Stream<Item = StreamEvent> + 'static> {
        let response = self.send_run(inputs, ResponseMode::Streaming).await?;
        Ok(event_stream(response))
    }

    /// Upload a file, returning the remote-assigned identifier.
    pub async fn upload_file(&self, path: &Path, content_type: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|e| CasegenError::Config {
                reason: format!("invalid content type '{}': {}", content_type, e),
            })?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("user", self.user.clone());

        let url = format!("{}{}", self.base_url, FILE_UPLOAD_PATH);
        debug!(%url, "uploading file");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CasegenError::Decode(format!("invalid upload response: {}", e)))?;

        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CasegenError::Decode("upload response missing 'id' field".to_string()))
    }

    /// POST to the run endpoint and surface non-2xx as `Remote`.
    async fn send_run(
        &self,
        inputs: &Map<String, Value>,
        mode: ResponseMode,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, WORKFLOW_RUN_PATH);
        debug!(%url, ?mode, "running workflow");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&WorkflowRequest {
                inputs,
                response_mode: mode,
                user: &self.user,
            })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        Ok(response)
    }

    fn request_error(&self, err: reqwest::Error) -> CasegenError {
        if err.is_timeout() {
            CasegenError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            CasegenError::Transport(err.to_string())
        }
    }
}

async fn remote_error(response: reqwest::Response) -> CasegenError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    CasegenError::Remote { status, body }
}

/// Turn a streaming response body into a sequence of decoded events.
///
/// Lines are reassembled from raw chunks before decoding so multi-byte
/// characters split across chunk boundaries survive intact.
fn event_stream(response: reqwest::Response) -> impl Stream<Item = StreamEvent> {
    stream! {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut done = false;

        'read: while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    warn!(%err, "transport error mid-stream, ending event sequence");
                    break;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                match decode_line(&String::from_utf8_lossy(&line)) {
                    LineOutcome::Event(event) => yield event,
                    LineOutcome::Done => {
                        done = true;
                        break 'read;
                    }
                    LineOutcome::Skip => {}
                }
            }
        }

        // Final line without a trailing newline.
        if !done && !buffer.is_empty() {
            if let LineOutcome::Event(event) = decode_line(&String::from_utf8_lossy(&buffer)) {
                yield event;
            }
        }
    }
}

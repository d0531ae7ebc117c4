//! Test-case generation
//!
//! Composes the task text, assembles the workflow inputs and drives the
//! client in blocking or streaming mode, extracting the generated cases
//! from the response.

use async_stream::stream;
use futures::{pin_mut, Stream, StreamExt};
use serde_json::{Map, Value};
use tracing::warn;

use crate::client::{ResponseMode, WorkflowClient};
use crate::error::Result;
use crate::event::{StreamEvent, WorkflowFinishedData};
use crate::extract::{extract_result, soft_failure_gate};

/// Required-text input key consumed by the remote workflow
const REQUIREMENT_KEY: &str = "in_require";

/// Percentage split across the generated case categories, sent to the
/// workflow as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseMix {
    pub functional: u8,
    pub boundary: u8,
    pub exception: u8,
    pub perfmon: u8,
    pub regression: u8,
}

impl Default for CaseMix {
    fn default() -> Self {
        Self {
            functional: 55,
            boundary: 25,
            exception: 20,
            perfmon: 0,
            regression: 0,
        }
    }
}

/// Knobs for one generation request
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Test priority label appended to the task text
    pub priority: Option<String>,
    /// Exact number of cases to request
    pub count: Option<u32>,
    pub case_mix: CaseMix,
}

/// Generator wrapping one workflow application
pub struct TestCaseGenerator {
    client: WorkflowClient,
    result_field: String,
}

impl TestCaseGenerator {
    pub fn new(client: WorkflowClient, result_field: impl Into<String>) -> Self {
        Self {
            client,
            result_field: result_field.into(),
        }
    }

    /// Generate test cases, waiting for the full result.
    pub async fn generate(&self, requirement: &str, options: &GenerateOptions) -> Result<String> {
        let inputs = build_inputs(requirement, options);
        let response = self
            .client
            .run_workflow(&inputs, ResponseMode::Blocking)
            .await?;

        let data = &response["data"];
        match data.get("outputs") {
            Some(outputs) => {
                let status = data["status"].as_str().unwrap_or_default();
                extract_result(status, outputs, &self.result_field)
            }
            // No recognizable shape: hand back the serialized response.
            None => Ok(response.to_string()),
        }
    }

    /// Generate test cases as a stream of text fragments.
    ///
    /// Yields each `text_chunk` fragment; when the workflow finishes, the
    /// soft-failure gate runs over the final outputs and a flagged run
    /// surfaces as a terminal error item.
    pub async fn generate_streaming(
        &self,
        requirement: &str,
        options: &GenerateOptions,
    ) -> Result<impl Stream<Item = Result<String>> + 'static> {
        let inputs = build_inputs(requirement, options);
        let events = self.client.run_workflow_streaming(&inputs).await?;
        Ok(text_stream(events))
    }
}

fn text_stream(events: impl Stream<Item = StreamEvent>) -> impl Stream<Item = Result<String>> {
    stream! {
        pin_mut!(events);
        let mut has_content = false;

        while let Some(event) = events.next().await {
            match event {
                StreamEvent::TextChunk { data } => {
                    has_content = true;
                    yield Ok(data.text);
                }
                StreamEvent::WorkflowFinished { data } => {
                    if let Err(err) = finished_gate(&data) {
                        yield Err(err);
                        return;
                    }
                }
            }
        }

        if !has_content {
            warn!("streaming response produced no text content");
        }
    }
}

fn finished_gate(data: &WorkflowFinishedData) -> Result<()> {
    soft_failure_gate(&data.status, &data.outputs)
}

/// Assemble the workflow inputs: the composed task text plus the
/// case-mix percentages as strings.
fn build_inputs(requirement: &str, options: &GenerateOptions) -> Map<String, Value> {
    let mix = &options.case_mix;
    let mut inputs = Map::new();
    inputs.insert(
        REQUIREMENT_KEY.to_string(),
        Value::String(compose_task(requirement, options)),
    );
    inputs.insert(
        "functional_testing".to_string(),
        Value::String(mix.functional.to_string()),
    );
    inputs.insert(
        "boundary_testing".to_string(),
        Value::String(mix.boundary.to_string()),
    );
    inputs.insert(
        "exception_testing".to_string(),
        Value::String(mix.exception.to_string()),
    );
    inputs.insert(
        "perfmon_testing".to_string(),
        Value::String(mix.perfmon.to_string()),
    );
    inputs.insert(
        "regression_testing".to_string(),
        Value::String(mix.regression.to_string()),
    );
    inputs
}

/// Compose the task text sent as the requirement input.
pub fn compose_task(requirement: &str, options: &GenerateOptions) -> String {
    let mut task = format!("需求描述: {}", requirement);

    if let Some(priority) = &options.priority {
        task.push_str(&format!("\n测试优先级: {}", priority));
    }
    if let Some(count) = options.count {
        task.push_str(&format!(
            "\n【重要】请严格生成 {} 条测试用例，不多不少。",
            count
        ));
    }

    task
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_task_plain_requirement() {
        let task = compose_task("登录功能", &GenerateOptions::default());
        assert_eq!(task, "需求描述: 登录功能");
    }

    #[test]
    fn compose_task_with_priority() {
        let options = GenerateOptions {
            priority: Some("高".to_string()),
            ..Default::default()
        };
        let task = compose_task("登录功能", &options);
        assert_eq!(task, "需求描述: 登录功能\n测试优先级: 高");
    }

    #[test]
    fn compose_task_count_directive_only_when_requested() {
        let options = GenerateOptions {
            count: Some(10),
            ..Default::default()
        };
        let task = compose_task("登录功能", &options);
        assert!(task.contains("请严格生成 10 条测试用例"));

        let without = compose_task("登录功能", &GenerateOptions::default());
        assert!(!without.contains("请严格生成"));
    }

    #[test]
    fn inputs_carry_requirement_and_case_mix() {
        let inputs = build_inputs("需求", &GenerateOptions::default());

        assert!(inputs["in_require"].as_str().unwrap().contains("需求"));
        assert_eq!(inputs["functional_testing"], "55");
        assert_eq!(inputs["boundary_testing"], "25");
        assert_eq!(inputs["exception_testing"], "20");
        assert_eq!(inputs["perfmon_testing"], "0");
        assert_eq!(inputs["regression_testing"], "0");
    }

    #[tokio::test]
    async fn text_stream_yields_fragments_and_gates_finish() {
        use crate::event::{TextChunkData, WorkflowFinishedData};

        let events = futures::stream::iter(vec![
            StreamEvent::TextChunk {
                data: TextChunkData {
                    text: "| A |".to_string(),
                },
            },
            StreamEvent::WorkflowFinished {
                data: WorkflowFinishedData {
                    status: "succeeded".to_string(),
                    outputs: serde_json::json!({"resultnew": "| A |"}),
                },
            },
        ]);

        let fragments: Vec<_> = text_stream(events).collect().await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().unwrap(), "| A |");
    }

    #[tokio::test]
    async fn text_stream_surfaces_soft_failure() {
        use crate::error::CasegenError;
        use crate::event::WorkflowFinishedData;

        let events = futures::stream::iter(vec![StreamEvent::WorkflowFinished {
            data: WorkflowFinishedData {
                status: "partial-succeeded".to_string(),
                outputs: serde_json::json!({"text": "节点错误"}),
            },
        }]);

        let items: Vec<_> = text_stream(events).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(CasegenError::SoftFailure { .. })
        ));
    }
}

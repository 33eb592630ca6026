//! 反思评估：判断已执行步骤是否覆盖了用户的完整请求

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::StructuredOracle;
use crate::prompts::{PromptTemplates, REFLECTION_PROMPT};
use crate::reflection::ReflectionResult;

/// 已执行步骤日志的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStep {
    pub intent: String,
    pub summary: String,
}

#[async_trait]
pub trait Reflector: Send + Sync {
    async fn evaluate(
        &self,
        original_input: &str,
        steps: &[ExecutedStep],
    ) -> Result<ReflectionResult, AgentError>;
}

pub struct ReflectionEvaluator {
    oracle: Arc<StructuredOracle>,
    templates: Arc<PromptTemplates>,
}

impl ReflectionEvaluator {
    pub fn new(oracle: Arc<StructuredOracle>, templates: Arc<PromptTemplates>) -> Self {
        Self { oracle, templates }
    }
}

pub fn format_steps(steps: &[ExecutedStep]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("- Step {}: Routed to '{}' - {}", i + 1, s.intent, s.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Reflector for ReflectionEvaluator {
    async fn evaluate(
        &self,
        original_input: &str,
        steps: &[ExecutedStep],
    ) -> Result<ReflectionResult, AgentError> {
        let steps_text = format_steps(steps);
        let system = self.templates.render(
            REFLECTION_PROMPT,
            &[("original_input", original_input), ("executed_steps", &steps_text)],
        )?;
        let result: ReflectionResult = self.oracle.complete_structured(&system, original_input).await?;
        tracing::info!(
            satisfied = result.is_satisfied(),
            remaining = result.remaining_request().unwrap_or(""),
            "reflection"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{OraclePolicy, ScriptedLlmClient};

    #[test]
    fn test_format_steps() {
        let steps = vec![
            ExecutedStep { intent: "flight_status".into(), summary: "PA441 delayed".into() },
            ExecutedStep { intent: "baggage".into(), summary: "claim filed".into() },
        ];
        assert_eq!(
            format_steps(&steps),
            "- Step 1: Routed to 'flight_status' - PA441 delayed\n- Step 2: Routed to 'baggage' - claim filed"
        );
    }

    #[tokio::test]
    async fn test_evaluate_parses_reply() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"satisfied": false, "remaining_request": "baggage claim", "reasoning": "bags not handled"}"#,
        ]));
        let evaluator = ReflectionEvaluator::new(
            Arc::new(StructuredOracle::new(llm.clone(), OraclePolicy::default())),
            Arc::new(PromptTemplates::builtin()),
        );
        let steps = [ExecutedStep { intent: "flight_status".into(), summary: "status given".into() }];
        let result = evaluator.evaluate("flight and bags", &steps).await.unwrap();
        assert_eq!(result.next_request(), Some("baggage claim"));
        assert!(llm.calls()[0][0].content.contains("Routed to 'flight_status'"));
    }
}

//! 回复生成：把 handler 的结构化事实转成面向客户的自然语言
//!
//! 单步用 response_generator_prompt（附按意图的 guidance）；多步用 combined_response_prompt，
//! 一次调用生成连贯的整体回复，而不是拼接各步回复。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::handlers::{AgentContext, HandlerResponse};
use crate::llm::StructuredOracle;
use crate::prompts::{PromptTemplates, COMBINED_RESPONSE_PROMPT, RESPONSE_GENERATOR_PROMPT};
use crate::reflection::StepResult;

#[async_trait]
pub trait ResponseComposer: Send + Sync {
    async fn generate(
        &self,
        response: &HandlerResponse,
        intent: &str,
        original_question: &str,
        context: &AgentContext,
    ) -> Result<String, AgentError>;

    async fn generate_combined(
        &self,
        results: &[StepResult],
        original_question: &str,
        context: &AgentContext,
    ) -> Result<String, AgentError>;
}

/// 多步结果块：每步一段 "### Step n: {intent} ({kind})" + JSON
pub fn format_tool_results(results: &[StepResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "### Step {}: {} ({})\n{}",
                i + 1,
                r.classification.intent(),
                r.response.kind(),
                r.response.to_json_pretty()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 使用主模型
pub struct LlmResponseComposer {
    oracle: Arc<StructuredOracle>,
    templates: Arc<PromptTemplates>,
}

impl LlmResponseComposer {
    pub fn new(oracle: Arc<StructuredOracle>, templates: Arc<PromptTemplates>) -> Self {
        Self { oracle, templates }
    }
}

#[async_trait]
impl ResponseComposer for LlmResponseComposer {
    async fn generate(
        &self,
        response: &HandlerResponse,
        intent: &str,
        original_question: &str,
        context: &AgentContext,
    ) -> Result<String, AgentError> {
        let tool_data = response.to_json_pretty();
        let system = self.templates.render(
            RESPONSE_GENERATOR_PROMPT,
            &[
                ("customer_name", &context.customer_name),
                ("original_question", original_question),
                ("tool_name", intent),
                ("tool_data", &tool_data),
                ("intent_guidance", self.templates.guidance(intent)),
            ],
        )?;
        let user = format!("Generate a response for: {}", original_question);
        let answer = self.oracle.complete_text(&system, &user).await?;
        tracing::debug!(intent, chars = answer.len(), "response generated");
        Ok(answer.trim().to_string())
    }

    async fn generate_combined(
        &self,
        results: &[StepResult],
        original_question: &str,
        context: &AgentContext,
    ) -> Result<String, AgentError> {
        let tool_results = format_tool_results(results);
        let system = self.templates.render(
            COMBINED_RESPONSE_PROMPT,
            &[
                ("customer_name", &context.customer_name),
                ("original_question", original_question),
                ("tool_results", &tool_results),
            ],
        )?;
        let user = format!("Generate a response for: {}", original_question);
        let answer = self.oracle.complete_text(&system, &user).await?;
        tracing::debug!(steps = results.len(), chars = answer.len(), "combined response generated");
        Ok(answer.trim().to_string())
    }
}

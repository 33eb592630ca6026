//! 滚动摘要：把滑出窗口的一轮折叠进会话摘要
//!
//! 使用快速模型；摘要整体替换，不做追加。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::StructuredOracle;
use crate::memory::ConversationTurn;
use crate::prompts::{PromptTemplates, SUMMARIZE_CONVERSATION_PROMPT};

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// 返回包含该轮事实的新摘要
    async fn fold_turn(
        &self,
        turn: &ConversationTurn,
        existing_summary: &str,
    ) -> Result<String, AgentError>;
}

pub struct LlmSummarizer {
    oracle: Arc<StructuredOracle>,
    templates: Arc<PromptTemplates>,
}

impl LlmSummarizer {
    pub fn new(oracle: Arc<StructuredOracle>, templates: Arc<PromptTemplates>) -> Self {
        Self { oracle, templates }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn fold_turn(
        &self,
        turn: &ConversationTurn,
        existing_summary: &str,
    ) -> Result<String, AgentError> {
        let existing = if existing_summary.trim().is_empty() {
            "(no prior summary)"
        } else {
            existing_summary
        };
        let entities = turn.entities_inline();
        let system = self.templates.render(
            SUMMARIZE_CONVERSATION_PROMPT,
            &[
                ("existing_summary", existing),
                ("user_input", &turn.user_input),
                ("agent_response", &turn.agent_response),
                ("intent", &turn.intent),
                ("entities", &entities),
            ],
        )?;
        let updated = self
            .oracle
            .complete_text(&system, "Generate the updated summary.")
            .await?;
        tracing::debug!(chars = updated.len(), "summary updated");
        Ok(updated.trim().to_string())
    }
}

//! 单轮对话记录
//!
//! 一次完整的请求-回复周期产生一个 ConversationTurn，存入后不可变。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::ClassificationResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub agent_response: String,
    pub intent: String,
    pub confidence: f64,
    pub rewritten_prompt: String,
    /// 类型 → 值；同一类型出现多次时保留最后一个
    pub entities: BTreeMap<String, String>,
    pub classification_reasoning: String,
    pub tool_reasoning: Option<String>,
}

impl ConversationTurn {
    /// 由本轮分类结果构建；routed_to 为哨兵值（fallback / clarification）时 intent 仍记录分类器给出的名称
    pub fn from_classification(
        user_input: impl Into<String>,
        agent_response: impl Into<String>,
        classification: &ClassificationResult,
        tool_reasoning: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_input: user_input.into(),
            agent_response: agent_response.into(),
            intent: classification.intent().to_string(),
            confidence: classification.confidence(),
            rewritten_prompt: classification.rewritten_prompt().to_string(),
            entities: classification.entity_map(),
            classification_reasoning: classification.reasoning().to_string(),
            tool_reasoning,
        }
    }

    /// "k=v, k=v"；无实体时为 "none"
    pub fn entities_inline(&self) -> String {
        if self.entities.is_empty() {
            return "none".to_string();
        }
        self.entities
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

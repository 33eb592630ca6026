//! 意图分类器
//!
//! 把用户输入、可用 handler 描述与会话上下文（实体、摘要、最近轮次）拼入 intent_prompt，
//! 经 StructuredOracle 得到已校验的 ClassificationResult。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::intent::ClassificationResult;
use crate::llm::StructuredOracle;
use crate::memory::ConversationTurn;
use crate::prompts::{PromptTemplates, INTENT_PROMPT};

/// 一次分类所需的全部输入；recent_turns 为最新在前
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRequest<'a> {
    pub user_input: &'a str,
    pub available_tools: &'a str,
    pub session_entities: &'a BTreeMap<String, String>,
    pub recent_turns: &'a [ConversationTurn],
    pub conversation_summary: &'a str,
}

impl<'a> ClassificationRequest<'a> {
    /// 换一个 user_input，其余上下文保持不变（反思循环中的重分类使用同一快照）
    pub fn with_input(self, user_input: &'a str) -> Self {
        Self { user_input, ..self }
    }

    pub fn has_history(&self) -> bool {
        !self.session_entities.is_empty() || !self.recent_turns.is_empty()
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        request: &ClassificationRequest<'_>,
    ) -> Result<ClassificationResult, AgentError>;
}

pub struct IntentClassifier {
    oracle: Arc<StructuredOracle>,
    templates: Arc<PromptTemplates>,
}

impl IntentClassifier {
    pub fn new(oracle: Arc<StructuredOracle>, templates: Arc<PromptTemplates>) -> Self {
        Self { oracle, templates }
    }

    pub fn build_prompt(&self, request: &ClassificationRequest<'_>) -> Result<String, AgentError> {
        let context = format_conversation_context(
            request.session_entities,
            request.conversation_summary,
            request.recent_turns,
        );
        self.templates.render(
            INTENT_PROMPT,
            &[
                ("available_tools", request.available_tools),
                ("user_prompt", request.user_input),
                ("conversation_context", &context),
            ],
        )
    }
}

#[async_trait]
impl Classifier for IntentClassifier {
    async fn classify(
        &self,
        request: &ClassificationRequest<'_>,
    ) -> Result<ClassificationResult, AgentError> {
        let system = self.build_prompt(request)?;
        tracing::debug!(
            prompt_chars = system.len(),
            turns = request.recent_turns.len(),
            entities = request.session_entities.len(),
            "classification prompt built"
        );

        let result: ClassificationResult = self
            .oracle
            .complete_structured(&system, request.user_input)
            .await?;

        tracing::info!(
            intent = result.intent(),
            confidence = result.confidence(),
            rewritten = result.rewritten_prompt(),
            "classified"
        );
        Ok(result)
    }
}

/// 会话上下文文本块：实体列表、滚动摘要、最近轮次（按时间先后编号）；无历史时为空串
pub fn format_conversation_context(
    session_entities: &BTreeMap<String, String>,
    conversation_summary: &str,
    recent_turns: &[ConversationTurn],
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !session_entities.is_empty() {
        parts.push("\nSESSION ENTITIES (known from prior conversation):".to_string());
        for (entity_type, value) in session_entities {
            parts.push(format!("- {}: {}", entity_type, value));
        }
    }

    if !conversation_summary.trim().is_empty() {
        parts.push("\nCONVERSATION SUMMARY (earlier turns):".to_string());
        parts.push(conversation_summary.trim().to_string());
    }

    if !recent_turns.is_empty() {
        parts.push("\nRECENT CONVERSATION (for context):".to_string());
        for (i, turn) in recent_turns.iter().rev().enumerate() {
            parts.push(format!("[Turn {}] User: \"{}\"", i + 1, turn.user_input));
            parts.push(format!(
                "         Routed to: {} (confidence: {:.2})",
                turn.intent, turn.confidence
            ));
        }
    }

    if parts.is_empty() {
        return String::new();
    }
    parts.push(String::new());
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{OraclePolicy, ScriptedLlmClient};
    use chrono::Utc;

    fn turn(input: &str, intent: &str, confidence: f64) -> ConversationTurn {
        ConversationTurn {
            timestamp: Utc::now(),
            user_input: input.to_string(),
            agent_response: String::new(),
            intent: intent.to_string(),
            confidence,
            rewritten_prompt: input.to_string(),
            entities: BTreeMap::new(),
            classification_reasoning: String::new(),
            tool_reasoning: None,
        }
    }

    #[test]
    fn test_context_empty_without_history() {
        assert_eq!(format_conversation_context(&BTreeMap::new(), "", &[]), "");
    }

    #[test]
    fn test_context_turns_chronological() {
        let mut entities = BTreeMap::new();
        entities.insert("confirmation_number".to_string(), "IR-D204".to_string());
        // 最新在前
        let turns = vec![turn("second", "baggage", 0.9), turn("first", "flight_status", 0.85)];
        let text = format_conversation_context(&entities, "- Customer was delayed", &turns);
        assert!(text.contains("- confirmation_number: IR-D204"));
        assert!(text.contains("- Customer was delayed"));
        let first = text.find("[Turn 1] User: \"first\"").unwrap();
        let second = text.find("[Turn 2] User: \"second\"").unwrap();
        assert!(first < second);
        assert!(text.contains("Routed to: flight_status (confidence: 0.85)"));
    }

    #[tokio::test]
    async fn test_classify_through_oracle() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"intent":"baggage","confidence":0.92,"reasoning":"bag policy","rewritten_prompt":"What is the baggage policy?","entities":[{"type":"topic","value":"baggage"}]}"#,
        ]));
        let oracle = Arc::new(StructuredOracle::new(llm.clone(), OraclePolicy::default()));
        let classifier = IntentClassifier::new(oracle, Arc::new(PromptTemplates::builtin()));
        let entities = BTreeMap::new();
        let request = ClassificationRequest {
            user_input: "What is the baggage policy?",
            available_tools: "- baggage: Baggage help",
            session_entities: &entities,
            recent_turns: &[],
            conversation_summary: "",
        };
        let result = classifier.classify(&request).await.unwrap();
        assert_eq!(result.intent(), "baggage");
        let calls = llm.calls();
        assert!(calls[0][0].content.contains("- baggage: Baggage help"));
        assert_eq!(calls[0][1].content, "What is the baggage policy?");
    }
}

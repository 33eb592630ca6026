//! FAQ：在知识库中按主题查找政策事实

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::handlers::{AgentContext, Capability, GroundingData};
use crate::intent::ClassificationResult;

/// 主题 → 触发关键词（小写匹配）
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("pets", &["pet", "dog", "cat", "animal"]),
    ("wifi", &["wifi", "wi-fi", "internet", "online"]),
    ("refunds", &["refund", "money back", "reimburse"]),
    ("compensation", &["compensation", "voucher", "delay"]),
    ("seats", &["seat", "legroom", "exit row", "business class"]),
    ("baggage", &["bag", "luggage", "carry-on", "suitcase"]),
];

#[derive(Debug, Clone)]
pub struct FaqRequest {
    pub question: String,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaqResponse {
    pub answer: String,
    pub relevant_facts: Vec<String>,
    pub source_topic: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
}

pub struct FaqHandler {
    data: Arc<GroundingData>,
}

impl FaqHandler {
    pub fn new(data: Arc<GroundingData>) -> Self {
        Self { data }
    }

    fn detect_topic(&self, request: &FaqRequest) -> Option<String> {
        if let Some(topic) = request.topic.as_deref() {
            if self.data.faq_topic(topic).is_some() {
                return Some(topic.to_lowercase());
            }
        }
        let question = request.question.to_lowercase();
        TOPIC_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| question.contains(w)))
            .map(|(topic, _)| topic.to_string())
    }
}

/// 按句号切分，去掉开头的 "Xxx Policy:" 标题
fn split_facts(content: &str) -> Vec<String> {
    let body = content.split_once(": ").map(|(_, rest)| rest).unwrap_or(content);
    body.split(". ")
        .map(|s| s.trim().trim_end_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[async_trait]
impl Capability for FaqHandler {
    type Request = FaqRequest;
    type Response = FaqResponse;

    fn build_request(&self, classification: &ClassificationResult) -> FaqRequest {
        FaqRequest {
            question: classification.rewritten_prompt().to_string(),
            topic: classification.entity("topic").map(str::to_string),
        }
    }

    async fn execute(&self, request: FaqRequest, _context: &AgentContext) -> FaqResponse {
        let entry = self
            .detect_topic(&request)
            .and_then(|topic| self.data.faq_topic(&topic));

        match entry {
            Some(entry) => FaqResponse {
                answer: entry.content.clone(),
                relevant_facts: split_facts(&entry.content),
                source_topic: Some(entry.topic.clone()),
                confidence: 0.9,
                reasoning: format!("Matched the question to the '{}' policy topic", entry.topic),
            },
            None => {
                let topics: Vec<&str> = self.data.faq.iter().map(|e| e.topic.as_str()).collect();
                FaqResponse {
                    answer: "No matching policy topic was found in the knowledge base.".to_string(),
                    relevant_facts: vec![format!("Available FAQ topics: {}", topics.join(", "))],
                    source_topic: None,
                    confidence: 0.2,
                    reasoning: "Question did not match any FAQ topic".to_string(),
                }
            }
        }
    }
}

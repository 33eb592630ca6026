//! 分类结果数据契约
//!
//! ClassificationResult 只能经 `new` 或 oracle 校验得到：置信度超出 [0,1]、intent / reasoning /
//! rewritten_prompt 为空都在构造时拒绝，不做截断或默认值。

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::ValidationError;
use crate::llm::Validated;

/// 从用户输入中抽取的 (type, value) 实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    #[serde(rename = "type")]
    entity_type: String,
    value: String,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, value: impl Into<String>) -> Result<Self, ValidationError> {
        let entity_type = entity_type.into();
        let value = value.into();
        let mut errors = ValidationError::new();
        if entity_type.trim().is_empty() {
            errors.push("type", "must not be empty");
        }
        if value.trim().is_empty() {
            errors.push("value", "must not be empty");
        }
        errors.into_result(Self { entity_type, value })
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    intent: String,
    confidence: f64,
    reasoning: String,
    rewritten_prompt: String,
    entities: Vec<Entity>,
}

impl ClassificationResult {
    pub fn new(
        intent: impl Into<String>,
        confidence: f64,
        reasoning: impl Into<String>,
        rewritten_prompt: impl Into<String>,
        entities: Vec<Entity>,
    ) -> Result<Self, ValidationError> {
        let intent = intent.into();
        let reasoning = reasoning.into();
        let rewritten_prompt = rewritten_prompt.into();

        let mut errors = ValidationError::new();
        if intent.trim().is_empty() {
            errors.push("intent", "must not be empty");
        }
        // NaN 不满足 contains，一并拒绝
        if !(0.0..=1.0).contains(&confidence) {
            errors.push("confidence", format!("must be within [0.0, 1.0], got {}", confidence));
        }
        if reasoning.trim().is_empty() {
            errors.push("reasoning", "must not be empty");
        }
        if rewritten_prompt.trim().is_empty() {
            errors.push("rewritten_prompt", "must not be empty");
        }
        errors.into_result(Self {
            intent,
            confidence,
            reasoning,
            rewritten_prompt,
            entities,
        })
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn rewritten_prompt(&self) -> &str {
        &self.rewritten_prompt
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// 第一个给定类型的实体值
    pub fn entity(&self, entity_type: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.entity_type.eq_ignore_ascii_case(entity_type))
            .map(|e| e.value.as_str())
    }

    /// type → value；重复类型保留最后出现的值
    pub fn entity_map(&self) -> BTreeMap<String, String> {
        self.entities
            .iter()
            .map(|e| (e.entity_type.clone(), e.value.clone()))
            .collect()
    }
}

/// Oracle 返回的实体形状
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RawEntity {
    /// Category of entity: destination, date, flight_number, confirmation_number, topic, etc.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// The extracted value from user input
    pub value: String,
}

/// Oracle 返回的分类形状
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RawClassification {
    /// The tool name to route to; must be one of the available tools
    pub intent: String,
    /// Confidence score for the classification. 0.0 = no confidence, 1.0 = certain
    pub confidence: f64,
    /// Brief explanation of why this intent was selected
    pub reasoning: String,
    /// The user's question cleaned up: noise removed, focused, concise
    pub rewritten_prompt: String,
    /// Key information extracted from the user's input
    #[serde(default)]
    pub entities: Vec<RawEntity>,
}

impl Validated for ClassificationResult {
    type Raw = RawClassification;

    fn validate(raw: RawClassification) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::new();
        let mut entities = Vec::with_capacity(raw.entities.len());
        for (i, e) in raw.entities.into_iter().enumerate() {
            match Entity::new(e.entity_type, e.value) {
                Ok(entity) => entities.push(entity),
                Err(err) => {
                    for fe in err.errors {
                        errors.push(format!("entities.{}.{}", i, fe.field), fe.message);
                    }
                }
            }
        }
        match Self::new(raw.intent, raw.confidence, raw.reasoning, raw.rewritten_prompt, entities) {
            Ok(result) if errors.is_empty() => Ok(result),
            Ok(_) => Err(errors),
            Err(err) => {
                errors.errors.splice(0..0, err.errors);
                Err(errors)
            }
        }
    }
}

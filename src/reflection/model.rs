//! 反思结果数据契约

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::ValidationError;
use crate::llm::Validated;

/// satisfied 为 true 时 remaining_request 必为 None；空白的 remaining_request 视为 None
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionResult {
    satisfied: bool,
    remaining_request: Option<String>,
    reasoning: String,
}

impl ReflectionResult {
    pub fn new(
        satisfied: bool,
        remaining_request: Option<String>,
        reasoning: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let reasoning = reasoning.into();
        let remaining_request = remaining_request
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let mut errors = ValidationError::new();
        if satisfied && remaining_request.is_some() {
            errors.push("remaining_request", "must be null when satisfied is true");
        }
        if reasoning.trim().is_empty() {
            errors.push("reasoning", "must not be empty");
        }
        errors.into_result(Self {
            satisfied,
            remaining_request,
            reasoning,
        })
    }

    pub fn satisfied(reasoning: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(true, None, reasoning)
    }

    pub fn unsatisfied(remaining: impl Into<String>, reasoning: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(false, Some(remaining.into()), reasoning)
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    pub fn remaining_request(&self) -> Option<&str> {
        self.remaining_request.as_deref()
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// 需要继续执行下一步时返回剩余请求
    pub fn next_request(&self) -> Option<&str> {
        if self.satisfied {
            None
        } else {
            self.remaining_request()
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RawReflection {
    /// True if the user's full request has been addressed by the executed steps
    pub satisfied: bool,
    /// What still needs to be done, if not satisfied. Null if satisfied.
    #[serde(default)]
    pub remaining_request: Option<String>,
    /// Brief explanation of why the request is or is not fully satisfied
    pub reasoning: String,
}

impl Validated for ReflectionResult {
    type Raw = RawReflection;

    fn validate(raw: RawReflection) -> Result<Self, ValidationError> {
        Self::new(raw.satisfied, raw.remaining_request, raw.reasoning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfied_with_remaining_rejected() {
        let err = ReflectionResult::new(true, Some("baggage claim".into()), "done").unwrap_err();
        assert_eq!(err.errors[0].field, "remaining_request");
    }

    #[test]
    fn test_blank_remaining_normalised() {
        let r = ReflectionResult::new(true, Some("   ".into()), "done").unwrap();
        assert_eq!(r.remaining_request(), None);
        let r = ReflectionResult::new(false, Some("".into()), "nothing left").unwrap();
        assert_eq!(r.next_request(), None);
    }

    #[test]
    fn test_next_request() {
        let r = ReflectionResult::unsatisfied(" baggage claim ", "bags not covered").unwrap();
        assert_eq!(r.next_request(), Some("baggage claim"));
        assert!(ReflectionResult::satisfied("").is_err());
    }
}

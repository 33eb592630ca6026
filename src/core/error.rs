//! Agent 错误类型
//!
//! 路由分支（Fallback / Clarify）不是错误；只有 oracle 失败、校验失败与编程错误（重复注册、查找未注册 handler）走 AgentError。

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// 单个字段的校验失败（字段路径 + 原因）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// 数据契约构造失败：收集全部字段错误，而不是遇到第一个就返回
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// 无错误时返回 Ok(value)，便于构造函数末尾收尾
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// 简短摘要（最多前三条），用于日志与面向用户的诊断
    pub fn summary(&self) -> String {
        if self.errors.is_empty() {
            return "Response format was invalid".to_string();
        }
        self.errors
            .iter()
            .take(3)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

impl std::error::Error for ValidationError {}

/// Oracle 输出在全部重试后仍未通过校验：保留原始输出与字段错误供诊断
#[derive(Debug, Clone, Error)]
#[error("oracle output failed validation after {attempts} attempt(s): {errors}")]
pub struct OracleValidationError {
    pub attempts: u32,
    pub raw_response: String,
    pub errors: ValidationError,
}

/// 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Validation(#[from] OracleValidationError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Oracle call exceeded deadline of {0:?}")]
    OracleTimeout(Duration),

    /// 编程错误：路由总是先 has(name)，只有 bug 才会走到这里
    #[error("Handler '{name}' not found. Available: {available:?}")]
    HandlerNotFound { name: String, available: Vec<String> },

    #[error("Handler '{0}' is already registered")]
    DuplicateHandler(String),

    #[error("Invalid thresholds: clarify={clarify}, execute={execute} (need 0 <= clarify < execute <= 1)")]
    InvalidThresholds { clarify: f64, execute: f64 },

    #[error("Prompt template not found: {0}")]
    TemplateMissing(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 是否为 oracle 校验失败（外层据此返回通用致歉并记录原始输出）
    pub fn is_validation(&self) -> bool {
        matches!(self, AgentError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_summary_limits_to_three() {
        let mut err = ValidationError::new();
        for i in 0..5 {
            err.push(format!("field{i}"), "bad");
        }
        let summary = err.summary();
        assert!(summary.contains("field0"));
        assert!(summary.contains("field2"));
        assert!(!summary.contains("field3"));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ValidationError::new().into_result(7), Ok(7));
        let err = ValidationError::single("confidence", "out of range");
        assert!(err.into_result(7).is_err());
    }

    #[test]
    fn test_is_validation() {
        let err = AgentError::from(OracleValidationError {
            attempts: 2,
            raw_response: "{}".to_string(),
            errors: ValidationError::single("intent", "must not be empty"),
        });
        assert!(err.is_validation());
        assert!(!AgentError::Llm("boom".into()).is_validation());
    }
}

//! StructuredOracle：把 LlmClient 包装为「类型化输出或校验失败」的 oracle
//!
//! - complete_text：自由文本（回复生成、摘要、bypass）
//! - complete_structured：在 system prompt 末尾追加由 schemars 生成的 JSON Schema，提取回复中的 JSON，
//!   反序列化为 `T::Raw` 再经 `Validated::validate` 收紧为 `T`；失败时以相同消息重试，直至 `max_attempts`
//!
//! 仅校验失败会重试；传输错误与超时立即返回。

use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::core::{AgentError, OracleValidationError, ValidationError};
use crate::llm::{LlmClient, Message};

/// 由 oracle 原始输出构造的数据契约：Raw 负责形状，validate 负责取值约束
pub trait Validated: Sized {
    type Raw: DeserializeOwned + JsonSchema;

    fn validate(raw: Self::Raw) -> Result<Self, ValidationError>;
}

/// 重试与超时策略（显式参数，测试可精确模拟「失败一次」与「失败两次」）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OraclePolicy {
    /// 总尝试次数，2 表示一次重试；0 按 1 处理
    pub max_attempts: u32,
    pub backoff: Duration,
    pub timeout: Option<Duration>,
}

impl Default for OraclePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::ZERO,
            timeout: None,
        }
    }
}

/// 从模型回复中提取 JSON 对象：优先 ```json 围栏，否则取首个 '{' 到最后一个 '}'
pub fn extract_json(output: &str) -> &str {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn schema_hint<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    let rendered = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "\n\nYou MUST respond with valid JSON matching this schema:\n{}",
        rendered
    )
}

/// 解析并校验一次回复
fn parse_reply<T: Validated>(raw: &str) -> Result<T, ValidationError> {
    let json = extract_json(raw);
    let parsed: T::Raw = serde_json::from_str(json)
        .map_err(|e| ValidationError::single("response", e.to_string()))?;
    T::validate(parsed)
}

pub struct StructuredOracle {
    llm: Arc<dyn LlmClient>,
    policy: OraclePolicy,
}

impl StructuredOracle {
    pub fn new(llm: Arc<dyn LlmClient>, policy: OraclePolicy) -> Self {
        Self { llm, policy }
    }

    pub fn policy(&self) -> OraclePolicy {
        self.policy
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    async fn call(&self, messages: &[Message]) -> Result<String, AgentError> {
        let fut = self.llm.complete(messages);
        let result = match self.policy.timeout {
            Some(deadline) => tokio::time::timeout(deadline, fut)
                .await
                .map_err(|_| AgentError::OracleTimeout(deadline))?,
            None => fut.await,
        };
        result.map_err(AgentError::Llm)
    }

    /// 自由文本调用：system + user
    pub async fn complete_text(&self, system: &str, user: &str) -> Result<String, AgentError> {
        let messages = Message::pair(system, user);
        tracing::debug!(system_len = system.len(), user_len = user.len(), "oracle text call");
        self.call(&messages).await
    }

    /// 结构化调用：返回通过校验的 T，或在全部尝试后返回 AgentError::Validation
    pub async fn complete_structured<T: Validated>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<T, AgentError> {
        let system = format!("{}{}", system, schema_hint::<T::Raw>());
        let messages = Message::pair(system, user);
        let max_attempts = self.policy.max_attempts.max(1);

        let mut last_raw = String::new();
        let mut last_errors = ValidationError::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 && !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }

            let raw = self.call(&messages).await?;
            match parse_reply::<T>(&raw) {
                Ok(value) => {
                    tracing::debug!(attempt, "oracle output validated");
                    return Ok(value);
                }
                Err(errors) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        errors = %errors,
                        "oracle output failed validation"
                    );
                    last_raw = raw;
                    last_errors = errors;
                }
            }
        }

        tracing::error!(raw = %last_raw, errors = %last_errors, "oracle output rejected after all attempts");
        Err(AgentError::Validation(OracleValidationError {
            attempts: max_attempts,
            raw_response: last_raw,
            errors: last_errors,
        }))
    }
}

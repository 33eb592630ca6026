//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 LlmClient；分类、反思、摘要、回复生成都经由它调用模型。

use async_trait::async_trait;

use crate::llm::Message;

/// LLM 客户端 trait：非流式完成；错误以字符串返回，由 StructuredOracle 统一转为 AgentError
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

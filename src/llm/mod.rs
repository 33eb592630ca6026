//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）以及结构化输出 oracle

pub mod message;
pub mod mock;
pub mod openai;
pub mod structured;
pub mod traits;

pub use message::{Message, Role};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use structured::{extract_json, OraclePolicy, StructuredOracle, Validated};
pub use traits::LlmClient;

//! airdesk - 航空客服任务路由
//!
//! 模块划分：
//! - **agent**: 由配置组装 Orchestrator（LLM 后端、存储、handler 注册）
//! - **compose**: 结构化事实 → 自然语言回复（单步 / 多步合并）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、路由阈值、会话锁、编排器
//! - **handlers**: handler 注册表与七个客服能力（模拟业务数据）
//! - **intent**: 分类数据契约与意图分类器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock），结构化输出 oracle
//! - **memory**: 对话轮次、会话存储、滚动摘要与上下文管理
//! - **prompts**: Prompt 模板（内置默认 + 目录覆盖）
//! - **reflection**: 反思评估与有界多步循环

pub mod agent;
pub mod compose;
pub mod config;
pub mod core;
pub mod handlers;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompts;
pub mod reflection;

pub use agent::{build_orchestrator, AgentBuilder};
pub use core::{AgentError, AgentResponse, Orchestrator, RoutedTo};

//! 发往 LLM 的对话消息
//!
//! Oracle 调用统一为「一条 system + 一条 user」，Message 保留 Role 以便兼容多轮后端。

use serde::{Deserialize, Serialize};

/// 消息角色（与 OpenAI 兼容 API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// 单次 oracle 调用的标准消息对
    pub fn pair(system: impl Into<String>, user: impl Into<String>) -> Vec<Self> {
        vec![Self::system(system), Self::user(user)]
    }
}

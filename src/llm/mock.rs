//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! - MockLlmClient：回显最后一条 User 消息
//! - ScriptedLlmClient：按顺序返回预设回复，并记录每次收到的消息，便于断言重试次数与 prompt 内容

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

/// 脚本化客户端：每次 complete 弹出队首回复；队列耗尽后返回 Err
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条成功回复
    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Ok(reply.into()));
        }
    }

    /// 追加一条传输层失败
    pub fn push_error(&self, error: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(error.into()));
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 全部调用收到的消息（按调用顺序）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| "script lock poisoned".to_string())?
            .pop_front();
        next.unwrap_or_else(|| Err("script exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_last_user() {
        let reply = MockLlmClient
            .complete(&Message::pair("sys", "hello"))
            .await
            .unwrap();
        assert_eq!(reply, "Echo from Mock: hello");
    }

    #[tokio::test]
    async fn test_scripted_pops_in_order_and_records() {
        let client = ScriptedLlmClient::new(["one", "two"]);
        client.push_error("down");
        assert_eq!(client.complete(&Message::pair("s", "a")).await.unwrap(), "one");
        assert_eq!(client.complete(&Message::pair("s", "b")).await.unwrap(), "two");
        assert_eq!(client.complete(&Message::pair("s", "c")).await, Err("down".to_string()));
        assert!(client.complete(&Message::pair("s", "d")).await.is_err());
        assert_eq!(client.call_count(), 4);
        assert_eq!(client.calls()[1][1].content, "b");
    }
}

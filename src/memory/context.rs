//! 上下文管理器
//!
//! 包装 MemoryStore：路由前加载 (摘要, 实体, 最近窗口)，回复后持久化本轮。
//! 轮数超过窗口时同步弹出最旧一轮并折叠进摘要；这一步会调用一次模型。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::AgentError;
use crate::intent::ClassificationResult;
use crate::memory::{ConversationTurn, MemoryStore, Summarizer};

/// 一次请求开始时的会话快照；在整个请求（含反思循环）内保持不变
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    pub summary: String,
    pub entities: BTreeMap<String, String>,
    /// 最新在前
    pub recent_turns: Vec<ConversationTurn>,
}

impl ContextSnapshot {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.entities.is_empty() && self.recent_turns.is_empty()
    }
}

pub struct ContextManager {
    store: Arc<dyn MemoryStore>,
    summarizer: Arc<dyn Summarizer>,
    window_size: usize,
}

impl ContextManager {
    pub fn new(store: Arc<dyn MemoryStore>, summarizer: Arc<dyn Summarizer>, window_size: usize) -> Self {
        Self {
            store,
            summarizer,
            window_size,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// 加载快照；只刷新会话活跃时间，不改内容
    pub async fn load_context(&self, session_id: &str) -> ContextSnapshot {
        self.store.touch(session_id).await;
        let snapshot = ContextSnapshot {
            summary: self.store.get_summary(session_id).await,
            entities: self.store.get_entities(session_id).await,
            recent_turns: self.store.get_turns(session_id, self.window_size).await,
        };
        if !snapshot.is_empty() {
            tracing::debug!(
                session = %session_id,
                entities = snapshot.entities.len(),
                turns = snapshot.recent_turns.len(),
                has_summary = !snapshot.summary.is_empty(),
                "context loaded"
            );
        }
        snapshot
    }

    /// 写入本轮；窗口溢出时折叠最旧一轮（每次至多一轮）
    pub async fn save_turn(
        &self,
        session_id: &str,
        user_input: &str,
        agent_answer: &str,
        classification: &ClassificationResult,
        tool_reasoning: Option<String>,
    ) -> Result<(), AgentError> {
        let turn = ConversationTurn::from_classification(user_input, agent_answer, classification, tool_reasoning);
        self.store.save_turn(session_id, turn).await;
        self.fold_if_window_overflows(session_id).await
    }

    async fn fold_if_window_overflows(&self, session_id: &str) -> Result<(), AgentError> {
        let turn_count = self.store.get_turn_count(session_id).await;
        if turn_count <= self.window_size {
            return Ok(());
        }
        tracing::info!(
            session = %session_id,
            turn_count,
            window = self.window_size,
            "window overflow, folding oldest turn"
        );
        // 先折叠再弹出：摘要失败时最旧一轮仍留在存储中
        let Some(oldest) = self.store.get_turns(session_id, turn_count).await.pop() else {
            return Ok(());
        };
        let existing = self.store.get_summary(session_id).await;
        let updated = self.summarizer.fold_turn(&oldest, &existing).await?;
        self.store.save_summary(session_id, updated).await;
        self.store.pop_oldest_turn(session_id).await;
        Ok(())
    }
}

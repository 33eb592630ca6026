//! 会话记忆存储
//!
//! MemoryStore 定义按 session id 存取的原语；InMemoryStore 为进程内实现（重启即丢失）。
//! 每个会话保存：按插入顺序的 turn 窗口、累积实体表（后写覆盖）、一段滚动摘要。

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::memory::ConversationTurn;

/// 会话存储接口
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 追加一轮；首次写入时惰性创建会话，并把本轮实体合并进累积实体表
    async fn save_turn(&self, session_id: &str, turn: ConversationTurn);

    /// 最近 limit 轮，最新在前
    async fn get_turns(&self, session_id: &str, limit: usize) -> Vec<ConversationTurn>;

    async fn get_entities(&self, session_id: &str) -> BTreeMap<String, String>;

    /// 无摘要时返回空串
    async fn get_summary(&self, session_id: &str) -> String;

    /// 整体替换摘要
    async fn save_summary(&self, session_id: &str, summary: String);

    /// 移除并返回最旧的一轮
    async fn pop_oldest_turn(&self, session_id: &str) -> Option<ConversationTurn>;

    async fn get_turn_count(&self, session_id: &str) -> usize;

    async fn clear(&self, session_id: &str);

    /// 刷新会话活跃时间；会话不存在时不创建
    async fn touch(&self, session_id: &str);

    /// 清理空闲超过 ttl 的会话，返回清理数量
    async fn evict_idle(&self, ttl: Duration) -> usize;

    /// 当前会话数
    async fn session_count(&self) -> usize;
}

#[derive(Debug)]
struct SessionState {
    turns: VecDeque<ConversationTurn>,
    entities: BTreeMap<String, String>,
    summary: String,
    last_active: Instant,
}

impl SessionState {
    fn new() -> Self {
        Self {
            turns: VecDeque::new(),
            entities: BTreeMap::new(),
            summary: String::new(),
            last_active: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    fn is_idle(&self, ttl: Duration) -> bool {
        self.last_active.elapsed() > ttl
    }
}

/// 内存实现：tokio RwLock 保护的 session_id → SessionState
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn save_turn(&self, session_id: &str, turn: ConversationTurn) {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionState::new);
        for (k, v) in &turn.entities {
            state.entities.insert(k.clone(), v.clone());
        }
        state.turns.push_back(turn);
        state.touch();
        tracing::debug!(session = %session_id, total = state.turns.len(), "turn saved");
    }

    async fn get_turns(&self, session_id: &str, limit: usize) -> Vec<ConversationTurn> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.turns.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    async fn get_entities(&self, session_id: &str) -> BTreeMap<String, String> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.entities.clone())
            .unwrap_or_default()
    }

    async fn get_summary(&self, session_id: &str) -> String {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.summary.clone())
            .unwrap_or_default()
    }

    async fn save_summary(&self, session_id: &str, summary: String) {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionState::new);
        tracing::debug!(session = %session_id, chars = summary.len(), "summary saved");
        state.summary = summary;
        state.touch();
    }

    async fn pop_oldest_turn(&self, session_id: &str) -> Option<ConversationTurn> {
        let mut sessions = self.sessions.write().await;
        let state = sessions.get_mut(session_id)?;
        state.touch();
        state.turns.pop_front()
    }

    async fn get_turn_count(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.turns.len())
            .unwrap_or(0)
    }

    async fn clear(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            tracing::info!(session = %session_id, "session cleared");
        }
    }

    async fn touch(&self, session_id: &str) {
        if let Some(state) = self.sessions.write().await.get_mut(session_id) {
            state.touch();
        }
    }

    async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_idle(ttl));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, "idle sessions evicted");
        }
        evicted
    }

    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

//! 记忆层：对话轮次、会话存储、滚动摘要与上下文管理

pub mod context;
pub mod store;
pub mod summarizer;
pub mod turn;

pub use context::{ContextManager, ContextSnapshot};
pub use store::{InMemoryStore, MemoryStore};
pub use summarizer::{LlmSummarizer, Summarizer};
pub use turn::ConversationTurn;

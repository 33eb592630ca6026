//! 核心编排层：错误类型、路由阈值、会话锁与编排器

pub mod error;
pub mod orchestrator;
pub mod session_lock;
pub mod thresholds;

pub use error::{AgentError, FieldError, OracleValidationError, ValidationError};
pub use orchestrator::{
    AgentResponse, Orchestrator, OrchestratorParts, RoutedTo, ThresholdOverrides, FALLBACK_CAPABILITIES,
};
pub use session_lock::SessionLocks;
pub use thresholds::{RouteDecision, RoutingThresholds, SharedThresholds};

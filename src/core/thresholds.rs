//! 路由阈值与置信度决策
//!
//! 阈值是进程级可变配置（支持运行时调整），每次请求开始时取一次快照，请求内不再读取。

use std::sync::{Arc, RwLock};

use crate::core::AgentError;

/// 置信度对应的路由分支
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Fallback,
    Clarify,
    Execute,
}

/// 需满足 0 <= clarify < execute <= 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingThresholds {
    clarify: f64,
    execute: f64,
}

impl Default for RoutingThresholds {
    fn default() -> Self {
        Self {
            clarify: 0.4,
            execute: 0.7,
        }
    }
}

impl RoutingThresholds {
    pub fn new(clarify: f64, execute: f64) -> Result<Self, AgentError> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(clarify) || !in_range(execute) || clarify >= execute {
            return Err(AgentError::InvalidThresholds { clarify, execute });
        }
        Ok(Self { clarify, execute })
    }

    pub fn clarify(&self) -> f64 {
        self.clarify
    }

    pub fn execute(&self) -> f64 {
        self.execute
    }

    /// 用可选覆盖值生成新阈值（覆盖后仍须合法）
    pub fn with_overrides(&self, clarify: Option<f64>, execute: Option<f64>) -> Result<Self, AgentError> {
        Self::new(clarify.unwrap_or(self.clarify), execute.unwrap_or(self.execute))
    }

    pub fn decide(&self, confidence: f64) -> RouteDecision {
        if confidence < self.clarify {
            RouteDecision::Fallback
        } else if confidence < self.execute {
            RouteDecision::Clarify
        } else {
            RouteDecision::Execute
        }
    }
}

/// 进程内共享的阈值；读写都是整对替换，不会读到半新半旧的值
#[derive(Debug, Clone, Default)]
pub struct SharedThresholds {
    inner: Arc<RwLock<RoutingThresholds>>,
}

impl SharedThresholds {
    pub fn new(thresholds: RoutingThresholds) -> Self {
        Self {
            inner: Arc::new(RwLock::new(thresholds)),
        }
    }

    pub fn snapshot(&self) -> RoutingThresholds {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn update(&self, thresholds: RoutingThresholds) {
        tracing::info!(
            clarify = thresholds.clarify(),
            execute = thresholds.execute(),
            "routing thresholds updated"
        );
        match self.inner.write() {
            Ok(mut guard) => *guard = thresholds,
            Err(poisoned) => *poisoned.into_inner() = thresholds,
        }
    }
}

//! Handler 注册表
//!
//! 每个能力实现 Capability（build_request + execute，请求/响应类型各自定义），
//! 通过 blanket impl 擦除为对象安全的 Handler 供路由调用；HandlerRegistry 按注册顺序保存
//! name → (description, factory)，get 时用 HandlerDeps 实例化。

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::handlers::{AgentContext, GroundingData, HandlerResponse};
use crate::intent::ClassificationResult;

/// 类型化能力：请求从分类结果构建，响应是结构化事实（不含自然语言回复）
#[async_trait]
pub trait Capability: Send + Sync {
    type Request: fmt::Debug + Send + Sync;
    type Response: Into<HandlerResponse> + Send;

    fn build_request(&self, classification: &ClassificationResult) -> Self::Request;

    async fn execute(&self, request: Self::Request, context: &AgentContext) -> Self::Response;
}

/// 对象安全的 handler：路由层只见到这一接口，不需要按 handler 分支
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, classification: &ClassificationResult, context: &AgentContext) -> HandlerResponse;
}

#[async_trait]
impl<C> Handler for C
where
    C: Capability,
{
    async fn handle(&self, classification: &ClassificationResult, context: &AgentContext) -> HandlerResponse {
        let request = self.build_request(classification);
        tracing::debug!(intent = classification.intent(), ?request, "handler request built");
        self.execute(request, context).await.into()
    }
}

/// 实例化 handler 时注入的依赖
#[derive(Clone)]
pub struct HandlerDeps {
    pub data: Arc<GroundingData>,
}

impl HandlerDeps {
    pub fn new(data: Arc<GroundingData>) -> Self {
        Self { data }
    }

    pub fn mock() -> Self {
        Self::new(Arc::new(GroundingData::mock()))
    }
}

pub type HandlerFactory = Arc<dyn Fn(&HandlerDeps) -> Box<dyn Handler> + Send + Sync>;

struct Registration {
    name: String,
    description: String,
    factory: HandlerFactory,
}

#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<Registration>,
    instantiations: AtomicUsize,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重复名称立即拒绝，不覆盖
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        factory: F,
    ) -> Result<(), AgentError>
    where
        F: Fn(&HandlerDeps) -> Box<dyn Handler> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.has(&name) {
            return Err(AgentError::DuplicateHandler(name));
        }
        self.entries.push(Registration {
            name,
            description: description.into(),
            factory: Arc::new(factory),
        });
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str, deps: &HandlerDeps) -> Result<Box<dyn Handler>, AgentError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| AgentError::HandlerNotFound {
                name: name.to_string(),
                available: self.names(),
            })?;
        self.instantiations.fetch_add(1, Ordering::Relaxed);
        Ok((entry.factory)(deps))
    }

    /// 注册顺序
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 注入分类 prompt 的工具列表，每行 "- {name}: {description}"
    pub fn routing_descriptions(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("- {}: {}", e.name, e.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// get 成功实例化的累计次数
    pub fn instantiation_count(&self) -> usize {
        self.instantiations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::faq::FaqHandler;

    fn faq_factory(deps: &HandlerDeps) -> Box<dyn Handler> {
        Box::new(FaqHandler::new(deps.data.clone()))
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = HandlerRegistry::new();
        registry.register("faq", "FAQ", faq_factory).unwrap();
        let err = registry.register("faq", "again", faq_factory).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateHandler(name) if name == "faq"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_unknown_lists_available() {
        let mut registry = HandlerRegistry::new();
        registry.register("faq", "FAQ", faq_factory).unwrap();
        match registry.get("teleport", &HandlerDeps::mock()) {
            Err(AgentError::HandlerNotFound { name, available }) => {
                assert_eq!(name, "teleport");
                assert_eq!(available, vec!["faq".to_string()]);
            }
            _ => panic!("expected HandlerNotFound"),
        }
        assert_eq!(registry.instantiation_count(), 0);
    }

    #[test]
    fn test_routing_descriptions_in_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry.register("seat", "Seats", faq_factory).unwrap();
        registry.register("faq", "Questions", faq_factory).unwrap();
        assert_eq!(registry.routing_descriptions(), "- seat: Seats\n- faq: Questions");
        assert!(registry.has("seat"));
        assert!(!registry.has("Seat"));
    }

    #[tokio::test]
    async fn test_get_counts_and_handles() {
        let mut registry = HandlerRegistry::new();
        registry.register("faq", "FAQ", faq_factory).unwrap();
        let handler = registry.get("faq", &HandlerDeps::mock()).unwrap();
        let classification =
            ClassificationResult::new("faq", 0.9, "pets", "Can I bring my dog?", vec![]).unwrap();
        let response = handler.handle(&classification, &AgentContext::default()).await;
        assert_eq!(response.kind(), "FaqResponse");
        assert_eq!(registry.instantiation_count(), 1);
    }
}

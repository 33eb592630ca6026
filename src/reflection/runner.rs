//! 反思循环：执行 → 反思 → 重分类，最多 MAX_STEPS 步
//!
//! 一句话里捆绑多个意图时（"查航班，顺便问下行李"），逐个执行对应 handler，每步后由反思评估器
//! 判断是否已覆盖完整请求；未覆盖则用 remaining_request 重分类，进入下一步。
//!
//! - 重分类沿用调用方传入的上下文快照（实体、最近轮次、摘要），循环内不刷新
//! - 重分类得到未注册的意图或低于执行阈值时截断，返回已有的部分结果
//! - 首步意图未注册时返回 None，由编排器按 Fallback 处理

use crate::core::AgentError;
use crate::handlers::{AgentContext, HandlerDeps, HandlerRegistry, HandlerResponse};
use crate::intent::{ClassificationRequest, ClassificationResult, Classifier};
use crate::reflection::{ExecutedStep, Reflector};

pub const MAX_STEPS: usize = 3;

/// 单步结果：结构化响应与该步使用的分类
#[derive(Debug, Clone)]
pub struct StepResult {
    pub response: HandlerResponse,
    pub classification: ClassificationResult,
}

pub struct ReflectionLoop<'a> {
    registry: &'a HandlerRegistry,
    deps: &'a HandlerDeps,
    classifier: &'a dyn Classifier,
    reflector: &'a dyn Reflector,
}

impl<'a> ReflectionLoop<'a> {
    pub fn new(
        registry: &'a HandlerRegistry,
        deps: &'a HandlerDeps,
        classifier: &'a dyn Classifier,
        reflector: &'a dyn Reflector,
    ) -> Self {
        Self {
            registry,
            deps,
            classifier,
            reflector,
        }
    }

    /// 返回按执行顺序排列的结果；进入有效时至少一项
    pub async fn run(
        &self,
        user_input: &str,
        initial: ClassificationResult,
        context: &AgentContext,
        execute_threshold: f64,
        base_request: ClassificationRequest<'_>,
    ) -> Result<Option<Vec<StepResult>>, AgentError> {
        let mut results: Vec<StepResult> = Vec::new();
        let mut executed: Vec<ExecutedStep> = Vec::new();
        let mut current = initial;

        for step in 0..MAX_STEPS {
            if !self.registry.has(current.intent()) {
                if step == 0 {
                    tracing::warn!(intent = current.intent(), "initial intent not registered");
                    return Ok(None);
                }
                tracing::warn!(step, intent = current.intent(), "re-classified intent not registered, stopping");
                break;
            }

            let handler = self.registry.get(current.intent(), self.deps)?;
            tracing::info!(step, intent = current.intent(), confidence = current.confidence(), "executing handler");
            let response = handler.handle(&current, context).await;

            executed.push(ExecutedStep {
                intent: current.intent().to_string(),
                summary: response.step_summary().to_string(),
            });
            results.push(StepResult {
                response,
                classification: current.clone(),
            });

            if step + 1 >= MAX_STEPS {
                tracing::debug!(step, "step limit reached, skipping reflection");
                break;
            }

            let reflection = self.reflector.evaluate(user_input, &executed).await?;
            let Some(remaining) = reflection.next_request() else {
                tracing::debug!(step, "request satisfied");
                break;
            };

            let next = self
                .classifier
                .classify(&base_request.with_input(remaining))
                .await?;
            if next.confidence() < execute_threshold {
                tracing::warn!(
                    step,
                    intent = next.intent(),
                    confidence = next.confidence(),
                    "follow-up classification below execute threshold, stopping"
                );
                break;
            }
            current = next;
        }

        Ok(Some(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::register_default_handlers;
    use crate::reflection::ReflectionResult;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    /// 依次返回预设分类，并记录收到的输入
    struct StubClassifier {
        replies: Mutex<VecDeque<ClassificationResult>>,
        inputs: Mutex<Vec<String>>,
    }

    impl StubClassifier {
        fn new(replies: Vec<ClassificationResult>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                inputs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(&self, request: &ClassificationRequest<'_>) -> Result<ClassificationResult, AgentError> {
            self.inputs.lock().unwrap().push(request.user_input.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Llm("no classification left".into()))
        }
    }

    struct StubReflector {
        replies: Mutex<VecDeque<ReflectionResult>>,
        calls: Mutex<usize>,
    }

    impl StubReflector {
        fn new(replies: Vec<ReflectionResult>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn never_satisfied() -> Self {
            Self::new((0..10).map(|_| ReflectionResult::unsatisfied("more help", "still open").unwrap()).collect())
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Reflector for StubReflector {
        async fn evaluate(&self, _: &str, _: &[ExecutedStep]) -> Result<ReflectionResult, AgentError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Llm("no reflection left".into()))
        }
    }

    fn classification(intent: &str, confidence: f64) -> ClassificationResult {
        ClassificationResult::new(intent, confidence, "test", format!("{intent} request"), vec![]).unwrap()
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        register_default_handlers(&mut registry).unwrap();
        registry
    }

    async fn run(
        registry: &HandlerRegistry,
        classifier: &StubClassifier,
        reflector: &StubReflector,
        initial: ClassificationResult,
    ) -> Option<Vec<StepResult>> {
        let deps = HandlerDeps::mock();
        let entities = BTreeMap::new();
        let base = ClassificationRequest {
            user_input: "original",
            available_tools: "tools",
            session_entities: &entities,
            recent_turns: &[],
            conversation_summary: "",
        };
        ReflectionLoop::new(registry, &deps, classifier, reflector)
            .run("original", initial, &AgentContext::default(), 0.7, base)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_never_satisfied_stops_at_max_steps() {
        let registry = registry();
        let classifier = StubClassifier::new((0..10).map(|_| classification("faq", 0.9)).collect());
        let reflector = StubReflector::never_satisfied();
        let results = run(&registry, &classifier, &reflector, classification("flight_status", 0.9))
            .await
            .unwrap();
        assert_eq!(results.len(), MAX_STEPS);
        assert_eq!(registry.instantiation_count(), MAX_STEPS);
        assert_eq!(reflector.calls(), MAX_STEPS - 1);
    }

    #[tokio::test]
    async fn test_satisfied_after_first_step() {
        let registry = registry();
        let classifier = StubClassifier::new(vec![]);
        let reflector = StubReflector::new(vec![ReflectionResult::satisfied("all done").unwrap()]);
        let results = run(&registry, &classifier, &reflector, classification("baggage", 0.95))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].classification.intent(), "baggage");
        assert_eq!(results[0].response.kind(), "BaggageResponse");
    }

    #[tokio::test]
    async fn test_two_intent_bundle_reclassifies_remaining() {
        let registry = registry();
        let classifier = StubClassifier::new(vec![classification("baggage", 0.9)]);
        let reflector = StubReflector::new(vec![
            ReflectionResult::unsatisfied("baggage claim", "bags not handled").unwrap(),
            ReflectionResult::satisfied("both handled").unwrap(),
        ]);
        let results = run(&registry, &classifier, &reflector, classification("flight_status", 0.9))
            .await
            .unwrap();
        let intents: Vec<&str> = results.iter().map(|r| r.classification.intent()).collect();
        assert_eq!(intents, vec!["flight_status", "baggage"]);
        assert_eq!(*classifier.inputs.lock().unwrap(), vec!["baggage claim".to_string()]);
    }

    #[tokio::test]
    async fn test_unregistered_initial_intent_is_none() {
        let registry = registry();
        let classifier = StubClassifier::new(vec![]);
        let reflector = StubReflector::new(vec![]);
        let results = run(&registry, &classifier, &reflector, classification("teleport", 0.99)).await;
        assert!(results.is_none());
        assert_eq!(registry.instantiation_count(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_followup_truncates() {
        let registry = registry();
        let classifier = StubClassifier::new(vec![classification("hotel_booking", 0.9)]);
        let reflector = StubReflector::never_satisfied();
        let results = run(&registry, &classifier, &reflector, classification("seat", 0.9))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_followup_truncates() {
        let registry = registry();
        let classifier = StubClassifier::new(vec![classification("baggage", 0.5)]);
        let reflector = StubReflector::never_satisfied();
        let results = run(&registry, &classifier, &reflector, classification("faq", 0.9))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(registry.instantiation_count(), 1);
    }
}

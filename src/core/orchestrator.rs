//! 编排器：置信度门控路由
//!
//! 每个请求：取阈值快照 → 锁定会话 → 加载上下文 → 分类 → 按置信度进入
//! Fallback / Clarify / Execute（反思循环）→ 生成回复 → 持久化本轮。
//!
//! Fallback 与 Clarify 是正常结果，不返回错误；只有 oracle 失败或校验失败会以 AgentError 传给调用方。
//! Bypass 是独立入口，不经过分类。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::compose::ResponseComposer;
use crate::core::{AgentError, RouteDecision, RoutingThresholds, SessionLocks, SharedThresholds};
use crate::handlers::{AgentContext, HandlerDeps, HandlerRegistry};
use crate::intent::{ClassificationRequest, ClassificationResult, Classifier, Entity};
use crate::llm::StructuredOracle;
use crate::memory::ContextManager;
use crate::prompts::{PromptTemplates, BYPASS_SYSTEM_PROMPT, CLARIFICATION_MESSAGE, FALLBACK_MESSAGE};
use crate::reflection::{ReflectionLoop, Reflector, StepResult};

/// Fallback 回复中列出的能力类别
pub const FALLBACK_CAPABILITIES: &str = "- baggage (lost bags, claims, policies)
- booking (search and book flights)
- cancellation (cancel existing bookings)
- flight status (delays, gates, times)
- seat selection (changes, preferences)
- compensation (delays, disruptions)
- FAQs (policies, general questions)";

const VALIDATION_APOLOGY: &str = "I apologize, but I encountered an issue processing your request. Could you please rephrase your question or try again?";
const GENERIC_APOLOGY: &str =
    "I apologize, but something went wrong. Please try again or contact customer service for assistance.";

/// 本次回复的去向；序列化为 handler 名或固定哨兵值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedTo {
    Handler(String),
    Fallback,
    Clarification,
    Bypass,
    Error,
}

impl RoutedTo {
    pub fn as_str(&self) -> &str {
        match self {
            RoutedTo::Handler(name) => name,
            RoutedTo::Fallback => "fallback",
            RoutedTo::Clarification => "clarification",
            RoutedTo::Bypass => "bypass",
            RoutedTo::Error => "error",
        }
    }
}

impl fmt::Display for RoutedTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RoutedTo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub answer: String,
    pub routed_to: RoutedTo,
    pub confidence: f64,
    pub original_input: String,
    pub rewritten_input: String,
    pub entities: Vec<Entity>,
}

impl AgentResponse {
    fn from_classification(answer: String, routed_to: RoutedTo, user_input: &str, c: &ClassificationResult) -> Self {
        Self {
            answer,
            routed_to,
            confidence: c.confidence(),
            original_input: user_input.to_string(),
            rewritten_input: c.rewritten_prompt().to_string(),
            entities: c.entities().to_vec(),
        }
    }

    /// 面向用户的通用致歉；诊断细节只进日志
    pub fn error(user_input: &str, err: &AgentError) -> Self {
        let answer = if err.is_validation() {
            VALIDATION_APOLOGY
        } else {
            GENERIC_APOLOGY
        };
        Self {
            answer: answer.to_string(),
            routed_to: RoutedTo::Error,
            confidence: 0.0,
            original_input: user_input.to_string(),
            rewritten_input: user_input.to_string(),
            entities: Vec::new(),
        }
    }
}

/// 单次请求的阈值覆盖
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdOverrides {
    pub clarify: Option<f64>,
    pub execute: Option<f64>,
}

/// 编排器依赖，进程启动时构造一次后注入
pub struct OrchestratorParts {
    pub registry: Arc<HandlerRegistry>,
    pub deps: HandlerDeps,
    pub classifier: Arc<dyn Classifier>,
    pub reflector: Arc<dyn Reflector>,
    pub composer: Arc<dyn ResponseComposer>,
    pub context: Arc<ContextManager>,
    pub bypass: Arc<StructuredOracle>,
    pub templates: Arc<PromptTemplates>,
    pub thresholds: RoutingThresholds,
}

pub struct Orchestrator {
    registry: Arc<HandlerRegistry>,
    deps: HandlerDeps,
    classifier: Arc<dyn Classifier>,
    reflector: Arc<dyn Reflector>,
    composer: Arc<dyn ResponseComposer>,
    context: Arc<ContextManager>,
    bypass: Arc<StructuredOracle>,
    templates: Arc<PromptTemplates>,
    thresholds: SharedThresholds,
    locks: SessionLocks,
}

impl Orchestrator {
    pub fn new(parts: OrchestratorParts) -> Self {
        Self {
            registry: parts.registry,
            deps: parts.deps,
            classifier: parts.classifier,
            reflector: parts.reflector,
            composer: parts.composer,
            context: parts.context,
            bypass: parts.bypass,
            templates: parts.templates,
            thresholds: SharedThresholds::new(parts.thresholds),
            locks: SessionLocks::new(),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn context_manager(&self) -> &ContextManager {
        &self.context
    }

    /// 运行时可调整的共享阈值
    pub fn thresholds(&self) -> &SharedThresholds {
        &self.thresholds
    }

    pub async fn process_request(
        &self,
        session_id: &str,
        user_input: &str,
        context: &AgentContext,
    ) -> Result<AgentResponse, AgentError> {
        self.process_request_with(session_id, user_input, context, ThresholdOverrides::default())
            .await
    }

    pub async fn process_request_with(
        &self,
        session_id: &str,
        user_input: &str,
        context: &AgentContext,
        overrides: ThresholdOverrides,
    ) -> Result<AgentResponse, AgentError> {
        let thresholds = self
            .thresholds
            .snapshot()
            .with_overrides(overrides.clarify, overrides.execute)?;
        let _guard = self.locks.acquire(session_id).await;

        let snapshot = self.context.load_context(session_id).await;
        let tools = self.registry.routing_descriptions();
        let request = ClassificationRequest {
            user_input,
            available_tools: &tools,
            session_entities: &snapshot.entities,
            recent_turns: &snapshot.recent_turns,
            conversation_summary: &snapshot.summary,
        };

        let classification = self.classifier.classify(&request).await?;
        let decision = thresholds.decide(classification.confidence());
        tracing::info!(
            session = %session_id,
            intent = classification.intent(),
            confidence = classification.confidence(),
            ?decision,
            "routing decision"
        );

        match decision {
            RouteDecision::Fallback => self.fallback(session_id, user_input, &classification).await,
            RouteDecision::Clarify => self.clarify(session_id, user_input, &classification).await,
            RouteDecision::Execute => {
                let steps = ReflectionLoop::new(
                    &self.registry,
                    &self.deps,
                    self.classifier.as_ref(),
                    self.reflector.as_ref(),
                )
                .run(user_input, classification.clone(), context, thresholds.execute(), request)
                .await?;
                match steps {
                    Some(steps) if !steps.is_empty() => self.respond(session_id, user_input, context, steps).await,
                    _ => {
                        tracing::warn!(
                            session = %session_id,
                            intent = classification.intent(),
                            "classified intent is not a registered handler"
                        );
                        self.fallback(session_id, user_input, &classification).await
                    }
                }
            }
        }
    }

    /// 错误转为致歉回复（日志中保留诊断信息）
    pub async fn handle(
        &self,
        session_id: &str,
        user_input: &str,
        context: &AgentContext,
        overrides: ThresholdOverrides,
    ) -> AgentResponse {
        match self.process_request_with(session_id, user_input, context, overrides).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    AgentError::Validation(v) => tracing::error!(
                        session = %session_id,
                        raw = %v.raw_response,
                        errors = %v.errors,
                        "request failed on oracle validation"
                    ),
                    other => tracing::error!(session = %session_id, error = %other, "request failed"),
                }
                AgentResponse::error(user_input, &err)
            }
        }
    }

    /// 跳过分类直接自由生成，用于对照演示；不写入会话
    pub async fn process_bypass(&self, user_input: &str) -> Result<AgentResponse, AgentError> {
        let system = self.templates.render(BYPASS_SYSTEM_PROMPT, &[])?;
        let answer = self.bypass.complete_text(&system, user_input).await?;
        tracing::info!(chars = answer.len(), "bypass response generated");
        Ok(AgentResponse {
            answer: answer.trim().to_string(),
            routed_to: RoutedTo::Bypass,
            confidence: 0.0,
            original_input: user_input.to_string(),
            rewritten_input: user_input.to_string(),
            entities: Vec::new(),
        })
    }

    pub async fn clear_session(&self, session_id: &str) {
        let _guard = self.locks.acquire(session_id).await;
        self.context.store().clear(session_id).await;
    }

    /// 清理空闲会话及其锁条目
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let evicted = self.context.store().evict_idle(ttl).await;
        self.locks.prune();
        evicted
    }

    async fn fallback(
        &self,
        session_id: &str,
        user_input: &str,
        classification: &ClassificationResult,
    ) -> Result<AgentResponse, AgentError> {
        let confidence = format!("{:.2}", classification.confidence());
        let answer = self.templates.render(
            FALLBACK_MESSAGE,
            &[
                ("available_capabilities", FALLBACK_CAPABILITIES),
                ("confidence", &confidence),
                ("detected_intent", classification.intent()),
            ],
        )?;
        self.context
            .save_turn(session_id, user_input, &answer, classification, None)
            .await?;
        Ok(AgentResponse::from_classification(answer, RoutedTo::Fallback, user_input, classification))
    }

    async fn clarify(
        &self,
        session_id: &str,
        user_input: &str,
        classification: &ClassificationResult,
    ) -> Result<AgentResponse, AgentError> {
        let confidence = format!("{:.2}", classification.confidence());
        let answer = self.templates.render(
            CLARIFICATION_MESSAGE,
            &[("detected_intent", classification.intent()), ("confidence", &confidence)],
        )?;
        self.context
            .save_turn(session_id, user_input, &answer, classification, None)
            .await?;
        Ok(AgentResponse::from_classification(
            answer,
            RoutedTo::Clarification,
            user_input,
            classification,
        ))
    }

    /// 单步 generate，多步 generate_combined；路由元数据取第一步
    async fn respond(
        &self,
        session_id: &str,
        user_input: &str,
        context: &AgentContext,
        steps: Vec<StepResult>,
    ) -> Result<AgentResponse, AgentError> {
        let answer = match steps.as_slice() {
            [single] => {
                self.composer
                    .generate(&single.response, single.classification.intent(), user_input, context)
                    .await?
            }
            many => self.composer.generate_combined(many, user_input, context).await?,
        };

        let primary = &steps[0].classification;
        let tool_reasoning = steps
            .last()
            .and_then(|s| s.response.reasoning())
            .map(str::to_string);
        self.context
            .save_turn(session_id, user_input, &answer, primary, tool_reasoning)
            .await?;

        tracing::info!(
            session = %session_id,
            routed_to = primary.intent(),
            steps = steps.len(),
            "request handled"
        );
        Ok(AgentResponse::from_classification(
            answer,
            RoutedTo::Handler(primary.intent().to_string()),
            user_input,
            primary,
        ))
    }
}

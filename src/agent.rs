//! Agent 构建：由 AppConfig 组装完整的 Orchestrator
//!
//! 两个模型角色：classifier_model（分类、反思、摘要）与 model（回复生成、bypass）。
//! 测试可通过 AgentBuilder 注入 mock / scripted 客户端、自定义存储与业务数据。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::compose::LlmResponseComposer;
use crate::core::{AgentError, Orchestrator, OrchestratorParts};
use crate::handlers::{register_default_handlers, GroundingData, HandlerDeps, HandlerRegistry};
use crate::intent::IntentClassifier;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient, StructuredOracle};
use crate::memory::{ContextManager, InMemoryStore, LlmSummarizer, MemoryStore};
use crate::prompts::PromptTemplates;
use crate::reflection::ReflectionEvaluator;

/// 按配置选择后端：openai 且有 OPENAI_API_KEY 时走 OpenAI 兼容端点，否则 Mock
pub fn create_llm(cfg: &AppConfig, model: &str) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_key = std::env::var("OPENAI_API_KEY").is_ok();

    if provider == "openai" && has_key {
        tracing::info!(model, "Using OpenAI-compatible LLM");
        Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), model, None))
    } else {
        if provider != "mock" {
            tracing::warn!(
                provider = %provider,
                "OPENAI_API_KEY not set, using mock LLM (routing will fail validation)"
            );
        }
        Arc::new(MockLlmClient)
    }
}

pub struct AgentBuilder {
    config: AppConfig,
    main_llm: Option<Arc<dyn LlmClient>>,
    classifier_llm: Option<Arc<dyn LlmClient>>,
    store: Option<Arc<dyn MemoryStore>>,
    data: Option<Arc<GroundingData>>,
    templates: Option<PromptTemplates>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            main_llm: None,
            classifier_llm: None,
            store: None,
            data: None,
            templates: None,
        }
    }

    /// 回复生成与 bypass 使用的客户端
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.main_llm = Some(llm);
        self
    }

    /// 分类、反思与摘要使用的客户端
    pub fn with_classifier_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.classifier_llm = Some(llm);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_grounding_data(mut self, data: Arc<GroundingData>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn build(self) -> Result<Orchestrator, AgentError> {
        let cfg = &self.config;
        let thresholds = cfg.thresholds()?;
        let window_size = cfg.window_size()?;
        let policy = cfg.oracle_policy();

        let templates = match self.templates {
            Some(t) => t,
            None => match &cfg.prompts.dir {
                Some(dir) => PromptTemplates::with_overrides(dir)?,
                None => PromptTemplates::builtin(),
            },
        };
        let templates = Arc::new(templates);

        let main_llm = self
            .main_llm
            .unwrap_or_else(|| create_llm(cfg, &cfg.llm.model));
        let classifier_llm = self
            .classifier_llm
            .unwrap_or_else(|| create_llm(cfg, &cfg.llm.classifier_model));

        let fast = Arc::new(StructuredOracle::new(classifier_llm, policy));
        let main = Arc::new(StructuredOracle::new(main_llm, policy));

        let mut registry = HandlerRegistry::new();
        register_default_handlers(&mut registry)?;

        let store: Arc<dyn MemoryStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStore::new()),
        };
        let summarizer = Arc::new(LlmSummarizer::new(fast.clone(), templates.clone()));
        let context = Arc::new(ContextManager::new(store, summarizer, window_size));

        let data = self
            .data
            .unwrap_or_else(|| Arc::new(GroundingData::mock()));

        tracing::info!(
            handlers = registry.len(),
            clarify = thresholds.clarify(),
            execute = thresholds.execute(),
            window = window_size,
            "orchestrator built"
        );

        Ok(Orchestrator::new(OrchestratorParts {
            registry: Arc::new(registry),
            deps: HandlerDeps::new(data),
            classifier: Arc::new(IntentClassifier::new(fast.clone(), templates.clone())),
            reflector: Arc::new(ReflectionEvaluator::new(fast, templates.clone())),
            composer: Arc::new(LlmResponseComposer::new(main.clone(), templates.clone())),
            context,
            bypass: main,
            templates,
            thresholds,
        }))
    }
}

/// 按配置构建（LLM 后端由配置与环境变量决定）
pub fn build_orchestrator(cfg: &AppConfig) -> Result<Orchestrator, AgentError> {
    AgentBuilder::new(cfg.clone()).build()
}

//! 编排器端到端测试：scripted LLM 模拟分类 / 反思 / 摘要（快速模型）与回复生成（主模型）

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use airdesk::compose::ResponseComposer;
use airdesk::config::AppConfig;
use airdesk::core::{AgentError, Orchestrator, OrchestratorParts, RoutedTo, RoutingThresholds, ThresholdOverrides};
use airdesk::handlers::{register_default_handlers, AgentContext, HandlerDeps, HandlerRegistry, HandlerResponse};
use airdesk::intent::{format_conversation_context, ClassificationResult, Entity, IntentClassifier};
use airdesk::llm::{OraclePolicy, ScriptedLlmClient, StructuredOracle};
use airdesk::memory::{ContextManager, ConversationTurn, InMemoryStore, LlmSummarizer, MemoryStore};
use airdesk::prompts::PromptTemplates;
use airdesk::reflection::{ReflectionEvaluator, StepResult};
use airdesk::AgentBuilder;

fn classification(intent: &str, confidence: f64, rewritten: &str, entities: &[(&str, &str)]) -> String {
    let entities: Vec<_> = entities
        .iter()
        .map(|(t, v)| json!({ "type": t, "value": v }))
        .collect();
    json!({
        "intent": intent,
        "confidence": confidence,
        "reasoning": "test routing",
        "rewritten_prompt": rewritten,
        "entities": entities,
    })
    .to_string()
}

fn satisfied() -> String {
    json!({ "satisfied": true, "remaining_request": null, "reasoning": "all parts handled" }).to_string()
}

fn unsatisfied(remaining: &str) -> String {
    json!({ "satisfied": false, "remaining_request": remaining, "reasoning": "part still open" }).to_string()
}

struct Harness {
    orchestrator: Orchestrator,
    fast: Arc<ScriptedLlmClient>,
    main: Arc<ScriptedLlmClient>,
    store: Arc<InMemoryStore>,
}

fn harness(config: AppConfig) -> Harness {
    let fast = Arc::new(ScriptedLlmClient::default());
    let main = Arc::new(ScriptedLlmClient::default());
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = AgentBuilder::new(config)
        .with_llm(main.clone())
        .with_classifier_llm(fast.clone())
        .with_store(store.clone())
        .build()
        .unwrap();
    Harness {
        orchestrator,
        fast,
        main,
        store,
    }
}

fn default_harness() -> Harness {
    harness(AppConfig::default())
}

#[tokio::test]
async fn test_baggage_policy_single_step() {
    let h = default_harness();
    h.fast.push_reply(classification("baggage", 0.92, "What is the baggage policy?", &[]));
    h.fast.push_reply(satisfied());
    h.main.push_reply("You may bring one carry-on and one personal item.");

    let response = h
        .orchestrator
        .process_request("s1", "What is the baggage policy?", &AgentContext::default())
        .await
        .unwrap();

    assert_eq!(response.routed_to, RoutedTo::Handler("baggage".into()));
    assert_eq!(response.answer, "You may bring one carry-on and one personal item.");
    assert_eq!(response.confidence, 0.92);
    assert_eq!(h.orchestrator.registry().instantiation_count(), 1);

    let composer_prompt = &h.main.calls()[0][0].content;
    assert!(composer_prompt.contains("Carry-on allowance"));
    assert!(!composer_prompt.contains("Several tools were used"));

    let turns = h.store.get_turns("s1", 10).await;
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].intent, "baggage");
    assert!(turns[0].tool_reasoning.as_deref().unwrap().contains("General baggage policy"));
}

#[tokio::test]
async fn test_unroutable_input_falls_back_without_handler() {
    let h = default_harness();
    h.fast.push_reply(classification("faq", 0.1, "purple monkey dishwasher", &[]));

    let response = h
        .orchestrator
        .process_request("s1", "purple monkey dishwasher", &AgentContext::default())
        .await
        .unwrap();

    assert_eq!(response.routed_to, RoutedTo::Fallback);
    assert!(response.answer.contains("baggage (lost bags, claims, policies)"));
    assert!(response.answer.contains("0.10"));
    assert_eq!(h.orchestrator.registry().instantiation_count(), 0);
    assert_eq!(h.main.call_count(), 0);
    assert_eq!(h.store.get_turn_count("s1").await, 1);
}

#[tokio::test]
async fn test_threshold_boundaries() {
    let h = default_harness();
    h.fast.push_reply(classification("seat", 0.4, "Change my seat", &[]));
    let at_clarify = h
        .orchestrator
        .process_request("s1", "seat?", &AgentContext::default())
        .await
        .unwrap();
    assert_eq!(at_clarify.routed_to, RoutedTo::Clarification);
    assert!(at_clarify.answer.contains("seat"));
    assert_eq!(h.orchestrator.registry().instantiation_count(), 0);

    h.fast.push_reply(classification("seat", 0.3999, "Change my seat", &[]));
    let below_clarify = h
        .orchestrator
        .process_request("s2", "seat?", &AgentContext::default())
        .await
        .unwrap();
    assert_eq!(below_clarify.routed_to, RoutedTo::Fallback);

    h.fast.push_reply(classification("seat", 0.7, "I want a window seat", &[]));
    h.fast.push_reply(satisfied());
    h.main.push_reply("Seat 5A is yours.");
    let at_execute = h
        .orchestrator
        .process_request("s3", "window seat please", &AgentContext::default())
        .await
        .unwrap();
    assert_eq!(at_execute.routed_to, RoutedTo::Handler("seat".into()));
    assert_eq!(h.orchestrator.registry().instantiation_count(), 1);
}

#[tokio::test]
async fn test_per_request_threshold_override() {
    let h = default_harness();
    h.fast.push_reply(classification("faq", 0.75, "Can I bring my dog?", &[]));
    let response = h
        .orchestrator
        .process_request_with(
            "s1",
            "dog?",
            &AgentContext::default(),
            ThresholdOverrides {
                clarify: None,
                execute: Some(0.8),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.routed_to, RoutedTo::Clarification);

    let err = h
        .orchestrator
        .process_request_with(
            "s1",
            "dog?",
            &AgentContext::default(),
            ThresholdOverrides {
                clarify: Some(0.9),
                execute: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::InvalidThresholds { .. }));
}

#[tokio::test]
async fn test_runtime_threshold_update() {
    let h = default_harness();
    h.orchestrator
        .thresholds()
        .update(RoutingThresholds::new(0.2, 0.5).unwrap());
    h.fast.push_reply(classification("faq", 0.3, "wifi?", &[]));
    let response = h
        .orchestrator
        .process_request("s1", "wifi?", &AgentContext::default())
        .await
        .unwrap();
    assert_eq!(response.routed_to, RoutedTo::Clarification);
}

#[tokio::test]
async fn test_unregistered_intent_falls_back() {
    let h = default_harness();
    h.fast.push_reply(classification("hotel_booking", 0.95, "Book me a hotel", &[]));
    let response = h
        .orchestrator
        .process_request("s1", "Book me a hotel in Austin", &AgentContext::default())
        .await
        .unwrap();
    assert_eq!(response.routed_to, RoutedTo::Fallback);
    assert_eq!(h.orchestrator.registry().instantiation_count(), 0);
    assert_eq!(h.fast.call_count(), 1);
}

#[tokio::test]
async fn test_two_intent_bundle_combined_reply() {
    let h = default_harness();
    h.fast.push_reply(classification(
        "flight_status",
        0.9,
        "Check the status of flight PA441",
        &[("flight_number", "PA441")],
    ));
    h.fast.push_reply(unsatisfied("baggage claim"));
    h.fast.push_reply(classification("baggage", 0.88, "I lost my bag", &[]));
    h.fast.push_reply(satisfied());
    h.main.push_reply("Your flight is delayed and your bag claim is filed.");

    let response = h
        .orchestrator
        .process_request(
            "s1",
            "Check flight PA441 and I need to file a baggage claim",
            &AgentContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.routed_to, RoutedTo::Handler("flight_status".into()));
    assert_eq!(response.rewritten_input, "Check the status of flight PA441");
    assert_eq!(response.entities.len(), 1);
    assert_eq!(h.orchestrator.registry().instantiation_count(), 2);

    let fast_calls = h.fast.calls();
    assert_eq!(fast_calls.len(), 4);
    assert_eq!(fast_calls[2][1].content, "baggage claim");

    assert_eq!(h.main.call_count(), 1);
    let composer_prompt = &h.main.calls()[0][0].content;
    assert!(composer_prompt.contains("Several tools were used"));
    assert!(composer_prompt.contains("### Step 1: flight_status"));
    assert!(composer_prompt.contains("### Step 2: baggage"));

    let turns = h.store.get_turns("s1", 10).await;
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].intent, "flight_status");
    assert!(turns[0].tool_reasoning.as_deref().unwrap().contains("lost/missing bag"));
}

#[tokio::test]
async fn test_reclassification_reuses_session_snapshot() {
    let h = default_harness();
    let prior = ClassificationResult::new(
        "book_flight",
        0.82,
        "booking request",
        "Book a flight to Denver",
        vec![Entity::new("destination", "Denver").unwrap()],
    )
    .unwrap();
    h.store
        .save_turn(
            "s1",
            ConversationTurn::from_classification("Fly to Denver", "Booked.", &prior, None),
        )
        .await;
    h.store
        .save_summary("s1", "Customer asked about pet travel.".to_string())
        .await;

    let expected_context = format_conversation_context(
        &h.store.get_entities("s1").await,
        &h.store.get_summary("s1").await,
        &h.store.get_turns("s1", 3).await,
    );
    assert!(expected_context.contains("SESSION ENTITIES"));

    h.fast.push_reply(classification(
        "flight_status",
        0.9,
        "Check the status of flight PA441",
        &[("flight_number", "PA441")],
    ));
    h.fast.push_reply(unsatisfied("baggage claim"));
    h.fast.push_reply(classification("baggage", 0.88, "I lost my bag", &[]));
    h.fast.push_reply(satisfied());
    h.main.push_reply("Your flight is on time and your bag claim is filed.");

    let response = h
        .orchestrator
        .process_request(
            "s1",
            "Check flight PA441 and I need to file a baggage claim",
            &AgentContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(response.routed_to, RoutedTo::Handler("flight_status".into()));

    let fast_calls = h.fast.calls();
    assert_eq!(fast_calls.len(), 4);
    let first = &fast_calls[0][0].content;
    let reclassify = &fast_calls[2][0].content;
    assert_eq!(fast_calls[2][1].content, "baggage claim");
    for prompt in [first, reclassify] {
        assert!(prompt.contains(&expected_context));
        assert!(prompt.contains("- destination: Denver"));
        assert!(prompt.contains("[Turn 1] User: \"Fly to Denver\""));
        assert!(prompt.contains("Customer asked about pet travel."));
    }
    assert!(!reclassify.contains("[Turn 2]"));
}

#[tokio::test]
async fn test_reflection_loop_bounded_at_three_steps() {
    let h = default_harness();
    h.fast.push_reply(classification("faq", 0.9, "pets", &[]));
    h.fast.push_reply(unsatisfied("wifi"));
    h.fast.push_reply(classification("faq", 0.9, "wifi", &[]));
    h.fast.push_reply(unsatisfied("refunds"));
    h.fast.push_reply(classification("faq", 0.9, "refunds", &[]));
    h.fast.push_reply(unsatisfied("seats"));
    h.main.push_reply("Here is everything.");

    let response = h
        .orchestrator
        .process_request("s1", "pets, wifi, refunds and seats", &AgentContext::default())
        .await
        .unwrap();

    assert_eq!(response.routed_to, RoutedTo::Handler("faq".into()));
    assert_eq!(h.orchestrator.registry().instantiation_count(), 3);
    assert_eq!(h.fast.call_count(), 5);
    assert_eq!(h.fast.remaining(), 1);
}

#[tokio::test]
async fn test_validation_retry_once_then_success() {
    let h = default_harness();
    h.fast.push_reply(classification("faq", 1.7, "wifi", &[]));
    h.fast.push_reply(classification("faq", 0.2, "wifi", &[]));

    let response = h
        .orchestrator
        .process_request("s1", "wifi", &AgentContext::default())
        .await
        .unwrap();
    assert_eq!(response.routed_to, RoutedTo::Fallback);
    assert_eq!(h.fast.call_count(), 2);
    let calls = h.fast.calls();
    assert_eq!(calls[0], calls[1]);
}

#[tokio::test]
async fn test_validation_fails_twice_surfaces_error() {
    let h = default_harness();
    h.fast.push_reply("I think this is about bags");
    h.fast.push_reply(classification("", 0.9, "bags", &[]));

    let err = h
        .orchestrator
        .process_request("s1", "bags", &AgentContext::default())
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.orchestrator.registry().instantiation_count(), 0);
    assert_eq!(h.store.get_turn_count("s1").await, 0);

    h.fast.push_reply("nope");
    h.fast.push_reply("still nope");
    let response = h
        .orchestrator
        .handle("s1", "bags", &AgentContext::default(), ThresholdOverrides::default())
        .await;
    assert_eq!(response.routed_to, RoutedTo::Error);
    assert!(response.answer.contains("rephrase"));
}

#[tokio::test]
async fn test_window_overflow_folds_once() {
    let h = default_harness();
    for i in 0..4 {
        h.fast.push_reply(classification("faq", 0.1, &format!("question {i}"), &[]));
    }
    h.fast.push_reply("- Customer asked question 0");

    for i in 0..4 {
        h.orchestrator
            .process_request("s1", &format!("question {i}"), &AgentContext::default())
            .await
            .unwrap();
    }

    assert_eq!(h.store.get_turn_count("s1").await, 3);
    assert_eq!(h.store.get_summary("s1").await, "- Customer asked question 0");
    assert_eq!(h.fast.call_count(), 5);
    assert!(h.fast.calls()[4][0].content.contains("question 0"));
}

#[tokio::test]
async fn test_entities_last_write_wins_and_feed_next_classification() {
    let h = default_harness();
    h.fast.push_reply(classification("book_flight", 0.5, "Fly to Denver", &[("destination", "Denver")]));
    h.fast.push_reply(classification("book_flight", 0.5, "Fly to Austin", &[("destination", "Austin")]));
    h.fast.push_reply(classification("faq", 0.1, "hmm", &[]));

    for input in ["Fly to Denver", "Actually Austin", "hmm"] {
        h.orchestrator
            .process_request("s1", input, &AgentContext::default())
            .await
            .unwrap();
    }

    let entities = h.store.get_entities("s1").await;
    assert_eq!(entities.len(), 1);
    assert_eq!(entities["destination"], "Austin");

    let third_prompt = &h.fast.calls()[2][0].content;
    assert!(third_prompt.contains("- destination: Austin"));
    assert!(third_prompt.contains("[Turn 1] User: \"Fly to Denver\""));
}

#[tokio::test]
async fn test_bypass_skips_classification() {
    let h = default_harness();
    h.main.push_reply("Sure, pets are welcome!");
    let response = h.orchestrator.process_bypass("Can I bring my cat?").await.unwrap();
    assert_eq!(response.routed_to, RoutedTo::Bypass);
    assert_eq!(response.confidence, 0.0);
    assert_eq!(response.rewritten_input, "Can I bring my cat?");
    assert_eq!(h.fast.call_count(), 0);
    assert_eq!(h.store.session_count().await, 0);
}

/// 只统计调用次数的回复生成器
#[derive(Default)]
struct CountingComposer {
    single: AtomicUsize,
    combined: AtomicUsize,
}

#[async_trait]
impl ResponseComposer for CountingComposer {
    async fn generate(
        &self,
        _: &HandlerResponse,
        intent: &str,
        _: &str,
        _: &AgentContext,
    ) -> Result<String, AgentError> {
        self.single.fetch_add(1, Ordering::SeqCst);
        Ok(format!("single:{intent}"))
    }

    async fn generate_combined(
        &self,
        results: &[StepResult],
        _: &str,
        _: &AgentContext,
    ) -> Result<String, AgentError> {
        self.combined.fetch_add(1, Ordering::SeqCst);
        Ok(format!("combined:{}", results.len()))
    }
}

#[tokio::test]
async fn test_bundle_uses_generate_combined_exactly_once() {
    let fast = Arc::new(ScriptedLlmClient::default());
    let oracle = Arc::new(StructuredOracle::new(fast.clone(), OraclePolicy::default()));
    let templates = Arc::new(PromptTemplates::builtin());
    let composer = Arc::new(CountingComposer::default());

    let mut registry = HandlerRegistry::new();
    register_default_handlers(&mut registry).unwrap();
    let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
    let context = Arc::new(ContextManager::new(
        store,
        Arc::new(LlmSummarizer::new(oracle.clone(), templates.clone())),
        3,
    ));

    let orchestrator = Orchestrator::new(OrchestratorParts {
        registry: Arc::new(registry),
        deps: HandlerDeps::mock(),
        classifier: Arc::new(IntentClassifier::new(oracle.clone(), templates.clone())),
        reflector: Arc::new(ReflectionEvaluator::new(oracle.clone(), templates.clone())),
        composer: composer.clone(),
        context,
        bypass: oracle,
        templates,
        thresholds: RoutingThresholds::default(),
    });

    fast.push_reply(classification("flight_status", 0.9, "Status of PA441", &[]));
    fast.push_reply(unsatisfied("baggage claim"));
    fast.push_reply(classification("baggage", 0.9, "I lost my bag", &[]));
    fast.push_reply(satisfied());

    let response = orchestrator
        .process_request("s1", "check flight status and baggage claim", &AgentContext::default())
        .await
        .unwrap();

    assert_eq!(response.answer, "combined:2");
    assert_eq!(composer.combined.load(Ordering::SeqCst), 1);
    assert_eq!(composer.single.load(Ordering::SeqCst), 0);
}

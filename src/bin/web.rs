//! airdesk HTTP 前端
//!
//! 启动: cargo run --bin airdesk-web --features web
//! POST /chat 走完整路由（或 bypass），GET /health 健康检查，GET/PUT /thresholds 查看与调整路由阈值。

#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use airdesk::agent::build_orchestrator;
use airdesk::config::{load_config, AppConfig};
use airdesk::core::{AgentResponse, Orchestrator, RoutingThresholds, ThresholdOverrides};
use airdesk::handlers::AgentContext;

struct AppState {
    config: AppConfig,
    orchestrator: Orchestrator,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_key: Option<String>,
    #[serde(default)]
    customer_name: Option<String>,
    #[serde(default)]
    confirmation_number: Option<String>,
    #[serde(default)]
    flight_number: Option<String>,
    /// true 时跳过分类，直接自由生成
    #[serde(default)]
    bypass: bool,
    #[serde(default)]
    confidence_threshold_execute: Option<f64>,
    #[serde(default)]
    confidence_threshold_clarify: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    session_key: String,
    #[serde(flatten)]
    response: AgentResponse,
}

#[derive(Debug, Serialize, Deserialize)]
struct ThresholdsBody {
    clarify: f64,
    execute: f64,
}

impl From<RoutingThresholds> for ThresholdsBody {
    fn from(t: RoutingThresholds) -> Self {
        Self {
            clarify: t.clarify(),
            execute: t.execute(),
        }
    }
}

async fn api_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let session_key = req
        .session_key
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let response = if req.bypass {
        match state.orchestrator.process_bypass(message).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "bypass failed");
                AgentResponse::error(message, &e)
            }
        }
    } else {
        let context = AgentContext {
            customer_name: req
                .customer_name
                .clone()
                .unwrap_or_else(|| state.config.app.default_customer_name.clone()),
            confirmation_number: req.confirmation_number.clone(),
            flight_number: req.flight_number.clone(),
        };
        let overrides = ThresholdOverrides {
            clarify: req.confidence_threshold_clarify,
            execute: req.confidence_threshold_execute,
        };
        state
            .orchestrator
            .handle(&session_key, message, &context, overrides)
            .await
    };

    Ok(Json(ChatResponse {
        session_key,
        response,
    }))
}

async fn api_thresholds_get(State(state): State<Arc<AppState>>) -> Json<ThresholdsBody> {
    Json(state.orchestrator.thresholds().snapshot().into())
}

async fn api_thresholds_put(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ThresholdsBody>,
) -> Result<Json<ThresholdsBody>, (StatusCode, String)> {
    let thresholds = RoutingThresholds::new(body.clarify, body.execute)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    state.orchestrator.thresholds().update(thresholds);
    Ok(Json(thresholds.into()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    airdesk::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let orchestrator = build_orchestrator(&cfg).context("Failed to build orchestrator")?;
    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let ttl = cfg.session_ttl();

    let state = Arc::new(AppState {
        config: cfg,
        orchestrator,
    });

    let app = Router::new()
        .route("/chat", post(api_chat))
        .route("/health", get(|| async { "OK" }))
        .route("/thresholds", get(api_thresholds_get).put(api_thresholds_put))
        .with_state(Arc::clone(&state));

    // 定期清理空闲会话
    let eviction_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ttl.max(std::time::Duration::from_secs(60)) / 2);
        interval.tick().await;
        loop {
            interval.tick().await;
            let evicted = eviction_state.orchestrator.evict_idle(ttl).await;
            if evicted > 0 {
                tracing::info!(evicted, "idle sessions evicted");
            }
        }
    });

    tracing::info!("airdesk web: http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

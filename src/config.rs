//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AIRDESK__*` 覆盖（双下划线表示嵌套，如 `AIRDESK__ROUTING__EXECUTE_THRESHOLD=0.8`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::{AgentError, RoutingThresholds};
use crate::llm::OraclePolicy;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub routing: RoutingSection,
    pub memory: MemorySection,
    pub oracle: OracleSection,
    pub prompts: PromptsSection,
    pub server: ServerSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
    /// 请求未带客户名时使用
    #[serde(default = "default_customer_name")]
    pub default_customer_name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            default_customer_name: default_customer_name(),
        }
    }
}

fn default_app_name() -> String {
    "airdesk".to_string()
}

fn default_customer_name() -> String {
    "Guest".to_string()
}

/// [llm] 段：主模型负责回复生成与 bypass，classifier_model 负责分类、反思与摘要
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// openai / mock；openai 且无 OPENAI_API_KEY 时退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_classifier_model")]
    pub classifier_model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            classifier_model: default_classifier_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次 oracle 调用上限（秒），0 表示不限
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [routing] 段：置信度阈值
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSection {
    #[serde(default = "default_execute_threshold")]
    pub execute_threshold: f64,
    #[serde(default = "default_clarify_threshold")]
    pub clarify_threshold: f64,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            execute_threshold: default_execute_threshold(),
            clarify_threshold: default_clarify_threshold(),
        }
    }
}

fn default_execute_threshold() -> f64 {
    0.7
}

fn default_clarify_threshold() -> f64 {
    0.4
}

/// [memory] 段：最近轮次窗口与会话空闲过期
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_window_size() -> usize {
    3
}

fn default_session_ttl_secs() -> u64 {
    3600
}

/// [oracle] 段：结构化输出的重试策略
#[derive(Debug, Clone, Deserialize)]
pub struct OracleSection {
    /// 总尝试次数（2 = 一次重试）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub retry_backoff_ms: u64,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: 0,
        }
    }
}

fn default_max_attempts() -> u32 {
    2
}

/// [prompts] 段：可选的模板覆盖目录
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptsSection {
    pub dir: Option<PathBuf>,
}

/// [server] 段：airdesk-web 监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl AppConfig {
    pub fn thresholds(&self) -> Result<RoutingThresholds, AgentError> {
        RoutingThresholds::new(self.routing.clarify_threshold, self.routing.execute_threshold)
    }

    /// 窗口至少保留一轮
    pub fn window_size(&self) -> Result<usize, AgentError> {
        match self.memory.window_size {
            0 => Err(AgentError::Config("memory.window_size must be at least 1".to_string())),
            n => Ok(n),
        }
    }

    pub fn oracle_policy(&self) -> OraclePolicy {
        OraclePolicy {
            max_attempts: self.oracle.max_attempts,
            backoff: Duration::from_millis(self.oracle.retry_backoff_ms),
            timeout: (self.llm.timeouts.request > 0).then(|| Duration::from_secs(self.llm.timeouts.request)),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.memory.session_ttl_secs)
    }
}

/// 从 config 目录加载配置，环境变量 AIRDESK__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AIRDESK__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AIRDESK")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.memory.window_size, 3);
        assert_eq!(cfg.oracle.max_attempts, 2);
        let t = cfg.thresholds().unwrap();
        assert_eq!((t.clarify(), t.execute()), (0.4, 0.7));
        assert_eq!(cfg.oracle_policy().timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airdesk.toml");
        std::fs::write(
            &path,
            "[routing]\nexecute_threshold = 0.8\n\n[memory]\nwindow_size = 5\n\n[llm.timeouts]\nrequest = 0\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.routing.execute_threshold, 0.8);
        assert_eq!(cfg.routing.clarify_threshold, 0.4);
        assert_eq!(cfg.memory.window_size, 5);
        assert_eq!(cfg.oracle_policy().timeout, None);
    }

    #[test]
    fn test_invalid_threshold_pair() {
        let mut cfg = AppConfig::default();
        cfg.routing.clarify_threshold = 0.9;
        assert!(matches!(cfg.thresholds(), Err(AgentError::InvalidThresholds { .. })));
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.window_size().unwrap(), 3);
        cfg.memory.window_size = 0;
        assert!(matches!(cfg.window_size(), Err(AgentError::Config(_))));
    }
}

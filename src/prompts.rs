//! Prompt 模板
//!
//! 内置默认模板编译进二进制（prompts/*.txt），可用目录中的同名 `.txt` 覆盖。
//! `render(name, vars)` 替换 `{key}` 占位符；未提供的占位符原样保留。

use std::collections::HashMap;
use std::path::Path;

use crate::core::AgentError;

pub const INTENT_PROMPT: &str = "intent_prompt";
pub const REFLECTION_PROMPT: &str = "reflection_prompt";
pub const SUMMARIZE_CONVERSATION_PROMPT: &str = "summarize_conversation_prompt";
pub const RESPONSE_GENERATOR_PROMPT: &str = "response_generator_prompt";
pub const COMBINED_RESPONSE_PROMPT: &str = "combined_response_prompt";
pub const CLARIFICATION_MESSAGE: &str = "clarification_message";
pub const FALLBACK_MESSAGE: &str = "fallback_message";
pub const BYPASS_SYSTEM_PROMPT: &str = "bypass_system_prompt";

/// 无专属 `{intent}_nl_guidance` 时使用
pub const DEFAULT_NL_GUIDANCE: &str = "Provide a helpful, professional response based on the data provided.\nInclude all relevant information from the tool response.";

const BUILTIN: &[(&str, &str)] = &[
    (INTENT_PROMPT, include_str!("../prompts/intent_prompt.txt")),
    (REFLECTION_PROMPT, include_str!("../prompts/reflection_prompt.txt")),
    (
        SUMMARIZE_CONVERSATION_PROMPT,
        include_str!("../prompts/summarize_conversation_prompt.txt"),
    ),
    (
        RESPONSE_GENERATOR_PROMPT,
        include_str!("../prompts/response_generator_prompt.txt"),
    ),
    (
        COMBINED_RESPONSE_PROMPT,
        include_str!("../prompts/combined_response_prompt.txt"),
    ),
    (CLARIFICATION_MESSAGE, include_str!("../prompts/clarification_message.txt")),
    (FALLBACK_MESSAGE, include_str!("../prompts/fallback_message.txt")),
    (BYPASS_SYSTEM_PROMPT, include_str!("../prompts/bypass_system_prompt.txt")),
    (
        "baggage_nl_guidance",
        include_str!("../prompts/baggage_nl_guidance.txt"),
    ),
    (
        "flight_status_nl_guidance",
        include_str!("../prompts/flight_status_nl_guidance.txt"),
    ),
    (
        "compensation_nl_guidance",
        include_str!("../prompts/compensation_nl_guidance.txt"),
    ),
];

/// 模板集合：name → 文本
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<String, String>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptTemplates {
    pub fn builtin() -> Self {
        Self {
            templates: BUILTIN
                .iter()
                .map(|(name, text)| (name.to_string(), text.trim_end().to_string()))
                .collect(),
        }
    }

    /// 内置模板 + 目录覆盖（目录不存在时仅记录 warn）
    pub fn with_overrides(dir: &Path) -> Result<Self, AgentError> {
        let mut templates = Self::builtin();
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "prompt override directory not found, using built-in templates");
            return Ok(templates);
        }
        let entries = std::fs::read_dir(dir)
            .map_err(|e| AgentError::Config(format!("{}: {}", dir.display(), e)))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)
                .map_err(|e| AgentError::Config(format!("{}: {}", path.display(), e)))?;
            tracing::debug!(template = name, "prompt template overridden");
            templates.insert(name, text.trim_end());
        }
        Ok(templates)
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(name.into(), text.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String, AgentError> {
        let template = self
            .get(name)
            .ok_or_else(|| AgentError::TemplateMissing(name.to_string()))?;
        Ok(fill(template, vars))
    }

    /// `{intent}_nl_guidance`，缺失时回退到 DEFAULT_NL_GUIDANCE
    pub fn guidance(&self, intent: &str) -> &str {
        self.get(&format!("{}_nl_guidance", intent))
            .unwrap_or(DEFAULT_NL_GUIDANCE)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// 单遍替换 `{key}`：已填入的值不会再被展开，未知的花括号原样保留
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let found = after.find('}').and_then(|end| {
            let key = &after[..end];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (end, *value))
        });
        match found {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

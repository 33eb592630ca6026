//! 会话共享上下文（handler 只读）

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentContext {
    pub customer_name: String,
    pub confirmation_number: Option<String>,
    pub flight_number: Option<String>,
}

impl Default for AgentContext {
    fn default() -> Self {
        Self {
            customer_name: "Guest".to_string(),
            confirmation_number: None,
            flight_number: None,
        }
    }
}

impl AgentContext {
    pub fn for_customer(name: impl Into<String>) -> Self {
        Self {
            customer_name: name.into(),
            ..Self::default()
        }
    }
}

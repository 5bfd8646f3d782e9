use serde::{Deserialize, Serialize};

use crate::models::{AgentDescriptor, CoreError, CoreErrorKind, Role, Task};

pub type AgentResult<T> = Result<T, CoreError>;

/// A capability-tagged worker. `handle` runs on a blocking pool thread and may block.
pub trait Agent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;

    fn handle(&self, task: &Task) -> AgentResult<String>;
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Boundary to whatever produces completions; agents only see text in and text out.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> AgentResult<String>;
}

pub fn ensure_task_supported(descriptor: &AgentDescriptor, task: &Task) -> AgentResult<()> {
    if descriptor.supports(task.capability) {
        return Ok(());
    }

    Err(CoreError::new(
        CoreErrorKind::InvalidInput,
        format!(
            "agent '{}' does not support capability '{}'",
            descriptor.id,
            task.capability.as_str()
        ),
    )
    .with_agent(descriptor.id.clone())
    .with_capability(task.capability)
    .with_task(task.id))
}

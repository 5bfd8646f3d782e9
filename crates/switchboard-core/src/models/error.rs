use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AgentId, Capability, TaskId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreErrorKind {
    NoAgentAvailable,
    AgentExecution,
    DuplicateAgent,
    SessionClosed,
    StoreClosed,
    StorageFailure,
    UnknownSession,
    InvalidInput,
    Cancelled,
    Timeout,
    ShutDown,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub agent: Option<AgentId>,
    pub capability: Option<Capability>,
    pub task: Option<TaskId>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            agent: None,
            capability: None,
            task: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_agent(mut self, agent: AgentId) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn with_task(mut self, task: TaskId) -> Self {
        self.task = Some(task);
        self
    }

    /// Fills attribution fields the error does not carry yet.
    pub fn attributed(self, task: TaskId, capability: Capability, agent: Option<&AgentId>) -> Self {
        Self {
            agent: self.agent.or_else(|| agent.cloned()),
            capability: self.capability.or(Some(capability)),
            task: self.task.or(Some(task)),
            kind: self.kind,
            message: self.message,
        }
    }
}

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::models::{AgentId, Capability, CoreError};

/// Assigned from 1 upwards; `TaskId(0)` marks a request that was never recorded.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Dispatched,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatched => "dispatched",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "dispatched" => Ok(Self::Dispatched),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

/// Opaque key-value payload handed to the agent untouched.
pub type TaskContext = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub description: String,
    pub task_type: Capability,
    #[serde(default)]
    pub context: TaskContext,
}

impl TaskRequest {
    pub fn new(task_type: Capability, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            task_type,
            context: TaskContext::new(),
        }
    }

    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub capability: Capability,
    pub context: TaskContext,
    pub status: TaskStatus,
    pub agent: Option<AgentId>,
    pub created_at: SystemTime,
    pub dispatched_at: Option<SystemTime>,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
    pub execution_time: Option<Duration>,
    pub result: Option<String>,
    pub error: Option<CoreError>,
}

impl Task {
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(serde_json::Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<CoreError>,
    pub execution_time: Duration,
    pub agent: Option<AgentId>,
}

impl TaskResponse {
    pub fn rejected(error: CoreError) -> Self {
        Self {
            task_id: error.task.unwrap_or_default(),
            status: TaskStatus::Failed,
            result: None,
            error: Some(error),
            execution_time: Duration::ZERO,
            agent: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            result: task.result.clone(),
            error: task.error.clone(),
            execution_time: task.execution_time.unwrap_or(Duration::ZERO),
            agent: task.agent.clone(),
        }
    }
}

pub mod agent;
pub mod error;
pub mod memory;
pub mod session;
pub mod task;

pub use agent::{AgentDescriptor, AgentId, AgentSnapshot, Capability};
pub use error::{CoreError, CoreErrorKind};
pub use memory::{
    Importance, MemoryId, MemoryRecord, MemoryStats, MemoryType, NewMemory, ScoredMemory,
    normalize_tag,
};
pub use session::{Interaction, Role, Session, SessionId};
pub use task::{Task, TaskContext, TaskId, TaskRequest, TaskResponse, TaskStatus};

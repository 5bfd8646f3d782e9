use std::time::SystemTime;

use crate::models::{
    CoreError, Importance, Interaction, MemoryId, MemoryRecord, MemoryStats, NewMemory, Role,
    Session, SessionId, Task, TaskId,
};

pub type PersistenceResult<T> = Result<T, CoreError>;

pub trait MigrationStore: Send + Sync {
    fn current_version(&self) -> PersistenceResult<i64>;

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()>;
}

/// Which records a memory query covers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MemoryScope {
    /// Global records and every session's records.
    All,
    Session(SessionId),
}

pub trait MemoryLog: Send + Sync {
    /// Appends one record atomically; either the row and all of its tags land or nothing does.
    fn append_memory(&self, memory: &NewMemory, created_at: SystemTime)
    -> PersistenceResult<MemoryRecord>;

    /// Records in scope, oldest first (insertion order).
    fn list_memories(&self, scope: &MemoryScope) -> PersistenceResult<Vec<MemoryRecord>>;

    fn list_memories_with_tag(&self, tag: &str) -> PersistenceResult<Vec<MemoryRecord>>;

    fn recent_memories(&self, limit: usize) -> PersistenceResult<Vec<MemoryRecord>>;

    fn record_access(&self, ids: &[MemoryId]) -> PersistenceResult<()>;

    fn memory_stats(&self) -> PersistenceResult<MemoryStats>;

    /// Deletes records created before `cutoff` whose importance is below `keep_from`.
    fn prune_memories(&self, cutoff: SystemTime, keep_from: Importance)
    -> PersistenceResult<usize>;

    /// Flushes buffered writes to the main database file.
    fn checkpoint(&self) -> PersistenceResult<()>;
}

pub trait SessionLog: Send + Sync {
    fn create_session(&self, session: &Session) -> PersistenceResult<()>;

    /// Appends to an open session and returns the stored interaction.
    fn append_interaction(
        &self,
        session_id: &SessionId,
        role: Role,
        content: &str,
        timestamp: SystemTime,
    ) -> PersistenceResult<Interaction>;

    fn seal_session(
        &self,
        session_id: &SessionId,
        summary: &str,
        ended_at: SystemTime,
    ) -> PersistenceResult<Session>;

    fn load_session(&self, session_id: &SessionId) -> PersistenceResult<Option<Session>>;

    /// Open sessions without their interaction logs.
    fn list_open_sessions(&self) -> PersistenceResult<Vec<Session>>;
}

/// Everything the memory store needs from one backend.
pub trait MemoryBackend: MemoryLog + SessionLog {}

impl<T: MemoryLog + SessionLog> MemoryBackend for T {}

pub trait TaskStore: Send + Sync {
    fn save_task(&self, task: &Task) -> PersistenceResult<()>;

    fn list_recent_tasks(&self, limit: usize) -> PersistenceResult<Vec<Task>>;

    fn next_task_id(&self) -> PersistenceResult<u64>;
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::MemoryConfig;
use crate::memory::MemoryResult;
use crate::models::{
    CoreError, CoreErrorKind, Importance, Interaction, MemoryId, MemoryRecord, MemoryStats,
    NewMemory, Role, Session, SessionId, normalize_tag,
};
use crate::persistence::{MemoryBackend, MemoryScope};
use crate::sqlite::SqliteStore;

/// Memories at or above this grade survive `prune`.
pub const PRUNE_KEEP_FROM: Importance = Importance::High;

/// Key for per-scope write serialization; global records share one lock.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
enum WriteScope {
    Global,
    Session(SessionId),
}

impl WriteScope {
    fn of(session_id: Option<&SessionId>) -> Self {
        match session_id {
            Some(id) => Self::Session(id.clone()),
            None => Self::Global,
        }
    }
}

/// Durable graded memory plus the session log it is scoped by.
///
/// Writes into one session are serialized; writes into different sessions take different
/// locks and only meet inside SQLite. SQLite admits one writer at a time, so a write into one
/// session can still wait out another session's transaction (up to the busy timeout), but
/// never a caller-level lock. After `close` every operation returns `StoreClosed`.
pub struct MemoryStore {
    config: MemoryConfig,
    backend: RwLock<Option<Arc<dyn MemoryBackend>>>,
    write_locks: Mutex<HashMap<WriteScope, Arc<Mutex<()>>>>,
}

impl MemoryStore {
    /// Opens (creating if needed) the SQLite database named by the config and migrates it.
    pub fn open(config: MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;
        let sqlite = SqliteStore::new(config.database_path.clone());
        sqlite.migrate_to_latest()?;
        tracing::info!(path = %config.database_path.display(), "memory store opened");
        Ok(Self::with_log(Arc::new(sqlite), config))
    }

    pub fn with_log(backend: Arc<dyn MemoryBackend>, config: MemoryConfig) -> Self {
        Self {
            config,
            backend: RwLock::new(Some(backend)),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.backend.read().map(|slot| slot.is_none()).unwrap_or(true)
    }

    pub fn add_memory(&self, mut memory: NewMemory) -> MemoryResult<MemoryRecord> {
        if memory.content.trim().is_empty() {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "memory content must not be empty",
            ));
        }
        memory.tags = memory
            .tags
            .iter()
            .filter_map(|tag| normalize_tag(tag))
            .collect();

        let backend = self.backend()?;
        let scope = WriteScope::of(memory.session_id.as_ref());
        let stored = self.with_write_scope(scope, || {
            backend.append_memory(&memory, SystemTime::now())
        });

        match stored {
            Ok(record) => {
                tracing::debug!(
                    memory_id = record.id.0,
                    session = record.session_id.as_ref().map(SessionId::as_str),
                    importance = ?record.importance,
                    "stored memory"
                );
                Ok(record)
            }
            Err(error) => {
                tracing::warn!(
                    kind = ?error.kind,
                    message = %error.message,
                    "failed to store memory"
                );
                Err(error)
            }
        }
    }

    pub fn memories(&self, scope: &MemoryScope) -> MemoryResult<Vec<MemoryRecord>> {
        self.backend()?.list_memories(scope)
    }

    pub fn memories_for_session(
        &self,
        session_id: &SessionId,
    ) -> MemoryResult<Vec<MemoryRecord>> {
        self.memories(&MemoryScope::Session(session_id.clone()))
    }

    pub fn memories_with_tag(&self, tag: &str) -> MemoryResult<Vec<MemoryRecord>> {
        let Some(tag) = normalize_tag(tag) else {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "tag must not be blank",
            ));
        };
        self.backend()?.list_memories_with_tag(&tag)
    }

    /// Newest first: by creation time, then by insertion order.
    pub fn recent_memories(&self, limit: usize) -> MemoryResult<Vec<MemoryRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.backend()?.recent_memories(limit)
    }

    pub fn stats(&self) -> MemoryResult<MemoryStats> {
        self.backend()?.memory_stats()
    }

    /// Deletes `Low` and `Medium` memories older than `older_than`; returns how many went.
    pub fn prune(&self, older_than: Duration) -> MemoryResult<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(UNIX_EPOCH);
        let removed = self.backend()?.prune_memories(cutoff, PRUNE_KEEP_FROM)?;
        tracing::info!(removed, "pruned memories");
        Ok(removed)
    }

    /// Flushes the write-ahead log and drops the backend handle.
    pub fn close(&self) -> MemoryResult<()> {
        let backend = self
            .backend
            .write()
            .map_err(|_| poisoned("memory store handle"))?
            .take()
            .ok_or_else(store_closed)?;
        backend.checkpoint()?;
        tracing::info!(path = %self.config.database_path.display(), "memory store closed");
        Ok(())
    }

    pub(crate) fn record_access(&self, ids: &[MemoryId]) -> MemoryResult<()> {
        self.backend()?.record_access(ids)
    }

    pub(crate) fn create_session(&self, session: &Session) -> MemoryResult<()> {
        self.backend()?.create_session(session)
    }

    pub(crate) fn append_interaction(
        &self,
        session_id: &SessionId,
        role: Role,
        content: &str,
    ) -> MemoryResult<Interaction> {
        let backend = self.backend()?;
        self.with_write_scope(WriteScope::Session(session_id.clone()), || {
            backend.append_interaction(session_id, role, content, SystemTime::now())
        })
    }

    pub(crate) fn seal_session(
        &self,
        session_id: &SessionId,
        summary: &str,
    ) -> MemoryResult<Session> {
        let backend = self.backend()?;
        self.with_write_scope(WriteScope::Session(session_id.clone()), || {
            backend.seal_session(session_id, summary, SystemTime::now())
        })
    }

    pub(crate) fn load_session(&self, session_id: &SessionId) -> MemoryResult<Option<Session>> {
        self.backend()?.load_session(session_id)
    }

    pub(crate) fn open_sessions(&self) -> MemoryResult<Vec<Session>> {
        self.backend()?.list_open_sessions()
    }

    fn backend(&self) -> MemoryResult<Arc<dyn MemoryBackend>> {
        self.backend
            .read()
            .map_err(|_| poisoned("memory store handle"))?
            .clone()
            .ok_or_else(store_closed)
    }

    /// Runs `write` holding the scope's lock. The table entry is dropped again once no other
    /// writer holds or waits on it, so the table only ever holds scopes with writes in flight.
    fn with_write_scope<T>(
        &self,
        scope: WriteScope,
        write: impl FnOnce() -> MemoryResult<T>,
    ) -> MemoryResult<T> {
        let lock = self.write_lock(&scope)?;
        let result = {
            let _guard = lock_scope(&lock)?;
            write()
        };
        self.release_write_lock(&scope, lock);
        result
    }

    fn write_lock(&self, scope: &WriteScope) -> MemoryResult<Arc<Mutex<()>>> {
        let mut locks = self
            .write_locks
            .lock()
            .map_err(|_| poisoned("memory write lock table"))?;
        Ok(locks.entry(scope.clone()).or_default().clone())
    }

    fn release_write_lock(&self, scope: &WriteScope, lock: Arc<Mutex<()>>) {
        let Ok(mut locks) = self.write_locks.lock() else {
            return;
        };
        // New clones are only handed out under the table lock: two references means the
        // table's and ours.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(scope);
        }
    }
}

fn lock_scope(lock: &Mutex<()>) -> MemoryResult<MutexGuard<'_, ()>> {
    lock.lock().map_err(|_| poisoned("memory scope lock"))
}

fn poisoned(what: &str) -> CoreError {
    CoreError::new(CoreErrorKind::Internal, format!("{what} poisoned"))
}

fn store_closed() -> CoreError {
    CoreError::new(CoreErrorKind::StoreClosed, "memory store is closed")
}

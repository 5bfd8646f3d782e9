use std::sync::Arc;
use std::time::SystemTime;

use crate::memory::{MemoryResult, MemoryStore};
use crate::models::{
    CoreError, CoreErrorKind, Importance, Interaction, MemoryRecord, MemoryType, NewMemory, Role,
    Session, SessionId,
};

/// Starts, resumes and seals sessions. State lives in the memory store, so any number of
/// managers over one store see the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<MemoryStore>,
}

/// Context for one open session. Cheap to clone and safe to use from several threads.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    user_id: String,
    store: Arc<MemoryStore>,
}

impl SessionManager {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn start_session(&self, user_id: impl Into<String>) -> MemoryResult<SessionHandle> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "user id must not be empty",
            ));
        }

        let session = Session {
            id: SessionId::generate(),
            user_id: user_id.clone(),
            started_at: SystemTime::now(),
            ended_at: None,
            summary: None,
            interactions: Vec::new(),
        };
        self.store.create_session(&session)?;
        tracing::info!(session = %session.id, user = %user_id, "session started");

        Ok(SessionHandle {
            id: session.id,
            user_id,
            store: self.store.clone(),
        })
    }

    /// Handle for a session that is still open, e.g. after a restart.
    pub fn resume(&self, session_id: &SessionId) -> MemoryResult<SessionHandle> {
        let session = self.session(session_id)?;
        if !session.is_open() {
            return Err(session_closed(session_id));
        }
        Ok(SessionHandle {
            id: session.id,
            user_id: session.user_id,
            store: self.store.clone(),
        })
    }

    pub fn add_interaction(
        &self,
        session_id: &SessionId,
        role: Role,
        content: &str,
    ) -> MemoryResult<Interaction> {
        add_interaction(&self.store, session_id, role, content)
    }

    pub fn end_session(&self, session_id: &SessionId, summary: &str) -> MemoryResult<Session> {
        end_session(&self.store, session_id, summary)
    }

    /// The session with its full interaction log.
    pub fn session(&self, session_id: &SessionId) -> MemoryResult<Session> {
        self.store
            .load_session(session_id)?
            .ok_or_else(|| unknown_session(session_id))
    }

    /// Open sessions, oldest first, without interaction logs.
    pub fn active_sessions(&self) -> MemoryResult<Vec<Session>> {
        self.store.open_sessions()
    }
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn add_interaction(&self, role: Role, content: &str) -> MemoryResult<Interaction> {
        add_interaction(&self.store, &self.id, role, content)
    }

    pub fn end_session(&self, summary: &str) -> MemoryResult<Session> {
        end_session(&self.store, &self.id, summary)
    }

    pub fn remember<I, S>(
        &self,
        content: impl Into<String>,
        memory_type: MemoryType,
        importance: Importance,
        tags: I,
    ) -> MemoryResult<MemoryRecord>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.store.add_memory(
            NewMemory::new(content, memory_type, importance)
                .with_tags(tags)
                .in_session(self.id.clone()),
        )
    }

    pub fn session(&self) -> MemoryResult<Session> {
        self.store
            .load_session(&self.id)?
            .ok_or_else(|| unknown_session(&self.id))
    }
}

fn add_interaction(
    store: &MemoryStore,
    session_id: &SessionId,
    role: Role,
    content: &str,
) -> MemoryResult<Interaction> {
    if content.trim().is_empty() {
        return Err(CoreError::new(
            CoreErrorKind::InvalidInput,
            "interaction content must not be empty",
        ));
    }
    store.append_interaction(session_id, role, content)
}

fn end_session(
    store: &MemoryStore,
    session_id: &SessionId,
    summary: &str,
) -> MemoryResult<Session> {
    let session = store.seal_session(session_id, summary)?;
    tracing::info!(
        session = %session_id,
        interactions = session.interactions.len(),
        "session ended"
    );
    Ok(session)
}

fn unknown_session(session_id: &SessionId) -> CoreError {
    CoreError::new(
        CoreErrorKind::UnknownSession,
        format!("session '{session_id}' does not exist"),
    )
}

fn session_closed(session_id: &SessionId) -> CoreError {
    CoreError::new(
        CoreErrorKind::SessionClosed,
        format!("session '{session_id}' has ended"),
    )
}

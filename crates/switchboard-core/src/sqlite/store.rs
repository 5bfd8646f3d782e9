use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{
    Connection, OptionalExtension, Params, Row, Transaction, TransactionBehavior, params,
};

use crate::models::{
    AgentId, Capability, CoreError, CoreErrorKind, Importance, Interaction, MemoryId,
    MemoryRecord, MemoryStats, MemoryType, NewMemory, Role, Session, SessionId, Task, TaskContext,
    TaskId, TaskStatus,
};
use crate::persistence::{
    MemoryLog, MemoryScope, MigrationStore, PersistenceResult, SessionLog, TaskStore,
};
use crate::sqlite::migrations::{SqliteMigration, current_schema_version, migration, migrations};

const MIGRATIONS_TABLE: &str = "switchboard_schema_migrations";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MEMORY_COLUMNS: &str = "memory_id, session_id, content, memory_type, importance, \
                              created_at_unix_ms, access_count";
const SESSION_COLUMNS: &str =
    "session_id, user_id, started_at_unix_ms, ended_at_unix_ms, summary";
const TASK_COLUMNS: &str = "task_id, capability, description, context_json, status, agent_id, \
                            created_at_unix_ms, dispatched_at_unix_ms, started_at_unix_ms, \
                            finished_at_unix_ms, execution_time_ms, result, error_json";

/// SQLite-backed persistence. Every operation opens its own connection, so one store can be
/// shared freely across threads; WAL mode lets readers proceed while a writer commits.
pub struct SqliteStore {
    database_path: PathBuf,
}

impl SqliteStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn planned_migrations(&self, from_version: i64) -> Vec<&'static SqliteMigration> {
        migrations()
            .iter()
            .filter(|entry| entry.version > from_version)
            .collect()
    }

    pub fn migrate_to_latest(&self) -> PersistenceResult<()> {
        self.apply_migration(current_schema_version())
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let mut connection = open_connection(&self.database_path)
            .map_err(|error| storage_error(operation_name, error))?;
        operation(&mut connection).map_err(|error| storage_error(operation_name, error))
    }

    /// Like `with_connection`, for operations that can also fail with a domain error.
    fn with_checked_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<PersistenceResult<T>>,
    ) -> PersistenceResult<T> {
        self.with_connection(operation_name, operation)?
    }
}

impl MigrationStore for SqliteStore {
    fn current_version(&self) -> PersistenceResult<i64> {
        self.with_connection("current_version", |connection| {
            ensure_migrations_table(connection)?;
            read_current_version(connection)
        })
    }

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()> {
        if target_version < 0 || target_version > current_schema_version() {
            return Err(storage_error_text(
                "apply_migration",
                format!("invalid migration target version '{target_version}'"),
            ));
        }

        if target_version > 0 && migration(target_version).is_none() {
            return Err(storage_error_text(
                "apply_migration",
                format!("migration version '{target_version}' is not defined"),
            ));
        }

        self.with_connection("apply_migration", |connection| {
            ensure_migrations_table(connection)?;
            let current_version = read_current_version(connection)?;

            if target_version == current_version {
                // Tables may be missing even though the version row exists; all DDL is
                // IF NOT EXISTS so replaying it is harmless.
                for version in 1..=target_version {
                    connection.execute_batch(defined_migration(version)?.up_sql)?;
                }
                return Ok(());
            }

            if target_version > current_version {
                for version in (current_version + 1)..=target_version {
                    apply_up_migration(connection, defined_migration(version)?)?;
                }
            } else {
                for version in ((target_version + 1)..=current_version).rev() {
                    apply_down_migration(connection, defined_migration(version)?)?;
                }
            }

            Ok(())
        })
    }
}

impl MemoryLog for SqliteStore {
    fn append_memory(
        &self,
        memory: &NewMemory,
        created_at: SystemTime,
    ) -> PersistenceResult<MemoryRecord> {
        self.with_checked_connection("append_memory", |connection| {
            ensure_schema_ready(connection)?;
            let created_at_ms = to_unix_millis(created_at)?;
            let transaction = write_transaction(connection)?;

            if let Some(session_id) = &memory.session_id
                && let Err(error) = check_session_open(&transaction, session_id)?
            {
                return Ok(Err(error));
            }

            transaction.execute(
                "
INSERT INTO memory_records (
    session_id, content, memory_type, importance, created_at_unix_ms, access_count
) VALUES (?1, ?2, ?3, ?4, ?5, 0)
",
                params![
                    memory.session_id.as_ref().map(SessionId::as_str),
                    memory.content.as_str(),
                    memory.memory_type.as_str(),
                    memory.importance.level(),
                    created_at_ms,
                ],
            )?;
            let memory_id = transaction.last_insert_rowid();

            {
                let mut statement = transaction
                    .prepare("INSERT INTO memory_tags (memory_id, tag) VALUES (?1, ?2)")?;
                for tag in &memory.tags {
                    statement.execute(params![memory_id, tag.as_str()])?;
                }
            }
            transaction.commit()?;

            Ok(Ok(MemoryRecord {
                id: MemoryId(i64_to_u64(memory_id)?),
                session_id: memory.session_id.clone(),
                content: memory.content.clone(),
                memory_type: memory.memory_type,
                importance: memory.importance,
                tags: memory.tags.clone(),
                created_at: from_unix_millis(created_at_ms)?,
                access_count: 0,
            }))
        })
    }

    fn list_memories(&self, scope: &MemoryScope) -> PersistenceResult<Vec<MemoryRecord>> {
        self.with_connection("list_memories", |connection| {
            ensure_schema_ready(connection)?;
            match scope {
                MemoryScope::All => query_memories(connection, "ORDER BY memory_id", []),
                MemoryScope::Session(session_id) => query_memories(
                    connection,
                    "WHERE session_id = ?1 ORDER BY memory_id",
                    [session_id.as_str()],
                ),
            }
        })
    }

    fn list_memories_with_tag(&self, tag: &str) -> PersistenceResult<Vec<MemoryRecord>> {
        self.with_connection("list_memories_with_tag", |connection| {
            ensure_schema_ready(connection)?;
            query_memories(
                connection,
                "WHERE memory_id IN (SELECT memory_id FROM memory_tags WHERE tag = ?1)
                 ORDER BY memory_id",
                [tag],
            )
        })
    }

    fn recent_memories(&self, limit: usize) -> PersistenceResult<Vec<MemoryRecord>> {
        self.with_connection("recent_memories", |connection| {
            ensure_schema_ready(connection)?;
            query_memories(
                connection,
                "ORDER BY created_at_unix_ms DESC, memory_id DESC LIMIT ?1",
                [to_i64(limit)?],
            )
        })
    }

    fn record_access(&self, ids: &[MemoryId]) -> PersistenceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.with_connection("record_access", |connection| {
            ensure_schema_ready(connection)?;
            let transaction = write_transaction(connection)?;
            {
                let mut statement = transaction.prepare(
                    "UPDATE memory_records SET access_count = access_count + 1 \
                     WHERE memory_id = ?1",
                )?;
                for id in ids {
                    statement.execute([memory_id_to_i64(*id)?])?;
                }
            }
            transaction.commit()
        })
    }

    fn memory_stats(&self) -> PersistenceResult<MemoryStats> {
        self.with_connection("memory_stats", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(
                "
SELECT memory_type, importance, COUNT(*)
FROM memory_records
GROUP BY memory_type, importance
",
            )?;
            let rows = statement.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;

            let mut stats = MemoryStats::default();
            for row in rows {
                let (memory_type, importance, count) = row?;
                let count = usize::try_from(count)
                    .map_err(|_| storage_error_sqlite("negative count in memory stats"))?;
                stats.total += count;
                *stats
                    .by_type
                    .entry(parse_memory_type(&memory_type)?)
                    .or_default() += count;
                *stats
                    .by_importance
                    .entry(parse_importance(importance)?)
                    .or_default() += count;
            }
            Ok(stats)
        })
    }

    fn prune_memories(
        &self,
        cutoff: SystemTime,
        keep_from: Importance,
    ) -> PersistenceResult<usize> {
        self.with_connection("prune_memories", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(
                "DELETE FROM memory_records WHERE created_at_unix_ms < ?1 AND importance < ?2",
                params![to_unix_millis(cutoff)?, keep_from.level()],
            )
        })
    }

    fn checkpoint(&self) -> PersistenceResult<()> {
        self.with_connection("checkpoint", |connection| {
            connection.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
        })
    }
}

impl SessionLog for SqliteStore {
    fn create_session(&self, session: &Session) -> PersistenceResult<()> {
        self.with_connection("create_session", |connection| {
            ensure_schema_ready(connection)?;
            let ended_at = session.ended_at.map(to_unix_millis).transpose()?;
            connection.execute(
                "
INSERT INTO sessions (session_id, user_id, started_at_unix_ms, ended_at_unix_ms, summary)
VALUES (?1, ?2, ?3, ?4, ?5)
",
                params![
                    session.id.as_str(),
                    session.user_id.as_str(),
                    to_unix_millis(session.started_at)?,
                    ended_at,
                    session.summary.as_deref(),
                ],
            )?;
            Ok(())
        })
    }

    fn append_interaction(
        &self,
        session_id: &SessionId,
        role: Role,
        content: &str,
        timestamp: SystemTime,
    ) -> PersistenceResult<Interaction> {
        self.with_checked_connection("append_interaction", |connection| {
            ensure_schema_ready(connection)?;
            let timestamp_ms = to_unix_millis(timestamp)?;
            let transaction = write_transaction(connection)?;
            if let Err(error) = check_session_open(&transaction, session_id)? {
                return Ok(Err(error));
            }

            let sequence: i64 = transaction.query_row(
                "SELECT COALESCE(MAX(sequence), 0) + 1 FROM session_interactions \
                 WHERE session_id = ?1",
                [session_id.as_str()],
                |row| row.get(0),
            )?;
            transaction.execute(
                "
INSERT INTO session_interactions (session_id, sequence, role, content, created_at_unix_ms)
VALUES (?1, ?2, ?3, ?4, ?5)
",
                params![
                    session_id.as_str(),
                    sequence,
                    role.as_str(),
                    content,
                    timestamp_ms
                ],
            )?;
            transaction.commit()?;

            Ok(Ok(Interaction {
                sequence: i64_to_u64(sequence)?,
                role,
                content: content.to_string(),
                timestamp: from_unix_millis(timestamp_ms)?,
            }))
        })
    }

    fn seal_session(
        &self,
        session_id: &SessionId,
        summary: &str,
        ended_at: SystemTime,
    ) -> PersistenceResult<Session> {
        self.with_checked_connection("seal_session", |connection| {
            ensure_schema_ready(connection)?;
            let transaction = write_transaction(connection)?;
            if let Err(error) = check_session_open(&transaction, session_id)? {
                return Ok(Err(error));
            }

            transaction.execute(
                "UPDATE sessions SET ended_at_unix_ms = ?2, summary = ?3 WHERE session_id = ?1",
                params![session_id.as_str(), to_unix_millis(ended_at)?, summary],
            )?;
            let session = read_session(&transaction, session_id)?;
            transaction.commit()?;

            Ok(session.ok_or_else(|| unknown_session(session_id)))
        })
    }

    fn load_session(&self, session_id: &SessionId) -> PersistenceResult<Option<Session>> {
        self.with_connection("load_session", |connection| {
            ensure_schema_ready(connection)?;
            read_session(connection, session_id)
        })
    }

    fn list_open_sessions(&self) -> PersistenceResult<Vec<Session>> {
        self.with_connection("list_open_sessions", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE ended_at_unix_ms IS NULL
                 ORDER BY started_at_unix_ms, session_id"
            ))?;
            let sessions = statement
                .query_map([], read_session_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sessions)
        })
    }
}

impl TaskStore for SqliteStore {
    fn save_task(&self, task: &Task) -> PersistenceResult<()> {
        self.with_connection("save_task", |connection| {
            ensure_schema_ready(connection)?;
            let context_json = serde_json::to_string(&task.context)
                .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
            let error_json = task
                .error
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
            let execution_time_ms = task
                .execution_time
                .map(|elapsed| {
                    i64::try_from(elapsed.as_millis())
                        .map_err(|_| storage_error_sqlite("execution time exceeds i64 range"))
                })
                .transpose()?;

            connection.execute(
                "
INSERT INTO task_records (
    task_id, capability, description, context_json, status, agent_id,
    created_at_unix_ms, dispatched_at_unix_ms, started_at_unix_ms, finished_at_unix_ms,
    execution_time_ms, result, error_json
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
ON CONFLICT(task_id) DO UPDATE SET
    status = excluded.status,
    agent_id = excluded.agent_id,
    dispatched_at_unix_ms = excluded.dispatched_at_unix_ms,
    started_at_unix_ms = excluded.started_at_unix_ms,
    finished_at_unix_ms = excluded.finished_at_unix_ms,
    execution_time_ms = excluded.execution_time_ms,
    result = excluded.result,
    error_json = excluded.error_json
",
                params![
                    task_id_to_i64(task.id)?,
                    task.capability.as_str(),
                    task.description.as_str(),
                    context_json,
                    task.status.as_str(),
                    task.agent.as_ref().map(AgentId::as_str),
                    to_unix_millis(task.created_at)?,
                    task.dispatched_at.map(to_unix_millis).transpose()?,
                    task.started_at.map(to_unix_millis).transpose()?,
                    task.finished_at.map(to_unix_millis).transpose()?,
                    execution_time_ms,
                    task.result.as_deref(),
                    error_json,
                ],
            )?;
            Ok(())
        })
    }

    fn list_recent_tasks(&self, limit: usize) -> PersistenceResult<Vec<Task>> {
        self.with_connection("list_recent_tasks", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM task_records ORDER BY task_id DESC LIMIT ?1"
            ))?;
            let tasks = statement
                .query_map([to_i64(limit)?], read_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    fn next_task_id(&self) -> PersistenceResult<u64> {
        self.with_connection("next_task_id", |connection| {
            ensure_schema_ready(connection)?;
            let next: i64 = connection.query_row(
                "SELECT COALESCE(MAX(task_id), 0) + 1 FROM task_records",
                [],
                |row| row.get(0),
            )?;
            i64_to_u64(next)
        })
    }
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
    }
    let connection = Connection::open(database_path)?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    })?;
    connection.pragma_update(None, "foreign_keys", true)?;
    Ok(connection)
}

fn ensure_migrations_table(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(
        "
CREATE TABLE IF NOT EXISTS switchboard_schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at_unix INTEGER NOT NULL
);
",
    )?;
    Ok(())
}

fn ensure_schema_ready(connection: &Connection) -> rusqlite::Result<()> {
    ensure_migrations_table(connection)?;
    let version = read_current_version(connection)?;
    if version < current_schema_version() {
        return Err(storage_error_sqlite(
            "database schema is not up to date; apply migrations before using the store",
        ));
    }
    Ok(())
}

fn read_current_version(connection: &Connection) -> rusqlite::Result<i64> {
    connection.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    )
}

fn defined_migration(version: i64) -> rusqlite::Result<&'static SqliteMigration> {
    migration(version).ok_or_else(|| {
        storage_error_sqlite(&format!("migration version '{version}' is not defined"))
    })
}

fn apply_up_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = write_transaction(connection)?;
    transaction.execute_batch(migration.up_sql)?;
    transaction.execute(
        &format!(
            "INSERT INTO {MIGRATIONS_TABLE} (version, name, applied_at_unix)
             VALUES (?1, ?2, strftime('%s', 'now'))"
        ),
        (migration.version, migration.name),
    )?;
    transaction.commit()?;
    Ok(())
}

fn apply_down_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = write_transaction(connection)?;
    transaction.execute_batch(migration.down_sql)?;
    transaction.execute(
        &format!("DELETE FROM {MIGRATIONS_TABLE} WHERE version = ?1"),
        [migration.version],
    )?;
    transaction.commit()?;
    Ok(())
}

/// Takes the write lock up front so the busy timeout covers lock contention.
fn write_transaction(connection: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    connection.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Inner `Err` carries `UnknownSession` or `SessionClosed`.
fn check_session_open(
    connection: &Connection,
    session_id: &SessionId,
) -> rusqlite::Result<PersistenceResult<()>> {
    let open: Option<bool> = connection
        .query_row(
            "SELECT ended_at_unix_ms IS NULL FROM sessions WHERE session_id = ?1",
            [session_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match open {
        None => Err(unknown_session(session_id)),
        Some(false) => Err(CoreError::new(
            CoreErrorKind::SessionClosed,
            format!("session '{session_id}' has ended"),
        )),
        Some(true) => Ok(()),
    })
}

fn unknown_session(session_id: &SessionId) -> CoreError {
    CoreError::new(
        CoreErrorKind::UnknownSession,
        format!("session '{session_id}' does not exist"),
    )
}

fn query_memories<P: Params>(
    connection: &Connection,
    filter_sql: &str,
    params: P,
) -> rusqlite::Result<Vec<MemoryRecord>> {
    let mut statement =
        connection.prepare(&format!("SELECT {MEMORY_COLUMNS} FROM memory_records {filter_sql}"))?;
    let mut records = statement
        .query_map(params, read_memory_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut tags =
        connection.prepare("SELECT tag FROM memory_tags WHERE memory_id = ?1 ORDER BY tag")?;
    for record in &mut records {
        record.tags = tags
            .query_map([memory_id_to_i64(record.id)?], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<_>>()?;
    }
    Ok(records)
}

fn read_memory_row(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let session_id: Option<String> = row.get(1)?;
    let memory_type: String = row.get(3)?;
    Ok(MemoryRecord {
        id: MemoryId(i64_to_u64(row.get(0)?)?),
        session_id: session_id.map(SessionId),
        content: row.get(2)?,
        memory_type: parse_memory_type(&memory_type)?,
        importance: parse_importance(row.get(4)?)?,
        tags: Default::default(),
        created_at: from_unix_millis(row.get(5)?)?,
        access_count: i64_to_u64(row.get(6)?)?,
    })
}

fn read_session(
    connection: &Connection,
    session_id: &SessionId,
) -> rusqlite::Result<Option<Session>> {
    let session = connection
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
            [session_id.as_str()],
            read_session_row,
        )
        .optional()?;
    let Some(mut session) = session else {
        return Ok(None);
    };

    let mut statement = connection.prepare(
        "
SELECT sequence, role, content, created_at_unix_ms
FROM session_interactions
WHERE session_id = ?1
ORDER BY sequence
",
    )?;
    session.interactions = statement
        .query_map([session_id.as_str()], |row| {
            let role: String = row.get(1)?;
            Ok(Interaction {
                sequence: i64_to_u64(row.get(0)?)?,
                role: parse_role(&role)?,
                content: row.get(2)?,
                timestamp: from_unix_millis(row.get(3)?)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Some(session))
}

fn read_session_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let ended_at: Option<i64> = row.get(3)?;
    Ok(Session {
        id: SessionId(row.get(0)?),
        user_id: row.get(1)?,
        started_at: from_unix_millis(row.get(2)?)?,
        ended_at: ended_at.map(from_unix_millis).transpose()?,
        summary: row.get(4)?,
        interactions: Vec::new(),
    })
}

fn read_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let capability: String = row.get(1)?;
    let context_json: String = row.get(3)?;
    let status: String = row.get(4)?;
    let agent_id: Option<String> = row.get(5)?;
    let dispatched_at: Option<i64> = row.get(7)?;
    let started_at: Option<i64> = row.get(8)?;
    let finished_at: Option<i64> = row.get(9)?;
    let execution_time_ms: Option<i64> = row.get(10)?;
    let error_json: Option<String> = row.get(12)?;

    let context: TaskContext = serde_json::from_str(&context_json).map_err(|error| {
        storage_error_sqlite(&format!("invalid task context json in sqlite record: {error}"))
    })?;
    let error = error_json
        .map(|raw| serde_json::from_str::<CoreError>(&raw))
        .transpose()
        .map_err(|error| {
            storage_error_sqlite(&format!("invalid task error json in sqlite record: {error}"))
        })?;

    Ok(Task {
        id: TaskId(i64_to_u64(row.get(0)?)?),
        description: row.get(2)?,
        capability: parse_capability(&capability)?,
        context,
        status: parse_task_status(&status)?,
        agent: agent_id.map(AgentId),
        created_at: from_unix_millis(row.get(6)?)?,
        dispatched_at: dispatched_at.map(from_unix_millis).transpose()?,
        started_at: started_at.map(from_unix_millis).transpose()?,
        finished_at: finished_at.map(from_unix_millis).transpose()?,
        execution_time: execution_time_ms
            .map(|ms| i64_to_u64(ms).map(Duration::from_millis))
            .transpose()?,
        result: row.get(11)?,
        error,
    })
}

fn storage_error(operation: &str, error: rusqlite::Error) -> CoreError {
    storage_error_text(operation, error.to_string())
}

fn storage_error_sqlite(message: &str) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(message.to_string())))
}

fn parse_memory_type(raw: &str) -> rusqlite::Result<MemoryType> {
    raw.parse::<MemoryType>().map_err(|_| {
        storage_error_sqlite(&format!("unknown memory type '{raw}' in sqlite record"))
    })
}

fn parse_importance(level: i64) -> rusqlite::Result<Importance> {
    Importance::from_level(level).ok_or_else(|| {
        storage_error_sqlite(&format!("unknown importance level '{level}' in sqlite record"))
    })
}

fn parse_role(raw: &str) -> rusqlite::Result<Role> {
    raw.parse::<Role>()
        .map_err(|_| storage_error_sqlite(&format!("unknown role '{raw}' in sqlite record")))
}

fn parse_capability(raw: &str) -> rusqlite::Result<Capability> {
    raw.parse::<Capability>().map_err(|_| {
        storage_error_sqlite(&format!("unknown capability '{raw}' in sqlite record"))
    })
}

fn parse_task_status(raw: &str) -> rusqlite::Result<TaskStatus> {
    raw.parse::<TaskStatus>().map_err(|_| {
        storage_error_sqlite(&format!("unknown task status '{raw}' in sqlite record"))
    })
}

fn to_unix_millis(value: SystemTime) -> rusqlite::Result<i64> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        storage_error_sqlite(&format!("time before unix epoch is not supported: {error}"))
    })?;
    i64::try_from(duration.as_millis())
        .map_err(|_| storage_error_sqlite("unix timestamp millis exceed i64 range"))
}

fn from_unix_millis(value: i64) -> rusqlite::Result<SystemTime> {
    let millis = u64::try_from(value)
        .map_err(|_| storage_error_sqlite("negative unix timestamps are not supported"))?;
    Ok(UNIX_EPOCH + Duration::from_millis(millis))
}

fn task_id_to_i64(value: TaskId) -> rusqlite::Result<i64> {
    i64::try_from(value.0).map_err(|_| storage_error_sqlite("task id exceeds i64 range"))
}

fn memory_id_to_i64(value: MemoryId) -> rusqlite::Result<i64> {
    i64::try_from(value.0).map_err(|_| storage_error_sqlite("memory id exceeds i64 range"))
}

fn i64_to_u64(value: i64) -> rusqlite::Result<u64> {
    u64::try_from(value).map_err(|_| storage_error_sqlite("negative integer in sqlite record"))
}

fn to_i64(value: usize) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|_| storage_error_sqlite("value exceeds i64 range"))
}

fn storage_error_text(operation: &str, message: impl AsRef<str>) -> CoreError {
    CoreError::new(
        CoreErrorKind::StorageFailure,
        format!("sqlite store '{operation}' failed: {}", message.as_ref()),
    )
}

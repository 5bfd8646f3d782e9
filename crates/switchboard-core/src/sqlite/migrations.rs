#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "sessions_and_memories",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    started_at_unix_ms INTEGER NOT NULL,
    ended_at_unix_ms INTEGER,
    summary TEXT
);

CREATE TABLE IF NOT EXISTS session_interactions (
    session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at_unix_ms INTEGER NOT NULL,
    PRIMARY KEY (session_id, sequence)
);

CREATE TABLE IF NOT EXISTS memory_records (
    memory_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT,
    content TEXT NOT NULL,
    memory_type TEXT NOT NULL,
    importance INTEGER NOT NULL,
    created_at_unix_ms INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_memory_records_session
    ON memory_records (session_id, memory_id);

CREATE INDEX IF NOT EXISTS idx_memory_records_created
    ON memory_records (created_at_unix_ms, memory_id);

CREATE TABLE IF NOT EXISTS memory_tags (
    memory_id INTEGER NOT NULL REFERENCES memory_records(memory_id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    PRIMARY KEY (memory_id, tag)
);

CREATE INDEX IF NOT EXISTS idx_memory_tags_tag
    ON memory_tags (tag, memory_id);
"#,
    down_sql: r#"
DROP INDEX IF EXISTS idx_memory_tags_tag;
DROP TABLE IF EXISTS memory_tags;
DROP INDEX IF EXISTS idx_memory_records_created;
DROP INDEX IF EXISTS idx_memory_records_session;
DROP TABLE IF EXISTS memory_records;
DROP TABLE IF EXISTS session_interactions;
DROP TABLE IF EXISTS sessions;
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "task_records",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS task_records (
    task_id INTEGER PRIMARY KEY,
    capability TEXT NOT NULL,
    description TEXT NOT NULL,
    context_json TEXT NOT NULL,
    status TEXT NOT NULL,
    agent_id TEXT,
    created_at_unix_ms INTEGER NOT NULL,
    dispatched_at_unix_ms INTEGER,
    started_at_unix_ms INTEGER,
    finished_at_unix_ms INTEGER,
    execution_time_ms INTEGER,
    result TEXT,
    error_json TEXT
);
"#,
    down_sql: r#"
DROP TABLE IF EXISTS task_records;
"#,
};

const MIGRATIONS: [SqliteMigration; 2] = [MIGRATION_0001, MIGRATION_0002];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SqliteMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}

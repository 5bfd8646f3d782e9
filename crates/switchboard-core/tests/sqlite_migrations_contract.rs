use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use switchboard_core::models::{CoreErrorKind, Importance, MemoryType, NewMemory};
use switchboard_core::persistence::{MemoryLog, MigrationStore};
use switchboard_core::sqlite::{SqliteStore, current_schema_version, migration, migrations};

fn test_db_path(test_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("switchboard-{test_name}-{nanos}.sqlite3"))
}

#[test]
fn migration_versions_are_strictly_increasing() {
    let entries = migrations();
    assert!(!entries.is_empty());

    let mut previous = 0;
    for entry in entries {
        assert!(entry.version > previous);
        previous = entry.version;
    }
}

#[test]
fn migration_lookup_and_schema_version_are_consistent() {
    let latest = current_schema_version();
    let latest_entry = migration(latest).expect("latest migration must exist");
    assert_eq!(latest_entry.version, latest);
}

#[test]
fn migration_sql_is_defined_for_up_and_down_paths() {
    for entry in migrations() {
        assert!(!entry.up_sql.trim().is_empty(), "up sql must not be empty");
        assert!(
            !entry.down_sql.trim().is_empty(),
            "down sql must not be empty"
        );
    }
}

#[test]
fn store_migrates_up_down_and_up_again() {
    let store = SqliteStore::new(test_db_path("migrations"));
    assert_eq!(store.current_version().unwrap(), 0);
    assert_eq!(store.planned_migrations(0).len(), migrations().len());

    store.migrate_to_latest().unwrap();
    assert_eq!(store.current_version().unwrap(), current_schema_version());
    store.migrate_to_latest().unwrap();

    store.apply_migration(0).unwrap();
    assert_eq!(store.current_version().unwrap(), 0);

    store.migrate_to_latest().unwrap();
    let record = store
        .append_memory(
            &NewMemory::new("after remigration", MemoryType::Semantic, Importance::Low),
            SystemTime::now(),
        )
        .unwrap();
    assert_eq!(record.id.0, 1);
}

#[test]
fn unmigrated_store_refuses_operations() {
    let store = SqliteStore::new(test_db_path("unmigrated"));

    let error = store.memory_stats().unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::StorageFailure);

    let error = store.apply_migration(current_schema_version() + 1).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::StorageFailure);
}

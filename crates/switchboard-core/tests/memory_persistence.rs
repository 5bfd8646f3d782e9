use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use switchboard_core::config::MemoryConfig;
use switchboard_core::memory::{MemoryStore, RecallEngine};
use switchboard_core::models::{CoreErrorKind, Importance, MemoryType, NewMemory, SessionId};

fn test_db_path(test_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("switchboard-{test_name}-{nanos}.sqlite3"))
}

fn add(store: &MemoryStore, content: &str, importance: Importance) {
    store
        .add_memory(NewMemory::new(content, MemoryType::Semantic, importance).with_tags(["kept"]))
        .unwrap();
}

#[test]
fn high_and_critical_memories_survive_close_and_reopen() {
    let config = MemoryConfig::new(test_db_path("reopen"));
    let store = MemoryStore::open(config.clone()).unwrap();
    add(&store, "minor detail", Importance::Low);
    add(&store, "important fact", Importance::High);
    add(&store, "never forget", Importance::Critical);
    store.close().unwrap();

    let reopened = Arc::new(MemoryStore::open(config).unwrap());
    let contents: Vec<String> = reopened
        .memories_with_tag("KEPT")
        .unwrap()
        .into_iter()
        .map(|record| record.content)
        .collect();
    assert!(contents.contains(&"important fact".to_string()));
    assert!(contents.contains(&"never forget".to_string()));

    let recalled = RecallEngine::new(reopened).recall("never forget", 1, None).unwrap();
    assert_eq!(recalled[0].importance, Importance::Critical);
}

#[test]
fn prune_removes_only_low_and_medium_grades() {
    let store = MemoryStore::open(MemoryConfig::new(test_db_path("prune"))).unwrap();
    add(&store, "scratch", Importance::Low);
    add(&store, "aside", Importance::Medium);
    add(&store, "decision", Importance::High);
    add(&store, "invariant", Importance::Critical);
    std::thread::sleep(Duration::from_millis(20));

    assert_eq!(store.prune(Duration::from_secs(3600)).unwrap(), 0);
    assert_eq!(store.prune(Duration::ZERO).unwrap(), 2);

    let stats = store.stats().unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_importance.get(&Importance::Low), None);
    assert_eq!(stats.by_importance.get(&Importance::High), Some(&1));
    assert_eq!(stats.by_importance.get(&Importance::Critical), Some(&1));
    assert_eq!(stats.by_type.get(&MemoryType::Semantic), Some(&2));
}

#[test]
fn recent_memories_are_newest_first() {
    let store = MemoryStore::open(MemoryConfig::new(test_db_path("recent"))).unwrap();
    for content in ["first", "second", "third"] {
        add(&store, content, Importance::Medium);
    }

    let recent: Vec<String> = store
        .recent_memories(2)
        .unwrap()
        .into_iter()
        .map(|record| record.content)
        .collect();
    assert_eq!(recent, vec!["third", "second"]);
}

#[test]
fn closed_store_rejects_every_operation() {
    let store = MemoryStore::open(MemoryConfig::new(test_db_path("closed"))).unwrap();
    add(&store, "before close", Importance::High);
    store.close().unwrap();

    assert_eq!(store.close().unwrap_err().kind, CoreErrorKind::StoreClosed);
    let error = store
        .add_memory(NewMemory::new("after close", MemoryType::Working, Importance::Low))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::StoreClosed);
    assert_eq!(
        store.recent_memories(5).unwrap_err().kind,
        CoreErrorKind::StoreClosed
    );
}

#[test]
fn writes_into_unknown_sessions_are_rejected() {
    let store = MemoryStore::open(MemoryConfig::new(test_db_path("unknown-session"))).unwrap();

    let error = store
        .add_memory(
            NewMemory::new("orphan", MemoryType::Episodic, Importance::Low)
                .in_session(SessionId::generate()),
        )
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::UnknownSession);
    assert_eq!(store.stats().unwrap().total, 0);
}

#[test]
fn blank_content_and_bad_config_are_invalid_input() {
    let store = MemoryStore::open(MemoryConfig::new(test_db_path("blank"))).unwrap();
    let error = store
        .add_memory(NewMemory::new("  ", MemoryType::Episodic, Importance::Low))
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidInput);

    let mut config = MemoryConfig::new(test_db_path("bad-config"));
    config.recency_half_life_secs = 0;
    let error = MemoryStore::open(config).err().unwrap();
    assert_eq!(error.kind, CoreErrorKind::InvalidInput);
}

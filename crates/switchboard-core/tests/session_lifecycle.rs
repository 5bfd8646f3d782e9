use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use switchboard_core::config::MemoryConfig;
use switchboard_core::memory::MemoryStore;
use switchboard_core::models::{CoreErrorKind, Importance, MemoryType, Role, SessionId};
use switchboard_core::session::SessionManager;

fn test_db_path(test_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("switchboard-{test_name}-{nanos}.sqlite3"))
}

fn manager(test_name: &str) -> SessionManager {
    let store = MemoryStore::open(MemoryConfig::new(test_db_path(test_name))).unwrap();
    SessionManager::new(Arc::new(store))
}

#[test]
fn session_records_interactions_until_sealed() {
    let sessions = manager("session-seal");
    let handle = sessions.start_session("user-1").unwrap();

    let first = handle.add_interaction(Role::User, "hello").unwrap();
    let second = handle.add_interaction(Role::Assistant, "hi there").unwrap();
    assert_eq!((first.sequence, second.sequence), (1, 2));
    assert_eq!(sessions.active_sessions().unwrap().len(), 1);

    let sealed = handle.end_session("greeting exchanged").unwrap();
    assert!(!sealed.is_open());
    assert_eq!(sealed.summary.as_deref(), Some("greeting exchanged"));
    assert_eq!(sealed.interactions.len(), 2);
    assert_eq!(sealed.interactions[1].role, Role::Assistant);

    let error = handle.add_interaction(Role::User, "anyone?").unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::SessionClosed);
    let error = handle.end_session("again").unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::SessionClosed);
    let error = handle
        .remember("too late", MemoryType::Episodic, Importance::High, ["late"])
        .unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::SessionClosed);

    assert!(sessions.active_sessions().unwrap().is_empty());
    assert_eq!(sessions.session(handle.id()).unwrap().interactions.len(), 2);
}

#[test]
fn empty_interactions_and_unknown_sessions_are_rejected() {
    let sessions = manager("session-invalid");
    let handle = sessions.start_session("user-2").unwrap();

    let error = handle.add_interaction(Role::User, "   ").unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::InvalidInput);

    let missing = SessionId::generate();
    assert_eq!(
        sessions.session(&missing).unwrap_err().kind,
        CoreErrorKind::UnknownSession
    );
    assert_eq!(
        sessions
            .add_interaction(&missing, Role::User, "hello")
            .unwrap_err()
            .kind,
        CoreErrorKind::UnknownSession
    );
    assert_eq!(
        sessions.end_session(&missing, "done").unwrap_err().kind,
        CoreErrorKind::UnknownSession
    );
    assert_eq!(
        sessions.start_session(" ").err().unwrap().kind,
        CoreErrorKind::InvalidInput
    );
}

#[test]
fn sessions_can_be_resumed_by_id() {
    let sessions = manager("session-resume");
    let id = sessions.start_session("user-3").unwrap().id().clone();

    sessions.add_interaction(&id, Role::User, "first turn").unwrap();
    let resumed = sessions.resume(&id).unwrap();
    assert_eq!(resumed.user_id(), "user-3");
    resumed.add_interaction(Role::Assistant, "second turn").unwrap();

    let memory = resumed
        .remember("likes short answers", MemoryType::Semantic, Importance::Medium, ["Style"])
        .unwrap();
    assert_eq!(memory.session_id.as_ref(), Some(&id));
    assert!(memory.tags.contains("style"));

    sessions.end_session(&id, "done").unwrap();
    assert_eq!(
        sessions.resume(&id).err().unwrap().kind,
        CoreErrorKind::SessionClosed
    );
}

#[test]
fn concurrent_sessions_keep_their_own_logs_in_order() {
    const TURNS: usize = 25;
    let sessions = manager("session-concurrent");
    let first = sessions.start_session("alpha").unwrap();
    let second = sessions.start_session("beta").unwrap();

    std::thread::scope(|scope| {
        for handle in [&first, &second] {
            scope.spawn(move || {
                for turn in 0..TURNS {
                    handle
                        .add_interaction(Role::User, &format!("{} turn {turn}", handle.user_id()))
                        .unwrap();
                    handle
                        .remember(
                            format!("{} fact {turn}", handle.user_id()),
                            MemoryType::Episodic,
                            Importance::Low,
                            ["turn"],
                        )
                        .unwrap();
                }
            });
        }
    });

    let store = sessions.store();
    for handle in [&first, &second] {
        let session = handle.session().unwrap();
        let contents: Vec<String> = session
            .interactions
            .iter()
            .map(|interaction| interaction.content.clone())
            .collect();
        let expected: Vec<String> = (0..TURNS)
            .map(|turn| format!("{} turn {turn}", handle.user_id()))
            .collect();
        assert_eq!(contents, expected);
        assert!(
            session
                .interactions
                .iter()
                .enumerate()
                .all(|(index, interaction)| interaction.sequence == index as u64 + 1)
        );

        let memories = store.memories_for_session(handle.id()).unwrap();
        assert_eq!(memories.len(), TURNS);
        assert!(
            memories
                .iter()
                .all(|memory| memory.content.starts_with(handle.user_id()))
        );
    }
}

//! Session lifecycle and manager integration tests

use async_trait::async_trait;
use serde_json::{json, Value};
use sigil_session::{
    BackendKind, CookieBackend, DatabaseBackend, ExpiredRowPolicy, ManualClock, RecordStore,
    Session, SessionBackend, SessionData, SessionError, SessionManager, SessionResult,
    SessionSettings, SqliteRecordStore,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

/// Backend that records how often it is read and can be told to fail
#[derive(Default)]
struct CountingBackend {
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
}

#[async_trait]
impl SessionBackend for CountingBackend {
    async fn read(&self, _session_id: &str) -> SessionResult<SessionData> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SessionError::storage("store offline"));
        }
        let mut data = SessionData::new();
        data.insert("seen".to_string(), json!(true));
        Ok(data)
    }

    async fn write(&self, _data: &SessionData, session_id: Option<&str>) -> SessionResult<String> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(session_id.unwrap_or("generated").to_string())
    }

    async fn remove(&self, _session_id: &str) -> SessionResult<()> {
        Ok(())
    }

    async fn exists(&self, _session_id: &str) -> SessionResult<bool> {
        Ok(true)
    }

    fn max_age(&self) -> i64 {
        60
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

#[tokio::test]
async fn test_load_twice_reads_once() {
    let backend = Arc::new(CountingBackend::default());
    let mut session = Session::new(backend.clone(), Some("abc".to_string()));

    session.load().await.unwrap();
    session.load().await.unwrap();

    assert_eq!(backend.reads.load(Ordering::SeqCst), 1);
    assert_eq!(session["seen"], true);
    assert!(!session.is_modified());
}

#[tokio::test]
async fn test_failed_load_can_be_retried() {
    let backend = Arc::new(CountingBackend::default());
    backend.fail_reads.store(true, Ordering::SeqCst);
    let mut session = Session::new(backend.clone(), Some("abc".to_string()));

    let err = assert_err!(session.load().await);
    assert!(matches!(err, SessionError::Storage { .. }));
    assert!(!session.is_loaded());

    backend.fail_reads.store(false, Ordering::SeqCst);
    assert_ok!(session.load().await);
    assert!(session.is_loaded());
    assert_eq!(backend.reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_modified_flags() {
    let backend = Arc::new(CountingBackend::default());
    let mut session = Session::new(backend, Some("abc".to_string()));
    session.load().await.unwrap();

    let _ = session.get("seen");
    let _ = session.keys().count();
    let _ = session.contains_key("seen");
    assert!(!session.is_modified());

    session.insert("a", 1);
    assert!(session.is_modified());

    let mutators: [fn(&mut Session); 3] = [
        |s| {
            s.pop("a", Value::Null);
        },
        |s| s.clear(),
        |s| s.update([("b", json!(2))]),
    ];
    for mutate in mutators {
        let mut fresh = Session::new(Arc::new(CountingBackend::default()), None);
        mutate(&mut fresh);
        assert!(fresh.is_modified());
    }
}

#[tokio::test]
async fn test_persist_keeps_modified_flag_and_adopts_id() {
    let backend = Arc::new(CountingBackend::default());
    let mut session = Session::new(backend.clone(), None);
    session.load().await.unwrap();
    session.insert("a", 1);

    let id = session.persist().await.unwrap();
    assert_eq!(id, "generated");
    assert_eq!(session.session_id(), Some("generated"));
    assert!(session.is_modified());
    assert_eq!(backend.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_end_to_end_database_session() {
    let backend: Arc<dyn SessionBackend> = Arc::new(DatabaseBackend::in_memory("k", 60));

    let mut session = Session::new(backend.clone(), None);
    session.load().await.unwrap();
    session.insert("user_id", 42);
    let id = session.persist().await.unwrap();

    let mut again = Session::new(backend, Some(id));
    again.load().await.unwrap();
    assert_eq!(again["user_id"], 42);
    assert_eq!(again.get_as::<i64>("user_id"), Some(42));
}

#[tokio::test]
async fn test_flush_discards_data_and_id() {
    let backend: Arc<dyn SessionBackend> = Arc::new(DatabaseBackend::in_memory("k", 60));

    let mut session = Session::new(backend.clone(), None);
    session.load().await.unwrap();
    session.insert("user_id", 42);
    let old_id = session.persist().await.unwrap();

    let new_id = session.flush().await.unwrap();
    assert_ne!(new_id, old_id);
    assert!(session.is_empty());
    assert!(session.is_modified());
    assert!(!backend.exists(&old_id).await.unwrap());

    let mut fresh = Session::new(backend.clone(), Some(new_id));
    fresh.load().await.unwrap();
    assert!(fresh.is_empty());

    let mut stale = Session::new(backend, Some(old_id));
    stale.load().await.unwrap();
    assert!(stale.is_empty());
}

#[tokio::test]
async fn test_delete_keeps_id() {
    let backend: Arc<dyn SessionBackend> = Arc::new(DatabaseBackend::in_memory("k", 60));
    let mut session = Session::new(backend.clone(), None);
    session.load().await.unwrap();
    session.insert("user_id", 42);
    let id = session.persist().await.unwrap();

    session.delete().await.unwrap();
    assert_eq!(session.session_id(), Some(id.as_str()));
    assert!(session.is_empty());
    assert!(!backend.exists(&id).await.unwrap());
}

#[tokio::test]
async fn test_regenerate_id_moves_data() {
    let backend: Arc<dyn SessionBackend> = Arc::new(DatabaseBackend::in_memory("k", 60));
    let mut session = Session::new(backend.clone(), None);
    session.load().await.unwrap();
    session.insert("user_id", 42);
    let old_id = session.persist().await.unwrap();

    let new_id = session.regenerate_id().await.unwrap();
    session.persist().await.unwrap();

    let mut moved = Session::new(backend, Some(new_id.clone()));
    moved.load().await.unwrap();
    assert_ne!(new_id, old_id);
    assert_eq!(moved["user_id"], 42);
}

#[tokio::test]
async fn test_cookie_session_through_manager() {
    let settings = SessionSettings {
        secret_key: "k".to_string(),
        max_age: 60,
        ..SessionSettings::default()
    };
    let manager = SessionManager::from_settings(&settings, None).unwrap();

    let mut session = manager.open(None).await.unwrap();
    session.insert("theme", "dark");
    let header = manager.commit(&mut session).await.unwrap().unwrap();
    assert!(header.contains("Max-Age=60"));

    // Browsers send back only name=value
    let request_cookie = header.split(';').next().unwrap().to_string();
    let session = manager
        .open(Some(&format!("lang=en; {}", request_cookie)))
        .await
        .unwrap();
    assert_eq!(session["theme"], "dark");
}

#[tokio::test]
async fn test_database_session_through_manager_with_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("sessions.db").display());
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::connect(&url).await.unwrap());

    let settings = SessionSettings {
        secret_key: "k".to_string(),
        max_age: 60,
        backend: BackendKind::Database,
        expired_rows: ExpiredRowPolicy::PurgeOnRead,
        ..SessionSettings::default()
    };
    let manager = SessionManager::from_settings(&settings, Some(store.clone())).unwrap();

    let mut session = manager.open(None).await.unwrap();
    session.insert("user_id", 42);
    let header = manager.commit(&mut session).await.unwrap().unwrap();
    let request_cookie = header.split(';').next().unwrap().to_string();

    let mut session = manager.open(Some(&request_cookie)).await.unwrap();
    assert_eq!(session["user_id"], 42);
    assert_eq!(manager.commit(&mut session).await.unwrap(), None);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_expired_cookie_session_starts_empty() {
    let clock = ManualClock::new(1_700_000_000);
    let backend: Arc<dyn SessionBackend> =
        Arc::new(CookieBackend::new("k", 60).with_clock(Arc::new(clock.clone())));

    let mut session = Session::new(backend.clone(), None);
    session.insert("user_id", 42);
    let id = session.persist().await.unwrap();

    clock.advance(61);
    let mut later = Session::new(backend, Some(id));
    later.load().await.unwrap();
    assert!(later.is_empty());
}

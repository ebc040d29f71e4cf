//! Server-side backend: the identifier is a signed reference to a stored record

use super::{decode_payload, encode_payload, SessionBackend, SessionData};
use crate::signing::{Clock, SecretKey, SignatureError, Signer, TimestampSigner};
use crate::store::{MemoryRecordStore, RecordStore, SessionRecord};
use crate::SessionResult;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sigil_core::ExpiredRowPolicy;
use std::fmt;
use std::sync::Arc;

/// Session data lives in a [`RecordStore`]; the client only holds the signed row id
#[derive(Clone)]
pub struct DatabaseBackend {
    id_signer: Signer,
    data_signer: TimestampSigner,
    max_age: i64,
    store: Arc<dyn RecordStore>,
    expired_rows: ExpiredRowPolicy,
}

impl fmt::Debug for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseBackend")
            .field("max_age", &self.max_age)
            .field("expired_rows", &self.expired_rows)
            .finish_non_exhaustive()
    }
}

impl DatabaseBackend {
    pub fn new(secret: impl Into<SecretKey>, max_age: i64, store: Arc<dyn RecordStore>) -> Self {
        let secret = secret.into();
        Self {
            id_signer: Signer::new(secret.clone()),
            data_signer: TimestampSigner::new(secret),
            max_age,
            store,
            expired_rows: ExpiredRowPolicy::default(),
        }
    }

    /// Backend over a fresh [`MemoryRecordStore`]
    pub fn in_memory(secret: impl Into<SecretKey>, max_age: i64) -> Self {
        Self::new(secret, max_age, Arc::new(MemoryRecordStore::new()))
    }

    /// Use `clock` for record timestamps and expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.data_signer = self.data_signer.using_clock(clock);
        self
    }

    pub fn with_expired_rows(mut self, policy: ExpiredRowPolicy) -> Self {
        self.expired_rows = policy;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    fn new_session_id(&self) -> String {
        let raw = uuid::Uuid::new_v4().to_string();
        self.id_signer.sign(&STANDARD.encode(raw))
    }
}

#[async_trait]
impl SessionBackend for DatabaseBackend {
    async fn read(&self, session_id: &str) -> SessionResult<SessionData> {
        let Some(record) = self.store.get(session_id).await? else {
            return Ok(SessionData::new());
        };

        match self.data_signer.unsign(&record.data, self.max_age) {
            Ok(payload) => Ok(decode_payload(&payload).unwrap_or_default()),
            Err(SignatureError::SignatureExpired { age, max_age }) => {
                tracing::debug!(
                    "Session record expired (age {}s, max age {}s)",
                    age,
                    max_age
                );
                if self.expired_rows == ExpiredRowPolicy::PurgeOnRead {
                    self.store.delete(session_id).await?;
                }
                Ok(SessionData::new())
            }
            Err(e) => {
                tracing::debug!("Rejected session record: {}", e);
                Ok(SessionData::new())
            }
        }
    }

    async fn write(&self, data: &SessionData, session_id: Option<&str>) -> SessionResult<String> {
        let session_id = match session_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.new_session_id(),
        };

        let now = self.data_signer.get_timestamp();
        let signed = self.data_signer.sign_at(&encode_payload(data)?, now);

        if !self.store.update_data(&session_id, &signed, now).await? {
            let record = SessionRecord::new(session_id.clone(), now, self.max_age, signed);
            self.store.insert(&record).await?;
            tracing::debug!("Created session record");
        }

        Ok(session_id)
    }

    async fn remove(&self, session_id: &str) -> SessionResult<()> {
        self.store.delete(session_id).await?;
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> SessionResult<bool> {
        Ok(self.store.get(session_id).await?.is_some())
    }

    async fn generate_id(&self) -> SessionResult<String> {
        Ok(self.new_session_id())
    }

    fn max_age(&self) -> i64 {
        self.max_age
    }

    fn name(&self) -> &'static str {
        "database"
    }
}

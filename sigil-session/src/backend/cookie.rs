//! Client-side backend: the identifier is the signed, serialized session

use super::{decode_payload, encode_payload, SessionBackend, SessionData};
use crate::signing::{Clock, SecretKey, SignatureError, TimestampSigner};
use crate::SessionResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Keeps the whole session in the cookie value
///
/// Nothing is stored server side, so `remove` cannot revoke an issued cookie and
/// `exists` is always `false`.
#[derive(Debug, Clone)]
pub struct CookieBackend {
    signer: TimestampSigner,
    max_age: i64,
}

impl CookieBackend {
    pub fn new(secret: impl Into<SecretKey>, max_age: i64) -> Self {
        Self {
            signer: TimestampSigner::new(secret),
            max_age,
        }
    }

    /// Use `clock` for signing and expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.signer = self.signer.using_clock(clock);
        self
    }

    /// Like [`SessionBackend::read`] but reports why an identifier was rejected
    pub fn verify(&self, session_id: &str) -> Result<SessionData, SignatureError> {
        let payload = self.signer.unsign(session_id, self.max_age)?;
        Ok(decode_payload(&payload).unwrap_or_default())
    }
}

#[async_trait]
impl SessionBackend for CookieBackend {
    async fn read(&self, session_id: &str) -> SessionResult<SessionData> {
        match self.verify(session_id) {
            Ok(data) => Ok(data),
            Err(e) => {
                tracing::debug!("Rejected session cookie: {}", e);
                Ok(SessionData::new())
            }
        }
    }

    async fn write(&self, data: &SessionData, _session_id: Option<&str>) -> SessionResult<String> {
        let payload = encode_payload(data)?;
        Ok(self.signer.sign(&payload))
    }

    async fn remove(&self, _session_id: &str) -> SessionResult<()> {
        Ok(())
    }

    async fn exists(&self, _session_id: &str) -> SessionResult<bool> {
        Ok(false)
    }

    fn max_age(&self) -> i64 {
        self.max_age
    }

    fn name(&self) -> &'static str {
        "cookie"
    }
}

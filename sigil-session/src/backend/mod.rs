//! Session backends
//!
//! A backend turns a session identifier into session data and back. Forged, expired or
//! unknown identifiers read as an empty mapping; only infrastructure failures are errors.

pub mod cookie;
pub mod database;

pub use cookie::CookieBackend;
pub use database::DatabaseBackend;

use crate::SessionResult;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

/// Session state: string keys mapped to JSON values
pub type SessionData = serde_json::Map<String, Value>;

/// Storage strategy behind a [`crate::Session`]
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Data for `session_id`, or an empty mapping when missing, forged or expired
    async fn read(&self, session_id: &str) -> SessionResult<SessionData>;

    /// Store `data` and return the identifier it can be read back with
    async fn write(&self, data: &SessionData, session_id: Option<&str>) -> SessionResult<String>;

    /// Best effort; removing an unknown id is not an error
    async fn remove(&self, session_id: &str) -> SessionResult<()>;

    async fn exists(&self, session_id: &str) -> SessionResult<bool>;

    /// Fresh identifier for a regenerated session
    async fn generate_id(&self) -> SessionResult<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }

    /// Signature lifetime in seconds
    fn max_age(&self) -> i64;

    /// Short name for logs and diagnostics
    fn name(&self) -> &'static str;
}

/// JSON then standard base64
pub(crate) fn encode_payload(data: &SessionData) -> SessionResult<String> {
    let json = serde_json::to_vec(data)?;
    Ok(STANDARD.encode(json))
}

/// Inverse of [`encode_payload`]. `None` when the payload is not base64 JSON of an object.
pub(crate) fn decode_payload(encoded: &str) -> Option<SessionData> {
    let bytes = match STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Signed session payload is not base64: {}", e);
            return None;
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            tracing::warn!("Signed session payload is not an object: {}", other);
            None
        }
        Err(e) => {
            tracing::warn!("Signed session payload is not JSON: {}", e);
            None
        }
    }
}

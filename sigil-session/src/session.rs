//! Per-request session state

use crate::backend::{SessionBackend, SessionData};
use crate::SessionResult;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// Session data bound to one request
///
/// Data is fetched lazily by [`Session::load`]. Every mutator marks the session modified
/// even when the mapping ends up unchanged; readers never do. Nothing is written back
/// until [`Session::persist`] is called.
pub struct Session {
    backend: Arc<dyn SessionBackend>,
    session_id: Option<String>,
    data: SessionData,
    is_loaded: bool,
    is_modified: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend.name())
            .field("session_id", &self.session_id)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("is_loaded", &self.is_loaded)
            .field("is_modified", &self.is_modified)
            .finish()
    }
}

impl Session {
    /// An empty id is treated the same as no id
    pub fn new(backend: Arc<dyn SessionBackend>, session_id: Option<String>) -> Self {
        Self {
            backend,
            session_id: session_id.filter(|id| !id.is_empty()),
            data: SessionData::new(),
            is_loaded: false,
            is_modified: false,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Fetch data from the backend once; later calls do nothing
    ///
    /// If the backend read fails the session stays unloaded and the call may be retried.
    pub async fn load(&mut self) -> SessionResult<()> {
        if self.is_loaded {
            return Ok(());
        }

        self.data = match &self.session_id {
            Some(id) => self.backend.read(id).await?,
            None => SessionData::new(),
        };
        self.is_loaded = true;
        Ok(())
    }

    /// Write the current data and adopt the identifier the backend returns
    ///
    /// The modified flag is left as is.
    pub async fn persist(&mut self) -> SessionResult<String> {
        let id = self
            .backend
            .write(&self.data, self.session_id.as_deref())
            .await?;
        self.session_id = Some(id.clone());
        Ok(id)
    }

    /// Drop the data and the backing record; the identifier is kept
    pub async fn delete(&mut self) -> SessionResult<()> {
        if let Some(id) = &self.session_id {
            self.data.clear();
            self.is_modified = true;
            self.backend.remove(id).await?;
        }
        Ok(())
    }

    /// Delete everything and continue under a fresh identifier
    pub async fn flush(&mut self) -> SessionResult<String> {
        self.is_modified = true;
        self.delete().await?;
        self.regenerate_id().await
    }

    /// Move the current data to a fresh identifier
    pub async fn regenerate_id(&mut self) -> SessionResult<String> {
        let id = self.backend.generate_id().await?;
        tracing::debug!("Regenerated session id ({} backend)", self.backend.name());
        self.session_id = Some(id.clone());
        self.is_modified = true;
        Ok(id)
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Deserialize the value under `key`; `None` when missing or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.data.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.is_modified = true;
        self.data.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.is_modified = true;
        self.data.remove(key)
    }

    /// Remove `key`, returning its value or `default` when it was missing
    pub fn pop(&mut self, key: &str, default: impl Into<Value>) -> Value {
        self.is_modified = true;
        self.data.remove(key).unwrap_or_else(|| default.into())
    }

    /// Insert `default` unless `key` is present; returns the stored value
    pub fn set_default(&mut self, key: impl Into<String>, default: impl Into<Value>) -> &mut Value {
        self.is_modified = true;
        self.data.entry(key.into()).or_insert_with(|| default.into())
    }

    pub fn clear(&mut self) {
        self.is_modified = true;
        self.data.clear();
    }

    pub fn update<I, K>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.is_modified = true;
        for (key, value) in entries {
            self.data.insert(key.into(), value);
        }
    }
}

impl Index<&str> for Session {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.data.get(key).unwrap_or(&NULL)
    }
}

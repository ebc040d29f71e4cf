//! Wiring a configured backend to per-request sessions

use crate::backend::{CookieBackend, DatabaseBackend, SessionBackend};
use crate::cookie::SessionCookie;
use crate::store::RecordStore;
use crate::{Session, SessionError, SessionResult};
use sigil_core::{BackendKind, SessionSettings};
use std::sync::Arc;

/// Owns the backend chosen at startup and hands it to every [`Session`]
#[derive(Clone)]
pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
    cookie: SessionCookie,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("backend", &self.backend.name())
            .field("cookie", &self.cookie)
            .finish()
    }
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>, cookie: SessionCookie) -> Self {
        Self { backend, cookie }
    }

    /// Build the backend described by `settings`
    ///
    /// `store` is required for [`BackendKind::Database`] and ignored otherwise.
    pub fn from_settings(
        settings: &SessionSettings,
        store: Option<Arc<dyn RecordStore>>,
    ) -> SessionResult<Self> {
        if settings.secret_key.is_empty() {
            return Err(SessionError::config("session secret key must not be empty"));
        }

        let backend: Arc<dyn SessionBackend> = match settings.backend {
            BackendKind::Cookie => Arc::new(CookieBackend::new(
                settings.secret_key.as_str(),
                settings.max_age,
            )),
            BackendKind::Database => {
                let store = store.ok_or_else(|| {
                    SessionError::config("database backend requires a record store")
                })?;
                Arc::new(
                    DatabaseBackend::new(settings.secret_key.as_str(), settings.max_age, store)
                        .with_expired_rows(settings.expired_rows),
                )
            }
        };

        tracing::info!(
            "Session manager using {} backend (max age {}s)",
            backend.name(),
            settings.max_age
        );

        Ok(Self::new(backend, SessionCookie::from_settings(settings)))
    }

    /// Validate `config` and open the SQLite store when the database backend is selected
    #[cfg(feature = "sqlite")]
    pub async fn connect(config: &sigil_core::SigilConfig) -> SessionResult<Self> {
        config.validate()?;

        let store: Option<Arc<dyn RecordStore>> = match config.session.backend {
            BackendKind::Database => Some(Arc::new(
                crate::store::SqliteRecordStore::connect(&config.database.url).await?,
            )),
            BackendKind::Cookie => None,
        };

        Self::from_settings(&config.session, store)
    }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    /// Session for a request, already loaded
    pub async fn open(&self, cookie_header: Option<&str>) -> SessionResult<Session> {
        let session_id = cookie_header.and_then(|header| self.cookie.extract(header));
        let mut session = Session::new(self.backend.clone(), session_id);
        session.load().await?;
        Ok(session)
    }

    /// Persist a modified session and return the `Set-Cookie` value for the response
    ///
    /// Unmodified sessions are not written and produce no header.
    pub async fn commit(&self, session: &mut Session) -> SessionResult<Option<String>> {
        if !session.is_modified() {
            return Ok(None);
        }

        let id = session.persist().await?;
        Ok(Some(self.cookie.to_header_value(&id)))
    }
}

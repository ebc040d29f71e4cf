//! Sigil Session - Signed server-side sessions
//!
//! A [`Session`] holds one visitor's state for the duration of a request. It is backed by
//! a [`SessionBackend`], chosen once at startup:
//!
//! - **Cookie** ([`CookieBackend`]): the whole state is serialized, timestamp-signed and
//!   handed to the client as the identifier.
//! - **Database** ([`DatabaseBackend`]): the client holds a signed row id; the state is
//!   stored through a [`RecordStore`].
//!
//! Forged, expired or unknown identifiers read as an empty session. Signing provides
//! integrity only; payloads are not encrypted.
//!
//! ## Example
//!
//! ```no_run
//! use sigil_session::{DatabaseBackend, Session};
//! use std::sync::Arc;
//!
//! # async fn example() -> sigil_session::SessionResult<()> {
//! let backend = Arc::new(DatabaseBackend::in_memory("secret", 3600));
//!
//! let mut session = Session::new(backend.clone(), None);
//! session.load().await?;
//! session.insert("user_id", 42);
//! let id = session.persist().await?;
//!
//! let mut again = Session::new(backend, Some(id));
//! again.load().await?;
//! assert_eq!(again["user_id"], 42);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cookie;
pub mod error;
pub mod manager;
pub mod session;
pub mod signing;
pub mod store;

pub use backend::{CookieBackend, DatabaseBackend, SessionBackend, SessionData};
pub use cookie::SessionCookie;
pub use error::{SessionError, SessionResult};
pub use manager::SessionManager;
pub use session::Session;
pub use signing::{
    Clock, ManualClock, SecretKey, SignatureError, Signer, SystemClock, TimestampSigner,
};
pub use store::{MemoryRecordStore, RecordStore, SessionRecord};

#[cfg(feature = "sqlite")]
pub use store::SqliteRecordStore;

pub use sigil_core::{BackendKind, ExpiredRowPolicy, SameSitePolicy, SessionSettings};

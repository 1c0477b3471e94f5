//! Authentication session: the current token, the identity derived from it,
//! and its persistence across restarts.
//!
//! The store is shared as an explicit [`SessionHandle`]; the API client reads
//! the bearer token from it for every request, and only [`SessionStore::login`],
//! [`SessionStore::logout`] and expiry detection mutate it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::models::{UserId, UserSummary};
use crate::token::decode_claims;

// ---------------------------------------------------------------------------
// Token persistence
// ---------------------------------------------------------------------------

/// Where the raw token lives between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

/// Token kept in a single file, created with owner-only permissions on Unix.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        io::Write::write_all(&mut file, token.as_bytes())
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Process-local store, for tests and for runs that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    pub fn stored(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.stored())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn load(&self) -> io::Result<Option<String>> {
        (**self).load()
    }

    fn save(&self, token: &str) -> io::Result<()> {
        (**self).save(token)
    }

    fn clear(&self) -> io::Result<()> {
        (**self).clear()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    /// `None` when the token's claims could not be read at login time.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

pub type SessionHandle = Arc<SessionStore>;

pub struct SessionStore {
    store: Box<dyn TokenStore>,
    current: Mutex<Option<Session>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl SessionStore {
    /// A store with nothing loaded. Nothing is read from `store` until login.
    pub fn anonymous(store: impl TokenStore + 'static) -> SessionHandle {
        Arc::new(Self {
            store: Box::new(store),
            current: Mutex::new(None),
        })
    }

    /// Start-up path: pick up a persisted token if it is still usable.
    ///
    /// Never fails. An unreadable store, a malformed token or an expired one
    /// all yield an anonymous session; the latter two are also removed from
    /// the store.
    pub fn restore(store: impl TokenStore + 'static) -> SessionHandle {
        let handle = Self::anonymous(store);
        let restored = handle.restore_at(Utc::now());
        *handle.slot() = restored;
        handle
    }

    fn restore_at(&self, now: DateTime<Utc>) -> Option<Session> {
        let token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "could not read persisted token, starting anonymous");
                return None;
            }
        };

        let claims = match decode_claims(&token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "discarding malformed persisted token");
                self.forget_persisted();
                return None;
            }
        };

        let session = Session {
            token,
            user_id: claims.user_id,
            username: claims.username.clone(),
            expires_at: claims.expires_at().ok(),
        };
        if session.is_expired_at(now) {
            info!(exp = claims.exp, "persisted token has expired, discarding");
            self.forget_persisted();
            return None;
        }

        info!(user_id = ?session.user_id, "restored persisted session");
        Some(session)
    }

    /// Adopt a token issued by `POST /login`.
    ///
    /// The in-memory session is always established; a failure to persist the
    /// token only costs the next restart and is logged.
    pub fn login(&self, token: impl Into<String>, user: UserSummary) -> Session {
        let token = token.into();
        let expires_at = match decode_claims(&token) {
            Ok(claims) => claims.expires_at().ok(),
            Err(e) => {
                debug!(error = %e, "login token claims unreadable, expiry unknown");
                None
            }
        };
        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "could not persist session token");
        }

        let session = Session {
            token,
            user_id: Some(user.id),
            username: Some(user.username),
            expires_at,
        };
        info!(user_id = user.id, "logged in");
        *self.slot() = Some(session.clone());
        session
    }

    pub fn logout(&self) {
        self.forget_persisted();
        if self.slot().take().is_some() {
            info!("logged out");
        }
    }

    /// The live session, if any. An expired session is destroyed here.
    pub fn current(&self) -> Option<Session> {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|s| s.is_expired_at(Utc::now())) {
            info!("session token expired, returning to anonymous");
            *slot = None;
            drop(slot);
            self.forget_persisted();
            return None;
        }
        slot.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// Token to send as `Authorization: Bearer ...`.
    pub fn bearer(&self) -> Option<String> {
        self.current().map(|s| s.token)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.current().and_then(|s| s.user_id)
    }

    pub fn username(&self) -> Option<String> {
        self.current().and_then(|s| s.username)
    }

    /// The live session, or [`ClientError::NotAuthenticated`] naming `action`.
    pub fn require(&self, action: &'static str) -> Result<Session> {
        self.current()
            .ok_or(ClientError::NotAuthenticated { action })
    }

    fn forget_persisted(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "could not clear persisted token");
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Session storage for the access token and the cached user profile.
//!
//! The REST client reads the token through [`SessionProvider`] on every
//! request, so the storage backend is chosen by whoever builds the client.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::account::{AuthTokens, User};
use crate::error::TodoResult;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

/// Capability to read and replace the current session.
pub trait SessionProvider: Send + Sync {
    /// Bearer token for outgoing requests, if logged in.
    fn token(&self) -> Option<String>;

    fn set_session(&self, tokens: &AuthTokens) -> TodoResult<()>;

    /// Forget tokens and the cached user.
    fn clear_session(&self) -> TodoResult<()>;

    fn user(&self) -> Option<User>;

    fn set_user(&self, user: &User) -> TodoResult<()>;
}

/// Stored session, serialized under fixed key names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<User>,
}

impl StoredSession {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// In-process session that lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemorySession {
    inner: RwLock<StoredSession>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = StoredSession {
            access_token: Some(token.into()),
            ..Default::default()
        };
        Self {
            inner: RwLock::new(session),
        }
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh_token
            .clone()
    }
}

impl SessionProvider for MemorySession {
    fn token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    fn set_session(&self, tokens: &AuthTokens) -> TodoResult<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.access_token = Some(tokens.access.clone());
        inner.refresh_token = Some(tokens.refresh.clone());
        Ok(())
    }

    fn clear_session(&self) -> TodoResult<()> {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = StoredSession::default();
        Ok(())
    }

    fn user(&self) -> Option<User> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    fn set_user(&self, user: &User) -> TodoResult<()> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).user = Some(user.clone());
        Ok(())
    }
}

/// Session persisted as a JSON document on disk.
///
/// The file is read once at open time and rewritten on every change; an
/// absent file is an empty session.
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    inner: RwLock<StoredSession>,
}

impl FileSession {
    pub fn open(path: impl AsRef<Path>) -> TodoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let stored = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                StoredSession::default()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            StoredSession::default()
        };
        debug!(path = %path.display(), logged_in = stored.access_token.is_some(), "Opened session file");

        Ok(Self {
            path,
            inner: RwLock::new(stored),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, change: impl FnOnce(&mut StoredSession)) -> TodoResult<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = inner.clone();
        change(&mut next);
        self.persist(&next)?;
        *inner = next;
        Ok(())
    }

    fn persist(&self, session: &StoredSession) -> TodoResult<()> {
        if session.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(session)?)?;
        Ok(())
    }
}

impl SessionProvider for FileSession {
    fn token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    fn set_session(&self, tokens: &AuthTokens) -> TodoResult<()> {
        self.update(|s| {
            s.access_token = Some(tokens.access.clone());
            s.refresh_token = Some(tokens.refresh.clone());
        })
    }

    fn clear_session(&self) -> TodoResult<()> {
        self.update(|s| *s = StoredSession::default())
    }

    fn user(&self) -> Option<User> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    fn set_user(&self, user: &User) -> TodoResult<()> {
        self.update(|s| s.user = Some(user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> AuthTokens {
        AuthTokens {
            access: "access-1".into(),
            refresh: "refresh-1".into(),
        }
    }

    fn user() -> User {
        User {
            id: 3,
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            address: None,
            contact_number: None,
            birthday: None,
            profile_image: None,
            bio: None,
        }
    }

    #[test]
    fn test_memory_session_lifecycle() {
        let session = MemorySession::new();
        assert_eq!(session.token(), None);

        session.set_session(&tokens()).unwrap();
        session.set_user(&user()).unwrap();
        assert_eq!(session.token().as_deref(), Some("access-1"));
        assert_eq!(session.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(session.user(), Some(user()));

        session.clear_session().unwrap();
        assert_eq!(session.token(), None);
        assert_eq!(session.user(), None);
    }

    #[test]
    fn test_file_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let session = FileSession::open(&path).unwrap();
        session.set_session(&tokens()).unwrap();
        session.set_user(&user()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[ACCESS_TOKEN_KEY], "access-1");
        assert_eq!(raw[REFRESH_TOKEN_KEY], "refresh-1");
        assert_eq!(raw[USER_KEY]["email"], "ada@example.com");

        let reopened = FileSession::open(&path).unwrap();
        assert_eq!(reopened.token().as_deref(), Some("access-1"));
        assert_eq!(reopened.user(), Some(user()));
    }

    #[test]
    fn test_file_session_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let session = FileSession::open(&path).unwrap();
        session.set_session(&tokens()).unwrap();
        assert!(path.exists());

        session.clear_session().unwrap();
        assert!(!path.exists());
        assert_eq!(FileSession::open(&path).unwrap().token(), None);
    }

    #[test]
    fn test_file_session_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileSession::open(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Local);
    }
}

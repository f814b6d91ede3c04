//! Session persistence for login state
//!
//! The resolver keeps exactly four values across requests: the CSRF `state`,
//! the last exchanged authorization `code`, the `access_token`, and the
//! `user_id`. They live together in `PersistedFields`; no other key can be
//! written because there is nowhere to put it.
//!
//! `SessionStore` is the external collaborator (a session backend). Two
//! implementations ship here: `MemoryStore` for single-process use and tests,
//! and `FileStore`, a JSON file written atomically via temp-file + rename.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Everything the resolver persists for one app in one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
}

impl PersistedFields {
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.code.is_none()
            && self.access_token.is_none()
            && self.user_id.is_none()
    }
}

/// Backend holding `PersistedFields` per namespace.
///
/// Saving an empty value must remove the namespace, so a cleared session
/// leaves nothing behind. Each call is atomic with respect to other calls.
pub trait SessionStore: Send + Sync {
    fn load<'a>(
        &'a self,
        namespace: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PersistedFields>> + Send + 'a>>;

    fn save<'a>(
        &'a self,
        namespace: &'a str,
        fields: PersistedFields,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, PersistedFields>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of namespaces holding at least one field.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl SessionStore for MemoryStore {
    fn load<'a>(
        &'a self,
        namespace: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PersistedFields>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.get(namespace).cloned().unwrap_or_default())
        })
    }

    fn save<'a>(
        &'a self,
        namespace: &'a str,
        fields: PersistedFields,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if fields.is_empty() {
                state.remove(namespace);
            } else {
                state.insert(namespace.to_string(), fields);
            }
            Ok(())
        })
    }
}

/// JSON file store.
///
/// The Mutex serializes all writes; the whole map is rewritten on every save.
/// File permissions are 0600 since the file holds access tokens.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, PersistedFields>>,
}

impl FileStore {
    /// Load sessions from `path`, creating an empty file if it doesn't exist.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let sessions: HashMap<String, PersistedFields> = serde_json::from_str(&contents)
                .map_err(|e| Error::Store(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), sessions = sessions.len(), "loaded sessions");
            sessions
        } else {
            info!(path = %path.display(), "session file not found, starting empty");
            let sessions = HashMap::new();
            write_atomic(&path, &sessions).await?;
            sessions
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }
}

impl SessionStore for FileStore {
    fn load<'a>(
        &'a self,
        namespace: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PersistedFields>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.get(namespace).cloned().unwrap_or_default())
        })
    }

    fn save<'a>(
        &'a self,
        namespace: &'a str,
        fields: PersistedFields,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if fields.is_empty() {
                if state.remove(namespace).is_none() {
                    return Ok(());
                }
            } else {
                state.insert(namespace.to_string(), fields);
            }
            write_atomic(&self.path, &state).await
        })
    }
}

/// Write sessions to a file atomically (temp file in the same directory, then rename).
async fn write_atomic(path: &Path, data: &HashMap<String, PersistedFields>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Store(format!("serializing sessions: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".sessions.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted sessions");
    Ok(())
}

/// One namespace of a `SessionStore`, as seen by a single request.
///
/// Reads always go to the store: another request may have changed the
/// session since this one started.
#[derive(Clone)]
pub struct SessionData {
    store: Arc<dyn SessionStore>,
    namespace: String,
}

impl SessionData {
    pub fn new(store: Arc<dyn SessionStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn load(&self) -> Result<PersistedFields> {
        self.store.load(&self.namespace).await
    }

    /// Read, modify and write back the persisted fields.
    pub async fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut PersistedFields) + Send,
    {
        let mut fields = self.load().await?;
        apply(&mut fields);
        self.store.save(&self.namespace, fields).await
    }

    /// Drop all four fields in a single write.
    pub async fn clear_all(&self) -> Result<()> {
        debug!(namespace = %self.namespace, "clearing persisted session fields");
        self.store
            .save(&self.namespace, PersistedFields::default())
            .await
    }
}

//! Durable client state.
//!
//! Only whitelisted slices are written: guest likes, the cart snapshot, form
//! drafts, the signed-in session and notifications. Everything else is
//! rebuilt from the API on start.
//!
//! The file holds one JSON object keyed by [`ROOT_KEY`], carrying a version
//! number. A file written by another version is treated as empty.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use storefront_sync_core::{Cart, Notification, ProductId, User};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::PersistError;
use crate::store::FormDrafts;

/// Namespace key of the persisted document.
pub const ROOT_KEY: &str = "persist:root";

/// Current layout version.
pub const STATE_VERSION: u32 = 1;

/// Signed-in user and their access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: User,
    #[serde(with = "secret_string")]
    pub access_token: SecretString,
}

/// The persisted slices of [`AppState`](crate::store::AppState).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub guest_liked: Vec<ProductId>,
    #[serde(default)]
    pub cart: Option<Cart>,
    #[serde(default)]
    pub drafts: FormDrafts,
    #[serde(default)]
    pub session: Option<PersistedSession>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub notification_limit: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct Versioned<T> {
    version: u32,
    state: T,
}

#[derive(Serialize, Deserialize)]
struct Document<T> {
    #[serde(rename = "persist:root")]
    root: Versioned<T>,
}

/// JSON file backing [`PersistedState`].
///
/// Clones share one write lock, so saves never interleave.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStorage {
    /// Storage at `path`. Nothing is touched until the first load or save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// File location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored state.
    ///
    /// Returns `None` if the file does not exist or was written by another
    /// layout version.
    ///
    /// # Errors
    ///
    /// Returns `PersistError::Io` if the file cannot be read and
    /// `PersistError::Json` if it is not a valid document.
    pub async fn load(&self) -> Result<Option<PersistedState>, PersistError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persisted state");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let document: Document<serde_json::Value> = serde_json::from_slice(&bytes)?;
        if document.root.version != STATE_VERSION {
            warn!(
                path = %self.path.display(),
                found = document.root.version,
                expected = STATE_VERSION,
                "Persisted state has a different version, ignoring"
            );
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(document.root.state)?))
    }

    /// Write the state atomically (temporary file, then rename).
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the directory, file or rename fails.
    pub async fn save(&self, state: &PersistedState) -> Result<(), PersistError> {
        let _guard = self.write_lock.lock().await;
        self.write(state).await
    }

    /// Take a snapshot and write it while holding the write lock.
    ///
    /// Saves complete in the order their snapshots were taken, so the file
    /// always ends up with the newest one.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the directory, file or rename fails.
    pub async fn save_with<F, Fut>(&self, snapshot: F) -> Result<(), PersistError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PersistedState>,
    {
        let _guard = self.write_lock.lock().await;
        let state = snapshot().await;
        self.write(&state).await
    }

    async fn write(&self, state: &PersistedState) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let document = Document {
            root: Versioned {
                version: STATE_VERSION,
                state,
            },
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(path = %self.path.display(), size = bytes.len(), "Persisted state");
        Ok(())
    }

    /// Delete the stored state. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `PersistError::Io` if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), PersistError> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secret: &SecretString, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(secret.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
        String::deserialize(d).map(SecretString::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn sample() -> PersistedState {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "email": "ada@example.com",
        }))
        .unwrap();
        PersistedState {
            guest_liked: vec![ProductId::from("p1")],
            drafts: FormDrafts {
                login_email: Some("ada@example.com".to_string()),
                register: None,
            },
            session: Some(PersistedSession {
                user,
                access_token: SecretString::from("token-1"),
            }),
            notification_limit: Some(25),
            ..PersistedState::default()
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/dir/state.json"));
        storage.save(&sample()).await.unwrap();

        let loaded = storage.load().await.unwrap().unwrap();
        assert_eq!(loaded.guest_liked, vec![ProductId::from("p1")]);
        assert_eq!(loaded.notification_limit, Some(25));
        let session = loaded.session.unwrap();
        assert_eq!(session.access_token.expose_secret(), "token-1");
        assert_eq!(session.user.email, "ada@example.com");
        assert!(!storage.tmp_path().exists());
    }

    #[tokio::test]
    async fn test_document_is_namespaced_and_versioned() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));
        storage.save(&PersistedState::default()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(storage.path()).unwrap()).unwrap();
        assert_eq!(raw[ROOT_KEY]["version"], STATE_VERSION);
        assert!(raw[ROOT_KEY]["state"]["guestLiked"].is_array());
    }

    #[tokio::test]
    async fn test_other_version_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"persist:root":{"version":99,"state":{}}}"#).unwrap();
        assert!(FileStorage::new(path).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileStorage::new(path).load().await,
            Err(PersistError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_saves_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));

        let saves: Vec<_> = (0..64)
            .map(|n| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    let state = PersistedState {
                        guest_liked: vec![ProductId::new(format!("p{n}"))],
                        ..PersistedState::default()
                    };
                    storage.save(&state).await
                })
            })
            .collect();
        for save in saves {
            save.await.unwrap().unwrap();
        }

        let loaded = storage.load().await.unwrap().unwrap();
        assert_eq!(loaded.guest_liked.len(), 1);
        assert!(!storage.tmp_path().exists());
    }

    #[tokio::test]
    async fn test_save_with_keeps_the_last_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let saves: Vec<_> = (0..16)
            .map(|_| {
                let storage = storage.clone();
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    storage
                        .save_with(|| async move {
                            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            PersistedState {
                                notification_limit: Some(n),
                                ..PersistedState::default()
                            }
                        })
                        .await
                })
            })
            .collect();
        for save in saves {
            save.await.unwrap().unwrap();
        }

        let loaded = storage.load().await.unwrap().unwrap();
        assert_eq!(loaded.notification_limit, Some(15));
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));
        storage.clear().await.unwrap();
        storage.save(&PersistedState::default()).await.unwrap();
        storage.clear().await.unwrap();
        assert!(!storage.path().exists());
    }
}

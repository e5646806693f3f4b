use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::ClientConfig;
use crate::errors::ParloError;

/// Fixed key under which the bearer credential is persisted.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Key/value credential persistence.
///
/// Absence of a key is `Ok(None)`, never an error. Implementations may touch
/// OS-level secure storage, so every operation is asynchronous.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ParloError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), ParloError>;
    async fn remove(&self, key: &str) -> Result<(), ParloError>;
}

/// File-backed store for platforms without an OS keychain binding.
///
/// Keeps a JSON object in `credentials.json` under the data dir, mirrored in
/// memory. The mobile shells sandbox the data dir per app.
pub struct FileCredentialStore {
    file_path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileCredentialStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let file_path = data_dir.as_ref().join("credentials.json");
        let entries = Self::load(&file_path);
        Self {
            file_path,
            entries: Mutex::new(entries),
        }
    }

    fn load(path: &Path) -> HashMap<String, String> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<(), ParloError> {
        if let Some(parent) = self.file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ParloError::Storage(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| ParloError::Storage(e.to_string()))?;
        tokio::fs::write(&self.file_path, json)
            .await
            .map_err(|e| ParloError::Storage(e.to_string()))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ParloError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ParloError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), ParloError> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&entries).await
    }
}

/// Desktop store backed by the OS keychain (Keychain/libsecret/Credential
/// Manager). Keyring calls block, so they run on the blocking pool.
#[cfg(not(any(target_os = "android", target_os = "ios")))]
pub struct KeyringCredentialStore {
    service: String,
}

#[cfg(not(any(target_os = "android", target_os = "ios")))]
impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(service: &str, key: &str) -> Result<keyring::Entry, ParloError> {
        keyring::Entry::new(service, key).map_err(|e| ParloError::Storage(e.to_string()))
    }
}

#[cfg(not(any(target_os = "android", target_os = "ios")))]
#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ParloError> {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Self::entry(&service, &key)?;
            match entry.get_password() {
                Ok(value) => Ok(Some(value)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(ParloError::Storage(e.to_string())),
            }
        })
        .await
        .map_err(|e| ParloError::Storage(e.to_string()))?
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ParloError> {
        let service = self.service.clone();
        let key = key.to_string();
        let value = value.to_string();
        tokio::task::spawn_blocking(move || {
            Self::entry(&service, &key)?
                .set_password(&value)
                .map_err(|e| ParloError::Storage(e.to_string()))
        })
        .await
        .map_err(|e| ParloError::Storage(e.to_string()))?
    }

    async fn remove(&self, key: &str) -> Result<(), ParloError> {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Self::entry(&service, &key)?;
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(ParloError::Storage(e.to_string())),
            }
        })
        .await
        .map_err(|e| ParloError::Storage(e.to_string()))?
    }
}

/// In-process store for tests and ephemeral profiles.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ParloError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ParloError> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ParloError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Pick the storage backend for the current platform, once.
///
/// Mobile targets persist next to the app data dir; desktop targets go
/// through the OS keychain.
pub fn platform_store(config: &ClientConfig) -> std::sync::Arc<dyn CredentialStore> {
    #[cfg(any(target_os = "android", target_os = "ios"))]
    {
        std::sync::Arc::new(FileCredentialStore::new(&config.data_dir))
    }
    #[cfg(not(any(target_os = "android", target_os = "ios")))]
    {
        let _ = &config.data_dir;
        std::sync::Arc::new(KeyringCredentialStore::new("parlo"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dir = temp_dir();
        let store = FileCredentialStore::new(dir.path());
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = temp_dir();
        let store = FileCredentialStore::new(dir.path());
        store.set(AUTH_TOKEN_KEY, "tok123").await.unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap().as_deref(), Some("tok123"));
    }

    #[tokio::test]
    async fn value_survives_reopen() {
        let dir = temp_dir();
        {
            let store = FileCredentialStore::new(dir.path());
            store.set(AUTH_TOKEN_KEY, "tok123").await.unwrap();
        }
        let store = FileCredentialStore::new(dir.path());
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap().as_deref(), Some("tok123"));
    }

    #[tokio::test]
    async fn remove_deletes_and_is_idempotent() {
        let dir = temp_dir();
        let store = FileCredentialStore::new(dir.path());
        store.set(AUTH_TOKEN_KEY, "tok123").await.unwrap();
        store.remove(AUTH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
        store.remove(AUTH_TOKEN_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = temp_dir();
        std::fs::write(dir.path().join("credentials.json"), "not json!!!").unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
        store.set(AUTH_TOKEN_KEY, "tok").await.unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap().as_deref(), Some("tok"));
        store.remove(AUTH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
    }
}

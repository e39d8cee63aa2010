use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::KvStore;
use crate::error::StoreError;

/// Single JSON document on disk holding every key, the server-side stand-in
/// for browser local storage.
///
/// Each key is stored as its serialized text so one corrupt entry does not
/// take the rest of the document down with it. Writes land in a sibling temp
/// file that is fsynced and renamed over the original, which makes `set_many`
/// atomic. A document that cannot be parsed at all is moved aside on open,
/// never overwritten.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    let aside = Self::quarantine(&path).await?;
                    warn!(
                        "Store file {} is unreadable ({}), moved to {} and starting empty",
                        path.display(),
                        e,
                        aside.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Opened file store {} with {} keys", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renames `path` to `<path>.corrupt-<millis>` so the old bytes survive.
    async fn quarantine(path: &Path) -> Result<PathBuf, StoreError> {
        let mut aside = path.as_os_str().to_os_string();
        aside.push(format!(".corrupt-{}", chrono::Utc::now().timestamp_millis()));
        let aside = PathBuf::from(aside);
        tokio::fs::rename(path, &aside).await?;
        Ok(aside)
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Serialize {
            key: self.path.display().to_string(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(body.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;

        sync_parent(&self.path).await
    }

    fn encode(key: &str, value: &Value) -> Result<String, StoreError> {
        serde_json::to_string(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })
    }
}

/// Persists a rename by syncing the containing directory.
#[cfg(unix)]
async fn sync_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::File::open(dir).await?.sync_all().await?;
    }
    Ok(())
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let guard = self.entries.lock().await;
        let Some(raw) = guard.get(key) else {
            return Ok(None);
        };
        serde_json::from_str(raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.set_many(vec![(key.to_string(), value)]).await
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError> {
        let mut guard = self.entries.lock().await;
        let mut next = guard.clone();
        for (key, value) in &entries {
            next.insert(key.clone(), Self::encode(key, value)?);
        }
        self.flush(&next).await?;
        *guard = next;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(&path).await.unwrap();
        store.set("codes:global_used", json!(["ObaiLovesAi"])).await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("codes:global_used").await.unwrap(),
            Some(json!(["ObaiLovesAi"]))
        );
    }

    #[tokio::test]
    async fn corrupt_entry_reports_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{"registrations":"[{broken"}"#).unwrap();

        let store = FileStore::open(&path).await.unwrap();
        let err = store.get("registrations").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        let regs: Vec<Value> = crate::store::load_or_default(&store, "registrations").await.unwrap();
        assert!(regs.is_empty());
    }

    #[tokio::test]
    async fn unreadable_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{\"codes:global_used\": truncated").unwrap();

        let store = FileStore::open(&path).await.unwrap();
        assert_eq!(store.get("codes:global_used").await.unwrap(), None);
        store.set("registrations", json!([])).await.unwrap();

        let aside: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|name| name.starts_with("store.json.corrupt-"))
            .collect();
        assert_eq!(aside.len(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(&aside[0])).unwrap(),
            "{\"codes:global_used\": truncated"
        );
    }

    #[tokio::test]
    async fn flush_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(&path).await.unwrap();
        store.set("codes:global_used", json!(["ObaiLovesAi"])).await.unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("store.json.tmp").exists());
    }
}

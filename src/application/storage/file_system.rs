use std::path::Path;
use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use super::KeyValueStore;
use super::StorageError;

const TEMP_SUFFIX: &str = ".tmp";

/// One file per key in a single directory.
///
/// File names are the hex encoding of the key. Values are written to a
/// temporary file and renamed into place, so a reader never observes a
/// partial value. Files are created readable by the owner only.
#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl FileStore {
    /// Open `directory`, creating it if needed.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(io_error(&directory))?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(hex::encode(key))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}", hex::encode(key), TEMP_SUFFIX))
    }

    async fn write_temp(&self, key: &str, value: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.temp_path_for(key);
        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).truncate(true).write(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&path).await.map_err(io_error(&path))?;
        file.write_all(value).await.map_err(io_error(&path))?;
        file.sync_all().await.map_err(io_error(&path))?;
        Ok(path)
    }

    async fn commit(&self, key: &str, temp_path: &Path) -> Result<(), StorageError> {
        let path = self.path_for(key);
        tokio::fs::rename(temp_path, &path)
            .await
            .map_err(io_error(&path))
    }

    async fn discard(paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!("could not remove temporary file {}: {e}", path.display());
            }
        }
    }
}

impl FileStore {
    async fn roll_back(&self, committed: Vec<(&str, Option<Vec<u8>>)>) {
        for (key, previous) in committed.into_iter().rev() {
            let restored = match previous {
                Some(value) => self.save(key, &value).await,
                None => self.remove(key).await,
            };
            if let Err(e) = restored {
                tracing::warn!("could not restore '{key}' after a failed batch: {e}");
            }
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn save(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let temp_path = self.write_temp(key, value).await?;
        self.commit(key, &temp_path).await
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_error(&path)(e)),
            _ => Ok(()),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(io_error(&self.directory))?;
        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(io_error(&self.directory))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            let Some(key) = hex::decode(name)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Every value is written to its temporary file before any is renamed
    /// into place. A failure while writing leaves all keys unchanged; a
    /// failure while renaming restores the keys already renamed.
    ///
    /// The restore is best effort: if it fails too, the batch is left
    /// partially applied and a warning is logged.
    async fn save_batch(&self, batch: Vec<(String, Vec<u8>)>) -> Result<(), StorageError> {
        let mut staged = Vec::with_capacity(batch.len());
        for (key, value) in &batch {
            match self.write_temp(key, value).await {
                Ok(temp_path) => staged.push(temp_path),
                Err(e) => {
                    Self::discard(&staged).await;
                    return Err(e);
                }
            }
        }
        let mut committed = Vec::with_capacity(batch.len());
        for (i, ((key, _), temp_path)) in batch.iter().zip(&staged).enumerate() {
            let result = match self.load(key).await {
                Ok(previous) => self.commit(key, temp_path).await.map(|()| previous),
                Err(e) => Err(e),
            };
            match result {
                Ok(previous) => committed.push((key.as_str(), previous)),
                Err(e) => {
                    Self::discard(&staged[i..]).await;
                    self.roll_back(committed).await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        for key in self.keys("").await? {
            self.remove(&key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.save("account:abc", b"record").await.unwrap();

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(Some(b"record".to_vec()), reopened.load("account:abc").await.unwrap());
        assert_eq!(vec!["account:abc".to_string()], reopened.keys("account:").await.unwrap());
    }

    #[tokio::test]
    async fn missing_key_loads_none_and_removes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(None, store.load("nothing").await.unwrap());
        store.remove("nothing").await.unwrap();
    }

    #[tokio::test]
    async fn batch_then_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested")).await.unwrap();
        store
            .save_batch(vec![
                ("a".to_string(), b"1".to_vec()),
                ("b".to_string(), b"2".to_vec()),
            ])
            .await
            .unwrap();
        assert_eq!(2, store.keys("").await.unwrap().len());
        store.clear().await.unwrap();
        assert!(store.keys("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_restores_renamed_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.save("a", b"old").await.unwrap();
        // a directory where key "b" would land cannot be read or replaced
        std::fs::create_dir(dir.path().join(hex::encode("b"))).unwrap();

        let batch = vec![
            ("a".to_string(), b"new".to_vec()),
            ("b".to_string(), b"2".to_vec()),
            ("c".to_string(), b"3".to_vec()),
        ];
        assert!(store.save_batch(batch).await.is_err());

        assert_eq!(Some(b"old".to_vec()), store.load("a").await.unwrap());
        assert_eq!(None, store.load("c").await.unwrap());
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| {
                let name = entry.as_ref().unwrap().file_name();
                name.to_string_lossy().ends_with(TEMP_SUFFIX)
            })
            .count();
        assert_eq!(0, leftovers);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.save("master_seed", b"blob").await.unwrap();
        let metadata = std::fs::metadata(dir.path().join(hex::encode("master_seed"))).unwrap();
        assert_eq!(0o600, metadata.permissions().mode() & 0o777);
    }
}

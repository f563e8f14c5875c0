use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{DataFrameStorage, StorageUsage};
use crate::error::{FrameError, FrameResult};

const FRAME_EXT: &str = "arrow";

/// Device-local frame store: one `<key>.arrow` file per frame under a root directory.
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
}

/// File stem for a storage key; percent-encoded so `list()` can recover the key exactly.
fn key_to_stem(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

fn stem_to_key(stem: &str) -> Option<String> {
    urlencoding::decode(stem).ok().map(|k| k.into_owned())
}

impl FsStorage {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> FrameResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            FrameError::storage("storage_open", format!("cannot create '{}': {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root_path(&self) -> &Path { &self.root }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key_to_stem(key), FRAME_EXT))
    }

    async fn frame_files(&self) -> FrameResult<Vec<(String, PathBuf)>> {
        let mut out = Vec::new();
        let mut rd = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FRAME_EXT) { continue; }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            if let Some(key) = stem_to_key(stem) {
                out.push((key, path));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

#[async_trait]
impl DataFrameStorage for FsStorage {
    async fn save(&self, id: &str, bytes: &[u8]) -> FrameResult<()> {
        let path = self.path_for(id);
        // one temp file per writer; concurrent saves of a key must not share it
        let tmp = self.root.join(format!("{}.{}.{}.tmp", key_to_stem(id), FRAME_EXT, Uuid::new_v4().simple()));
        debug!(target: "framequery::storage", "fs.save: key='{}' path='{}' bytes={}", id, path.display(), bytes.len());
        let written = match tokio::fs::write(&tmp, bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn load(&self, id: &str) -> FrameResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: &str) -> FrameResult<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => {
                debug!(target: "framequery::storage", "fs.delete: key='{}' removed", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, id: &str) -> FrameResult<bool> {
        Ok(tokio::fs::try_exists(self.path_for(id)).await?)
    }

    async fn list(&self) -> FrameResult<Vec<String>> {
        Ok(self.frame_files().await?.into_iter().map(|(k, _)| k).collect())
    }

    async fn usage(&self) -> FrameResult<StorageUsage> {
        let files = self.frame_files().await?;
        let mut total = 0u64;
        for (_, path) in &files {
            total += tokio::fs::metadata(path).await?.len();
        }
        Ok(StorageUsage { count: files.len(), total_bytes: Some(total) })
    }

    fn backend_name(&self) -> &'static str { "fs" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_escaping_is_reversible() {
        for key in ["8f14e45f-ceea-467a-9575-2c6b4f1e8c11", "a/b c", "s3:bucket/key.arrow", "ünï"] {
            let stem = key_to_stem(key);
            assert!(!stem.contains('/'));
            assert_eq!(stem_to_key(&stem).as_deref(), Some(key));
        }
    }

    #[test]
    fn stem_keeps_dots_and_hides_separators() {
        assert_eq!(key_to_stem("s3:bucket/key.arrow"), "s3%3Abucket%2Fkey.arrow");
        let store = FsStorage { root: PathBuf::from("/frames") };
        let path = store.path_for("s3:bucket/key.arrow");
        assert_eq!(path.file_stem().and_then(|s| s.to_str()), Some("s3%3Abucket%2Fkey.arrow"));
    }

    #[test]
    fn non_utf8_stem_is_ignored() {
        assert_eq!(stem_to_key("abc%FF"), None);
    }

    #[tokio::test]
    async fn concurrent_saves_of_one_key_all_land() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsStorage::open(tmp.path()).unwrap();
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 4096]).collect();
        let results = futures::future::join_all(payloads.iter().map(|p| store.save("shared", p))).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let stored = store.load("shared").await.unwrap().unwrap();
        assert!(payloads.contains(&stored));
        assert_eq!(store.list().await.unwrap(), vec!["shared".to_string()]);
        let leftovers = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}

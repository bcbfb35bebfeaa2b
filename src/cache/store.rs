//! Durable key-value tier: one JSON document per normalized term.

use super::CacheError;
use async_trait::async_trait;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tokio::fs;

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn save(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;
}

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Platform cache directory for this application.
    pub fn default_dir() -> Result<PathBuf, CacheError> {
        let dirs = ProjectDirs::from("org", "dxsearch", "dxsearch").ok_or(CacheError::NoCacheDir)?;
        Ok(dirs.cache_dir().join("lookups"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        // write-then-rename so a reader never sees half a document
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

// Sanitizing alone maps "A.0" and "A 0" to the same name, so a hash of the raw key is appended.
fn file_name(key: &str) -> String {
    let readable: String = key
        .chars()
        .take(48)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let digest = blake3::hash(key.as_bytes()).to_hex();
    format!("{}-{}.json", readable, &digest.as_str()[..12])
}

//! Key-value slots holding a serialized cart

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::StoreError;

/// Durable client-local slot storage for the cart ledger.
#[async_trait]
pub trait CartStorage: Send + Sync {
    async fn load(&self, slot: &str) -> Result<Option<String>, StoreError>;
    async fn save(&self, slot: &str, raw: &str) -> Result<(), StoreError>;
    async fn remove(&self, slot: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryCartStorage {
    slots: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CartStorage for MemoryCartStorage {
    async fn load(&self, slot: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.lock().get(slot).cloned())
    }

    async fn save(&self, slot: &str, raw: &str) -> Result<(), StoreError> {
        self.slots.lock().insert(slot.to_string(), raw.to_string());
        Ok(())
    }

    async fn remove(&self, slot: &str) -> Result<(), StoreError> {
        self.slots.lock().remove(slot);
        Ok(())
    }
}

/// One JSON file per slot under a directory.
#[derive(Clone, Debug)]
pub struct FileCartStorage {
    dir: PathBuf,
}

impl FileCartStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn dir(&self) -> &Path { &self.dir }

    /// Percent-encodes every byte outside `[A-Za-z0-9_-]`, so distinct
    /// slots never share a file.
    fn path_for(&self, slot: &str) -> PathBuf {
        let mut name = String::with_capacity(slot.len() + 5);
        for byte in slot.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
                name.push(char::from(byte));
            } else {
                let _ = write!(name, "%{byte:02X}");
            }
        }
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl CartStorage for FileCartStorage {
    async fn load(&self, slot: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(slot)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes through a temporary file so a crash never leaves half a cart.
    async fn save(&self, slot: &str, raw: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(slot);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, slot: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(slot)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

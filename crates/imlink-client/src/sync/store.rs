//! Cursor persistence.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use imlink_core::error::{ImlinkError, Result};

use super::engine::Cursors;

/// Where sync cursors live between connects (and process restarts).
#[async_trait]
pub trait CursorStore: Send + Sync + 'static {
    async fn load(&self) -> Result<Cursors>;
    async fn save(&self, cursors: &Cursors) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    inner: Mutex<Cursors>,
}

impl MemoryCursorStore {
    pub fn new(initial: Cursors) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }

    pub async fn snapshot(&self) -> Cursors {
        self.inner.lock().await.clone()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Cursors> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, cursors: &Cursors) -> Result<()> {
        *self.inner.lock().await = cursors.clone();
        Ok(())
    }
}

/// JSON file store. Writes go to a sibling temp file first, then rename.
#[derive(Debug)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<Cursors> {
        let s = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Cursors::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&s)
            .map_err(|e| ImlinkError::BadConfig(format!("invalid cursor file: {e}")))
    }

    async fn save(&self, cursors: &Cursors) -> Result<()> {
        let json = serde_json::to_vec_pretty(cursors)
            .map_err(|e| ImlinkError::Internal(format!("encode cursors failed: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

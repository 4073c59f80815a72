use std::path::{Path, PathBuf};

use tracing::debug;

use super::TrackReference;
use crate::Res;

/// JSON file of encoded track references, e.g. a saved queue.
pub struct TrackReferenceStore {
    path: PathBuf,
}

impl TrackReferenceStore {
    /// Store at `<data_local_dir>/mirrorsrc/cache/track-references.json`.
    pub fn new() -> Self {
        Self::with_path(Self::default_path())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("mirrorsrc/cache/track-references.json");
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file loads as an empty list.
    pub async fn load(&self) -> Res<Vec<TrackReference>> {
        if !self.path.is_file() {
            debug!(path = %self.path.display(), "no stored references");
            return Ok(Vec::new());
        }
        let json = async_fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&json)?)
    }

    pub async fn persist(&self, references: &[TrackReference]) -> Res<()> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(references)?;
        async_fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), count = references.len(), "stored references");
        Ok(())
    }

    pub async fn clear(&self) -> Res<()> {
        if self.path.is_file() {
            async_fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

impl Default for TrackReferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

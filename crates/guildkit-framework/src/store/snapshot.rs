//! Persisted snapshot of the global configuration.
//!
//! The snapshot is a best-effort copy written on an interval and at shutdown.
//! There is no journal: whatever changed since the last save is lost on a
//! crash.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use guildkit_core::UserId;

use super::record::GuildRecord;
use crate::error::{StoreError, StoreResult};

/// Process-wide configuration as it is persisted.
///
/// The prefix cache is derived state and is deliberately absent here.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Authentication token for the gateway.  Opaque to the core.
    #[serde(default)]
    pub credentials: String,

    /// The single privileged identity, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<UserId>,

    /// One record per community, in creation order.
    #[serde(default)]
    pub guilds: Vec<GuildRecord>,
}

impl GlobalConfig {
    /// Encodes the snapshot.
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decodes a snapshot.
    pub fn from_bytes(bytes: &[u8]) -> StoreResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("credentials", &"<redacted>")
            .field("operator_id", &self.operator_id)
            .field("guilds", &self.guilds.len())
            .finish()
    }
}

/// Reads and writes snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot.  A missing or undecodable file is an error.
    pub async fn load(&self) -> StoreResult<GlobalConfig> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Missing(self.path.clone()));
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        let config = GlobalConfig::from_bytes(&bytes)?;
        info!(
            path = %self.path.display(),
            guilds = config.guilds.len(),
            "Snapshot loaded"
        );
        Ok(config)
    }

    /// Writes the snapshot, replacing the previous file atomically.
    pub async fn save(&self, config: &GlobalConfig) -> StoreResult<()> {
        let bytes = config.to_bytes()?;
        write_atomically(&self.path, &bytes).await?;
        debug!(
            path = %self.path.display(),
            guilds = config.guilds.len(),
            "Snapshot saved"
        );
        Ok(())
    }
}

/// Writes `bytes` to a sibling temporary file and renames it over `path`.
pub(crate) async fn write_atomically(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildkit_core::GuildId;

    fn sample() -> GlobalConfig {
        let mut record = GuildRecord::new(GuildId(10), "!");
        record.grant("manage-prefix", UserId(3));
        GlobalConfig {
            credentials: "secret-token".into(),
            operator_id: Some(UserId(1)),
            guilds: vec![record, GuildRecord::new(GuildId(11), ".")],
        }
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_corrupt_bytes_are_rejected() {
        let err = GlobalConfig::from_bytes(b"{ not json").unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested").join("snapshot.json"));

        file.save(&sample()).await.unwrap();
        let loaded = file.load().await.unwrap();

        assert_eq!(loaded, sample());
        assert!(!dir.path().join("nested").join("snapshot.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("absent.json"));
        assert!(matches!(file.load().await, Err(StoreError::Missing(_))));
    }
}

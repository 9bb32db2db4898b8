//! JSON file storage
//!
//! The snapshot is written to a sibling temporary file which is synced and then renamed over the
//! target, so a crash mid-write leaves the previous snapshot in place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cashu_wallet_common::database::Error;
use cashu_wallet_common::{WalletState, WalletStorage};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Stores the snapshot as a JSON file
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create new [`FileStorage`] writing to `path`
    ///
    /// Missing parent directories are created on the first write.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl WalletStorage for FileStorage {
    async fn get(&self) -> Result<Option<WalletState>, Error> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn set(&self, state: &WalletState) -> Result<(), Error> {
        let bytes = serde_json::to_vec_pretty(state)?;

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await?;
        tracing::trace!("Wrote wallet state to {}", self.path.display());

        Ok(())
    }
}

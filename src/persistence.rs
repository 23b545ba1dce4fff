// Copyright 2026 ThreeFold Tech
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Durable storage of the two advisory checkpoints: the last-processed
//! Stellar paging token and the last-processed chain-L1 block height.
//!
//! Both values are advisory only (`spec.md` §3) — correctness depends on the
//! on-chain idempotency checks, not on this file. A crash between submitting
//! an extrinsic and saving the checkpoint just replays the observation, which
//! the idempotency guards absorb.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt};
use tracing::warn;

use crate::model::PersistencySnapshot;

#[async_trait]
pub trait Persistency: Send + Sync {
    async fn get_height(&self) -> PersistencySnapshot;
    async fn save_stellar_cursor(&self, token: &str) -> anyhow::Result<()>;
    async fn save_height(&self, height: u64) -> anyhow::Result<()>;
}

/// JSON checkpoint file, written atomically via write-to-temp + rename.
pub struct FilePersistency {
    path: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct OnDisk {
    stellar_cursor: String,
    height: u64,
}

impl FilePersistency {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Option<OnDisk> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).ok(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read persistency file, using defaults");
                None
            }
        }
    }

    async fn write(&self, snapshot: OnDisk) -> anyhow::Result<()> {
        write_atomic(&self.path, &serde_json::to_vec_pretty(&snapshot)?).await
    }
}

#[async_trait]
impl Persistency for FilePersistency {
    async fn get_height(&self) -> PersistencySnapshot {
        match self.read().await {
            Some(OnDisk { stellar_cursor, height }) => PersistencySnapshot { stellar_cursor, height },
            None => PersistencySnapshot::default(),
        }
    }

    async fn save_stellar_cursor(&self, token: &str) -> anyhow::Result<()> {
        let mut current = self.read().await.unwrap_or(OnDisk { stellar_cursor: String::new(), height: 0 });
        current.stellar_cursor = token.to_string();
        self.write(current).await
    }

    async fn save_height(&self, height: u64) -> anyhow::Result<()> {
        let mut current = self.read().await.unwrap_or(OnDisk { stellar_cursor: String::new(), height: 0 });
        current.height = height;
        self.write(current).await
    }
}

/// Write `contents` to `path`, durable against a crash mid-write: write to a
/// sibling temp file, fsync it, then rename over the target (rename is atomic
/// on the same filesystem).
async fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A unique path under the OS temp dir, without pulling in `tempfile`.
    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tfchain-stellar-bridge-test-{name}-{:?}", std::thread::current().id()))
    }

    #[tokio::test]
    async fn missing_file_reads_as_zero_valued_default() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path).await;

        let persistency = FilePersistency::new(path);
        let snapshot = persistency.get_height().await;

        assert_eq!(snapshot.stellar_cursor, "");
        assert_eq!(snapshot.height, 0);
    }

    #[tokio::test]
    async fn save_and_read_round_trips() {
        let path = temp_path("roundtrip");
        let _ = fs::remove_file(&path).await;

        let persistency = FilePersistency::new(path.clone());
        persistency.save_stellar_cursor("cursor-1").await.unwrap();
        persistency.save_height(42).await.unwrap();

        let snapshot = persistency.get_height().await;
        assert_eq!(snapshot.stellar_cursor, "cursor-1");
        assert_eq!(snapshot.height, 42);

        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn save_height_preserves_previously_saved_cursor() {
        let path = temp_path("preserve-cursor");
        let _ = fs::remove_file(&path).await;

        let persistency = FilePersistency::new(path.clone());
        persistency.save_stellar_cursor("cursor-7").await.unwrap();
        persistency.save_height(7).await.unwrap();

        let snapshot = persistency.get_height().await;
        assert_eq!(snapshot.stellar_cursor, "cursor-7");
        assert_eq!(snapshot.height, 7);

        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn write_is_atomic_and_leaves_no_temp_file_behind() {
        let path = temp_path("atomic");
        let _ = fs::remove_file(&path).await;

        let persistency = FilePersistency::new(path.clone());
        persistency.save_stellar_cursor("cursor-atomic").await.unwrap();

        assert!(fs::metadata(&path).await.is_ok());
        assert!(fs::metadata(path.with_extension("tmp")).await.is_err());

        fs::remove_file(&path).await.unwrap();
    }
}

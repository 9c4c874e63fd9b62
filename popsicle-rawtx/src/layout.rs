use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::Network, error::Result};

/// On-disk state for one network.
///
/// ```text
/// <root>/priv/<network>/payment.{vkey,skey,addr}
/// <root>/priv/<network>/protocol.json
/// <root>/priv/<network>/tokens/<name>/...
/// <root>/priv/<network>/nfts/<name>/...
/// <root>/tmp/<network>/<operation>-<uuid>.{raw,signed}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    priv_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>, network: Network) -> Self {
        let root = root.into();
        Self {
            priv_dir: root.join("priv").join(network.name()),
            tmp_dir: root.join("tmp").join(network.name()),
        }
    }

    pub fn priv_dir(&self) -> &Path {
        &self.priv_dir
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub fn payment_vkey(&self) -> PathBuf {
        self.priv_dir.join("payment.vkey")
    }

    pub fn payment_skey(&self) -> PathBuf {
        self.priv_dir.join("payment.skey")
    }

    pub fn payment_addr(&self) -> PathBuf {
        self.priv_dir.join("payment.addr")
    }

    pub fn protocol_params(&self) -> PathBuf {
        self.priv_dir.join("protocol.json")
    }

    pub fn tokens_dir(&self) -> PathBuf {
        self.priv_dir.join("tokens")
    }

    pub fn nfts_dir(&self) -> PathBuf {
        self.priv_dir.join("nfts")
    }

    /// Callers validate `name` as an asset name first, which rules out separators.
    pub fn token_dir(&self, name: &str) -> PathBuf {
        self.tokens_dir().join(name)
    }

    pub fn nft_dir(&self, name: &str) -> PathBuf {
        self.nfts_dir().join(name)
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.tokens_dir(), self.nfts_dir(), self.tmp_dir.clone()] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Fresh, collision-free scratch paths for one operation.
    pub fn scratch(&self, operation: &str) -> ScratchFiles {
        let id = Uuid::new_v4();
        let stem = format!("{operation}-{id}");
        ScratchFiles {
            id,
            body: self.tmp_dir.join(format!("{stem}.raw")),
            signed: self.tmp_dir.join(format!("{stem}.signed")),
        }
    }

    /// Removes every file under the tmp dir. Returns how many were removed.
    pub async fn clean_transients(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.tmp_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        debug!(dir = %self.tmp_dir.display(), removed, "cleaned transient files");
        Ok(removed)
    }
}

/// Transaction body and signed transaction of a single operation. Both files are
/// removed when this value is dropped.
#[derive(Debug)]
pub struct ScratchFiles {
    pub id: Uuid,
    pub body: PathBuf,
    pub signed: PathBuf,
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in [&self.body, &self.signed] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path.display(), %err, "could not remove scratch file"),
            }
        }
    }
}

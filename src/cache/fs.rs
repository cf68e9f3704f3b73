// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{CacheError, CacheStore, CachedOutputs, Fingerprint};

/// Filesystem cache backend: one JSON file per entry under
/// `<root>/<node>/<fingerprint>.json`.
///
/// Writes go to a temp file in the same directory followed by a rename, so
/// an entry is never observed partially written. Node names appear as path
/// components; they are expected to be plain identifiers.
#[derive(Debug, Clone)]
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, node: &str, fingerprint: &Fingerprint) -> PathBuf {
        self.root
            .join(node)
            .join(format!("{}.json", fingerprint.as_str()))
    }
}

#[async_trait]
impl CacheStore for FsCache {
    async fn get(
        &self,
        node: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CachedOutputs>, CacheError> {
        let path = self.entry_path(node, fingerprint);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CacheError::Io(err)),
        }
    }

    async fn put(
        &self,
        node: &str,
        fingerprint: &Fingerprint,
        outputs: &CachedOutputs,
    ) -> Result<(), CacheError> {
        let path = self.entry_path(node, fingerprint);
        let dir = path.parent().ok_or_else(|| {
            CacheError::Unavailable(format!("entry path has no parent: {}", path.display()))
        })?;
        fs::create_dir_all(dir)?;

        let bytes = serde_json::to_vec(outputs)?;
        let tmp = dir.join(format!(".{}.tmp", fingerprint.as_str()));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

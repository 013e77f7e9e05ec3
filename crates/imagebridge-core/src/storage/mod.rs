//! Local image store.
//!
//! Images are content-addressed (`<sha256>.<ext>`), written to a `.part` temp
//! file, synced, then atomically renamed into place. Saving the same bytes
//! twice returns the existing file.

mod sniff;

pub use sniff::image_extension;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::checksum;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `a.png` → `a.png.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// A saved image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist `data`. Blocking; call from `spawn_blocking` in async code.
    pub fn save(&self, data: &[u8]) -> Result<StoredImage> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create image dir {}", self.dir.display()))?;

        let sha256 = checksum::sha256_hex(data);
        let final_path = self
            .dir
            .join(format!("{}.{}", sha256, image_extension(data)));
        let stored = StoredImage {
            path: final_path.clone(),
            sha256: sha256.clone(),
            bytes: data.len() as u64,
        };

        if final_path.exists() {
            match checksum::sha256_path(&final_path) {
                Ok(existing) if existing == sha256 => {
                    tracing::debug!("image already stored at {}", final_path.display());
                    return Ok(stored);
                }
                Ok(_) => tracing::warn!("replacing corrupt image {}", final_path.display()),
                Err(e) => tracing::warn!("re-writing unreadable image: {:#}", e),
            }
        }

        let tmp = temp_path(&final_path);
        let mut file =
            File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        file.write_all(data)
            .with_context(|| format!("write {}", tmp.display()))?;
        file.sync_all().context("storage sync failed")?;
        drop(file);

        fs::rename(&tmp, &final_path).with_context(|| {
            format!("failed to rename {} to {}", tmp.display(), final_path.display())
        })?;
        tracing::info!(bytes = stored.bytes, "stored image at {}", final_path.display());
        Ok(stored)
    }
}

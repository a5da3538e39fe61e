//! Temp artifact lifecycle.
//!
//! Every attempt gets its own stem inside the shared temp directory. yt-dlp
//! picks the extension, so the stem is handed out without one and files are
//! looked up as `<stem>.<ext>` afterwards. Cleanup is best-effort: failures
//! are logged, never returned.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::download::error::DownloadError;

/// Prefix of every artifact file name.
pub const ARTIFACT_PREFIX: &str = "grab_";

/// Output path without extension, owned by exactly one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStem {
    path: PathBuf,
}

impl ArtifactStem {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<stem>.<ext>`
    pub fn with_extension(&self, ext: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    }

    /// yt-dlp `-o` template: `<stem>.%(ext)s`
    pub fn output_template(&self) -> String {
        format!("{}.%(ext)s", self.path.to_string_lossy())
    }

    fn file_prefix(&self) -> Option<String> {
        self.path.file_name().map(|name| name.to_string_lossy().into_owned())
    }
}

/// An artifact that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub path: PathBuf,
    pub size: u64,
}

/// An artifact read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub path: PathBuf,
    pub size: u64,
    pub content: Vec<u8>,
}

/// Temp artifact manager for one directory.
#[derive(Debug, Clone)]
pub struct TempArtifacts {
    dir: PathBuf,
}

impl TempArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the directory if needed.
    pub fn prepare(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(&self.dir)
    }

    /// Allocates a fresh stem: `<dir>/grab_<unix-nanos>_<random>`.
    ///
    /// The random part keeps stems unique even when two requests land on
    /// the same clock tick.
    pub fn allocate(&self) -> ArtifactStem {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let random = Uuid::new_v4().simple().to_string();
        let name = format!("{}{}_{}", ARTIFACT_PREFIX, nanos, &random[..12]);
        ArtifactStem {
            path: self.dir.join(name),
        }
    }

    /// Stats `<stem>.<ext>`. A missing file is `FileMissingAfterSuccess`.
    pub async fn locate(&self, stem: &ArtifactStem, ext: &str) -> Result<Located, DownloadError> {
        let path = stem.with_extension(ext);
        match fs_err::tokio::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Located { size: meta.len(), path }),
            Ok(_) => Err(DownloadError::FileMissingAfterSuccess { path }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DownloadError::FileMissingAfterSuccess { path }),
            Err(source) => Err(DownloadError::FileSystem { path, source }),
        }
    }

    /// Locates and reads `<stem>.<ext>`.
    pub async fn finalize(&self, stem: &ArtifactStem, ext: &str) -> Result<Finalized, DownloadError> {
        let Located { path, size } = self.locate(stem, ext).await?;
        let content = fs_err::tokio::read(&path)
            .await
            .map_err(|source| DownloadError::FileSystem {
                path: path.clone(),
                source,
            })?;
        if content.len() as u64 != size {
            tracing::debug!(
                "{} changed size between stat and read ({} -> {})",
                path.display(),
                size,
                content.len()
            );
        }
        Ok(Finalized {
            size: content.len() as u64,
            path,
            content,
        })
    }

    /// Deletes one file. Never fails; an already missing file is only logged.
    pub async fn cleanup(&self, path: &Path) {
        match fs_err::tokio::remove_file(path).await {
            Ok(()) => tracing::debug!("🧹 Removed temp file {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Temp file {} already removed", path.display())
            }
            Err(e) => tracing::warn!("Failed to remove temp file {}: {}", path.display(), e),
        }
    }

    /// Deletes every file in the temp dir whose name starts with the stem
    /// (`.part`, `.ytdl`, `.f137.mp4` intermediates, the output itself).
    pub async fn cleanup_partials(&self, stem: &ArtifactStem) {
        let Some(prefix) = stem.file_prefix() else {
            return;
        };
        let mut entries = match fs_err::tokio::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot scan temp dir {} for partials: {}", self.dir.display(), e);
                return;
            }
        };
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if entry.file_name().to_string_lossy().starts_with(&prefix) {
                        self.cleanup(&entry.path()).await;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Error while scanning temp dir {}: {}", self.dir.display(), e);
                    break;
                }
            }
        }
    }
}

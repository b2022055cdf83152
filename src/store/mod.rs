// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Content-addressed artifact store
//!
//! Downloaded files are stored as `<root>/<sha256-hex><ext>`. The path only
//! depends on the bytes and the extension, so saving identical content twice
//! lands on the same file (last writer wins).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::driver::{ByteStream, Download};
use crate::error::{Error, Result};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A stored download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Hex SHA-256 of the content; the artifact's identity
    pub content_hash: String,
    /// Extension with leading dot, empty when the name had none
    pub file_extension: String,
    /// Title reported by the site
    pub title: String,
    /// Where the content is stored
    pub stored_path: PathBuf,
    /// Content length in bytes
    pub size: u64,
    /// When this copy was written
    pub saved_at: DateTime<Utc>,
}

/// An artifact found on disk by [`ArtifactStore::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    pub content_hash: String,
    pub file_extension: String,
    pub path: PathBuf,
    pub size: u64,
}

/// A stored file whose content no longer matches its name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashMismatch {
    pub path: PathBuf,
    pub expected: String,
    pub actual: String,
}

/// Result of [`ArtifactStore::verify`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub mismatches: Vec<HashMismatch>,
}

impl VerifyReport {
    /// Whether every stored file matched its name
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Content-addressed store under a fixed root
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `<workspace>/downloads`
    pub fn for_workspace(workspace: impl AsRef<Path>) -> Self {
        Self::new(workspace.as_ref().join("downloads"))
    }

    /// Store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location for content with this hash and extension
    pub fn stored_path(&self, content_hash: &str, file_extension: &str) -> PathBuf {
        self.root.join(format!("{}{}", content_hash, file_extension))
    }

    /// Store raw bytes
    pub async fn save_bytes(
        &self,
        bytes: impl Into<Bytes>,
        suggested_filename: &str,
        title: &str,
    ) -> Result<Artifact> {
        let extension = extension_of(suggested_filename);
        self.write_buffer(bytes.into(), &extension, title).await
    }

    /// Store a driver download, from its temporary file or its byte stream
    pub async fn save_download(&self, download: Download, title: &str) -> Result<Artifact> {
        let Download {
            temp_path,
            byte_stream,
            suggested_filename,
        } = download;
        let extension = extension_of(&suggested_filename);

        if let Some(temp_path) = temp_path {
            tracing::debug!(path = %temp_path.display(), "storing download from temporary file");
            self.move_temp_file(&temp_path, &extension, title).await
        } else if let Some(stream) = byte_stream {
            tracing::debug!(filename = %suggested_filename, "storing download from byte stream");
            let bytes = collect_stream(stream).await?;
            self.write_buffer(bytes, &extension, title).await
        } else {
            Err(Error::download(
                "driver provided neither a temporary file nor a byte stream",
            )
            .with_detail("suggested_filename", suggested_filename))
        }
    }

    async fn write_buffer(&self, bytes: Bytes, extension: &str, title: &str) -> Result<Artifact> {
        let content_hash = hash_bytes(&bytes);
        let path = self.prepare(&content_hash, extension).await?;
        let staging = self.staging_path(&content_hash, extension);

        if let Err(e) = tokio::fs::write(&staging, &bytes).await {
            discard(&staging).await;
            return Err(store_io_error("could not write artifact", &path, e));
        }
        self.publish(&staging, &path).await?;

        Ok(self.finish(content_hash, extension, title, path, bytes.len() as u64))
    }

    async fn move_temp_file(&self, temp_path: &Path, extension: &str, title: &str) -> Result<Artifact> {
        let bytes = tokio::fs::read(temp_path).await.map_err(|e| {
            Error::download("temporary download file is unreadable")
                .with_detail("temp_path", temp_path.to_string_lossy().into_owned())
                .with_detail("cause", e.to_string())
        })?;
        let content_hash = hash_bytes(&bytes);
        let path = self.prepare(&content_hash, extension).await?;

        if tokio::fs::rename(temp_path, &path).await.is_err() {
            // rename fails across filesystems
            let staging = self.staging_path(&content_hash, extension);
            if let Err(e) = tokio::fs::copy(temp_path, &staging).await {
                discard(&staging).await;
                return Err(store_io_error(
                    "could not move temporary download into the store",
                    &path,
                    e,
                ));
            }
            self.publish(&staging, &path).await?;
            if let Err(e) = tokio::fs::remove_file(temp_path).await {
                tracing::warn!(path = %temp_path.display(), error = %e, "could not remove temporary download");
            }
        }

        Ok(self.finish(content_hash, extension, title, path, bytes.len() as u64))
    }

    async fn prepare(&self, content_hash: &str, extension: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::download("could not create downloads directory")
                .with_detail("root", self.root.to_string_lossy().into_owned())
                .with_detail("cause", e.to_string())
        })?;

        Ok(self.stored_path(content_hash, extension))
    }

    /// Hidden sibling of the final path; never matches a stored name
    fn staging_path(&self, content_hash: &str, extension: &str) -> PathBuf {
        let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}{}.{}-{}.part",
            content_hash,
            extension,
            std::process::id(),
            n
        ))
    }

    /// Move fully written content under its final name
    async fn publish(&self, staging: &Path, path: &Path) -> Result<()> {
        if let Err(e) = tokio::fs::rename(staging, path).await {
            discard(staging).await;
            return Err(store_io_error("could not move artifact into place", path, e));
        }
        Ok(())
    }

    fn finish(
        &self,
        content_hash: String,
        extension: &str,
        title: &str,
        stored_path: PathBuf,
        size: u64,
    ) -> Artifact {
        tracing::info!(path = %stored_path.display(), hash = %content_hash, size, "artifact stored");

        Artifact {
            content_hash,
            file_extension: extension.to_string(),
            title: title.to_string(),
            stored_path,
            size,
            saved_at: Utc::now(),
        }
    }

    /// Check whether content with this hash and extension is stored
    pub async fn contains(&self, content_hash: &str, file_extension: &str) -> bool {
        tokio::fs::metadata(self.stored_path(content_hash, file_extension))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Enumerate stored artifacts; files not named by a hash are skipped
    pub async fn list(&self) -> Result<Vec<StoredArtifact>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(store_io_error("could not read downloads directory", &self.root, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| store_io_error("could not read downloads directory", &self.root, e))?
        {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some((content_hash, file_extension)) = split_stored_name(&name) {
                found.push(StoredArtifact {
                    content_hash,
                    file_extension,
                    path,
                    size: metadata.len(),
                });
            }
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    /// Re-hash every stored artifact and report mismatches
    pub async fn verify(&self) -> Result<VerifyReport> {
        let mut report = VerifyReport::default();

        for stored in self.list().await? {
            let bytes = tokio::fs::read(&stored.path)
                .await
                .map_err(|e| store_io_error("could not read stored artifact", &stored.path, e))?;
            let actual = hash_bytes(&bytes);
            report.checked += 1;

            if actual != stored.content_hash {
                tracing::warn!(path = %stored.path.display(), "stored artifact does not match its hash");
                report.mismatches.push(HashMismatch {
                    path: stored.path,
                    expected: stored.content_hash,
                    actual,
                });
            }
        }

        Ok(report)
    }
}

/// Hex SHA-256 of `bytes`
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Extension of a suggested filename with its leading dot, verbatim
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

async fn collect_stream(mut stream: ByteStream) -> Result<Bytes> {
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            Error::download("download stream failed before completion")
                .with_detail("received_bytes", buffer.len() as u64)
                .with_detail("cause", e.to_string())
        })?;
        buffer.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffer))
}

fn split_stored_name(name: &str) -> Option<(String, String)> {
    let hash = name.get(..64)?;
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let rest = &name[64..];
    if !rest.is_empty() && !rest.starts_with('.') {
        return None;
    }
    Some((hash.to_ascii_lowercase(), rest.to_string()))
}

async fn discard(staging: &Path) {
    match tokio::fs::remove_file(staging).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %staging.display(), error = %e, "could not remove partial artifact"),
    }
}

fn store_io_error(message: &str, path: &Path, e: std::io::Error) -> Error {
    Error::download(message)
        .with_detail("path", path.to_string_lossy().into_owned())
        .with_detail("cause", e.to_string())
}

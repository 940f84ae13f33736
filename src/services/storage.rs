//! Local file storage for uploads.
//!
//! Files are stored flat in the upload directory as `{uuid}{ext}`; the uuid is
//! the public file id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use crate::config::UploadSettings;
use crate::error::ApiError;
use crate::logging::ExecutionTimer;

/// Broad category of an uploaded file, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Document,
    Archive,
    Video,
    Audio,
    Other,
}

const ALLOWED_EXTENSIONS: &[(FileKind, &[&str])] = &[
    (FileKind::Image, &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"]),
    (FileKind::Document, &[".pdf", ".doc", ".docx", ".txt", ".rtf"]),
    (FileKind::Archive, &[".zip", ".rar", ".7z", ".tar", ".gz"]),
    (FileKind::Video, &[".mp4", ".avi", ".mov", ".wmv", ".flv"]),
    (FileKind::Audio, &[".mp3", ".wav", ".flac", ".aac"]),
];

impl FileKind {
    /// `ext` is lowercase with a leading dot, e.g. `.png`
    pub fn from_extension(ext: &str) -> Self {
        ALLOWED_EXTENSIONS
            .iter()
            .find(|(_, exts)| exts.contains(&ext))
            .map(|(kind, _)| *kind)
            .unwrap_or(FileKind::Other)
    }

    pub fn from_filename(name: &str) -> Self {
        Self::from_extension(&extension_of(name))
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Archive => "archive",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// Lowercased extension with its leading dot, or an empty string
fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Filename must not be empty")]
    EmptyFilename,

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File exceeds the size limit of {limit_mb}MB")]
    TooLarge { limit_mb: usize },

    #[error("File not found")]
    NotFound,

    #[error("Storage I/O error")]
    Io(#[from] io::Error),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EmptyFilename | StorageError::UnsupportedType(_) => {
                ApiError::BadRequest(err.to_string())
            }
            StorageError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            StorageError::NotFound => ApiError::NotFound(err.to_string()),
            StorageError::Io(e) => {
                ApiError::Internal(anyhow::Error::new(e).context("File storage operation failed"))
            }
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub file_id: Uuid,
    pub original_name: String,
    pub filename: String,
    pub file_size: u64,
    pub file_type: FileKind,
    pub content_type: Option<String>,
    pub upload_time: DateTime<Utc>,
}

/// A file currently present in the upload directory
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: u64,
    pub file_type: FileKind,
    pub upload_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct KindStats {
    pub count: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub total_files: u64,
    pub total_size: u64,
    pub total_size_mb: f64,
    pub type_statistics: BTreeMap<FileKind, KindStats>,
    pub upload_directory: String,
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    max_file_size: usize,
}

impl FileStorage {
    pub fn new(settings: &UploadSettings) -> Self {
        Self {
            root: settings.dir.clone(),
            max_file_size: settings.max_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Validate a client-supplied filename and return its extension
    pub fn check_name(name: &str) -> Result<String, StorageError> {
        if name.trim().is_empty() {
            return Err(StorageError::EmptyFilename);
        }

        let ext = extension_of(name);
        if FileKind::from_extension(&ext) == FileKind::Other {
            return Err(StorageError::UnsupportedType(if ext.is_empty() {
                "(none)".to_string()
            } else {
                ext
            }));
        }
        Ok(ext)
    }

    pub fn check_size(&self, len: usize) -> Result<(), StorageError> {
        if len > self.max_file_size {
            return Err(StorageError::TooLarge {
                limit_mb: self.max_file_size / (1024 * 1024),
            });
        }
        Ok(())
    }

    pub async fn save(
        &self,
        original_name: &str,
        content_type: Option<String>,
        data: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let ext = Self::check_name(original_name)?;
        self.check_size(data.len())?;

        let file_id = Uuid::new_v4();
        let filename = format!("{}{}", file_id, ext);
        fs::write(self.root.join(&filename), data).await?;

        tracing::info!(%file_id, original_name, size = data.len(), "File stored");

        Ok(StoredFile {
            file_id,
            original_name: original_name.to_string(),
            filename,
            file_size: data.len() as u64,
            file_type: FileKind::from_extension(&ext),
            content_type,
            upload_time: Utc::now(),
        })
    }

    /// Locate the stored file for an id
    pub async fn find(&self, file_id: Uuid) -> Result<PathBuf, StorageError> {
        let wanted = file_id.to_string();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let matches = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem == wanted);
            if matches && entry.file_type().await?.is_file() {
                return Ok(path);
            }
        }

        Err(StorageError::NotFound)
    }

    /// Read a stored file, returning its on-disk name and contents
    pub async fn read(&self, file_id: Uuid) -> Result<(String, Vec<u8>), StorageError> {
        let path = self.find(file_id).await?;
        let bytes = fs::read(&path).await?;
        Ok((file_name(&path), bytes))
    }

    pub async fn delete(&self, file_id: Uuid) -> Result<(), StorageError> {
        let path = self.find(file_id).await?;
        fs::remove_file(&path).await?;
        tracing::info!(%file_id, "File deleted");
        Ok(())
    }

    pub async fn info(&self, file_id: Uuid) -> Result<FileEntry, StorageError> {
        let path = self.find(file_id).await?;
        let metadata = fs::metadata(&path).await?;
        Ok(entry_for(file_id, &path, &metadata))
    }

    /// All stored files, newest first
    pub async fn list(&self) -> Result<Vec<FileEntry>, StorageError> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let path = entry.path();
            // Anything not named after a uuid was not uploaded through the API
            let Some(file_id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };
            entries.push(entry_for(file_id, &path, &metadata));
        }

        entries.sort_by(|a, b| {
            b.upload_time
                .cmp(&a.upload_time)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(entries)
    }

    pub async fn stats(&self) -> Result<StorageStats, StorageError> {
        let _timer = ExecutionTimer::start("storage_stats");

        let entries = self.list().await?;
        let mut type_statistics: BTreeMap<FileKind, KindStats> = BTreeMap::new();
        let mut total_size = 0u64;

        for entry in &entries {
            total_size += entry.file_size;
            let stats = type_statistics.entry(entry.file_type).or_default();
            stats.count += 1;
            stats.size += entry.file_size;
        }

        let upload_directory = fs::canonicalize(&self.root)
            .await
            .unwrap_or_else(|_| self.root.clone())
            .display()
            .to_string();

        Ok(StorageStats {
            total_files: entries.len() as u64,
            total_size,
            total_size_mb: (total_size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0,
            type_statistics,
            upload_directory,
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn entry_for(file_id: Uuid, path: &Path, metadata: &std::fs::Metadata) -> FileEntry {
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let created = metadata.created().unwrap_or(modified);
    let filename = file_name(path);

    FileEntry {
        file_id,
        file_type: FileKind::from_filename(&filename),
        filename,
        file_size: metadata.len(),
        upload_time: DateTime::<Utc>::from(created),
        modified_time: DateTime::<Utc>::from(modified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn storage(max_file_size: usize) -> (FileStorage, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(&UploadSettings {
            dir: dir.path().to_path_buf(),
            max_file_size,
            max_files_per_request: 10,
        });
        (storage, dir)
    }

    #[rstest]
    #[case("photo.JPG", FileKind::Image)]
    #[case("report.pdf", FileKind::Document)]
    #[case("backup.tar.gz", FileKind::Archive)]
    #[case("clip.mov", FileKind::Video)]
    #[case("song.flac", FileKind::Audio)]
    #[case("script.sh", FileKind::Other)]
    #[case("README", FileKind::Other)]
    fn classifies_by_extension(#[case] name: &str, #[case] kind: FileKind) {
        assert_eq!(FileKind::from_filename(name), kind);
    }

    #[test]
    fn rejects_empty_and_unsupported_names() {
        assert!(matches!(
            FileStorage::check_name("  "),
            Err(StorageError::EmptyFilename)
        ));
        assert!(matches!(
            FileStorage::check_name("tool.exe"),
            Err(StorageError::UnsupportedType(ext)) if ext == ".exe"
        ));
        assert_eq!(FileStorage::check_name("a.PNG").unwrap(), ".png");
    }

    #[tokio::test]
    async fn save_find_read_delete() {
        let (storage, _dir) = storage(1024);
        let stored = storage
            .save("notes.txt", Some("text/plain".into()), b"hello")
            .await
            .unwrap();

        assert_eq!(stored.filename, format!("{}.txt", stored.file_id));
        assert_eq!(stored.file_size, 5);
        assert_eq!(stored.file_type, FileKind::Document);

        let (name, bytes) = storage.read(stored.file_id).await.unwrap();
        assert_eq!(name, stored.filename);
        assert_eq!(bytes, b"hello");

        storage.delete(stored.file_id).await.unwrap();
        assert!(matches!(
            storage.find(stored.file_id).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn oversized_files_are_refused() {
        let (storage, _dir) = storage(4);
        let err = storage.save("big.txt", None, b"too big").await.unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { .. }));
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_skips_foreign_files_and_stats_sum_sizes() {
        let (storage, dir) = storage(1024);
        storage.save("a.png", None, b"1234").await.unwrap();
        storage.save("b.mp3", None, b"12").await.unwrap();
        storage.save("c.jpg", None, b"1").await.unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"ignored").unwrap();

        let entries = storage.list().await.unwrap();
        assert_eq!(entries.len(), 3);

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_size, 7);
        assert_eq!(
            stats.type_statistics.get(&FileKind::Image),
            Some(&KindStats { count: 2, size: 5 })
        );
        assert_eq!(
            stats.type_statistics.get(&FileKind::Audio),
            Some(&KindStats { count: 1, size: 2 })
        );
    }
}

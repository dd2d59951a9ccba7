use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::fs;

use super::{sanitize_filename, Storage, StorageError, StoredFile};

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(storage_path: &str) -> Self {
        let base_path = PathBuf::from(storage_path);
        // Ensure directory exists (best-effort at construction time).
        std::fs::create_dir_all(&base_path).ok();
        Self { base_path }
    }

    fn describe(filename: String, meta: &std::fs::Metadata) -> StoredFile {
        let uploaded_at = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
            .unwrap_or_default();
        StoredFile {
            filename,
            size_bytes: meta.len(),
            uploaded_at,
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(&self, filename: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        let name = sanitize_filename(filename)?;
        fs::create_dir_all(&self.base_path).await?;
        let path = self.base_path.join(&name);
        fs::write(&path, data).await?;
        let meta = fs::metadata(&path).await?;
        Ok(Self::describe(name, &meta))
    }

    async fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                files.push(Self::describe(name, &meta));
            }
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

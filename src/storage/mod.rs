pub mod local;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An uploaded file as reported by `GET /documents`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub size_bytes: u64,
    pub uploaded_at: String,
}

/// Abstract upload storage interface.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save raw bytes under the file-name component of `filename`.
    async fn save(&self, filename: &str, data: &[u8]) -> Result<StoredFile, StorageError>;

    /// List stored files, skipping hidden ones.
    async fn list(&self) -> Result<Vec<StoredFile>, StorageError>;

    /// Return the provider name for logging.
    fn provider_name(&self) -> &str;
}

/// Reduce a client-supplied filename to a bare file name.
pub fn sanitize_filename(filename: &str) -> Result<String, StorageError> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name.starts_with('.') {
        return Err(StorageError::InvalidFilename(filename.to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\notes.txt").unwrap(), "notes.txt");
    }

    #[test]
    fn test_sanitize_rejects_empty_and_hidden() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("uploads/").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename(".env").is_err());
    }
}

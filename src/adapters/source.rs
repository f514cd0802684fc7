//! Filesystem document source.
//!
//! Content handles are treated as paths, resolved against an optional
//! root directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{CollaboratorError, DocumentSource};
use crate::domain::ContentHandle;

/// Reads document content from disk
#[derive(Debug, Clone, Default)]
pub struct FileDocumentSource {
    root: Option<PathBuf>,
}

impl FileDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative handles against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn resolve(&self, handle: &ContentHandle) -> PathBuf {
        let path = Path::new(&handle.0);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl DocumentSource for FileDocumentSource {
    async fn load(&self, handle: &ContentHandle) -> Result<Vec<u8>, CollaboratorError> {
        if handle.0.is_empty() {
            return Err(CollaboratorError::Rejected(
                "Document has no content location".to_string(),
            ));
        }

        let path = self.resolve(handle);
        fs::read(&path).await.map_err(|e| {
            CollaboratorError::Transport(format!(
                "Failed to read document {}: {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let source = FileDocumentSource::with_root("/data/uploads");

        assert_eq!(
            source.resolve(&ContentHandle("d1.pdf".to_string())),
            PathBuf::from("/data/uploads/d1.pdf")
        );
        assert_eq!(
            source.resolve(&ContentHandle("/tmp/x.pdf".to_string())),
            PathBuf::from("/tmp/x.pdf")
        );
    }

    #[tokio::test]
    async fn test_load_from_root() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("paper.txt"), b"Abstract").unwrap();

        let source = FileDocumentSource::with_root(temp.path());
        let bytes = source
            .load(&ContentHandle("paper.txt".to_string()))
            .await
            .unwrap();
        assert_eq!(bytes, b"Abstract");
    }

    #[tokio::test]
    async fn test_missing_file_is_transport_error() {
        let temp = TempDir::new().unwrap();
        let source = FileDocumentSource::with_root(temp.path());

        let result = source.load(&ContentHandle("missing.pdf".to_string())).await;
        assert!(matches!(result, Err(CollaboratorError::Transport(_))));

        let empty = source.load(&ContentHandle(String::new())).await;
        assert!(matches!(empty, Err(CollaboratorError::Rejected(_))));
    }
}

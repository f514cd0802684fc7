//! Catalog of known documents.
//!
//! Simple JSON-based list persisted at `$PAPERFLOW_HOME/documents.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::domain::{Document, DocumentId};

/// Catalog format version
const CATALOG_VERSION: u32 = 1;

fn default_version() -> u32 {
    CATALOG_VERSION
}

/// Persisted list of documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCatalog {
    /// Catalog format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// All known documents
    #[serde(default)]
    pub documents: Vec<Document>,

    #[serde(skip)]
    path: PathBuf,
}

impl DocumentCatalog {
    /// Create an empty catalog stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            version: CATALOG_VERSION,
            documents: Vec::new(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog from `path`; a missing file is an empty catalog
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Self::new(path));
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;

        let mut catalog: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog JSON: {}", path.display()))?;
        catalog.path = path;
        Ok(catalog)
    }

    /// Load the catalog at the configured location
    pub async fn load_default() -> Result<Self> {
        Self::load(crate::config::catalog_path()?).await
    }

    /// Save the catalog to disk
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write catalog: {}", self.path.display()))?;

        Ok(())
    }

    /// Add a document, replacing any entry with the same id
    pub fn add(&mut self, document: Document) {
        if let Some(existing) = self.documents.iter_mut().find(|d| d.id == document.id) {
            *existing = document;
        } else {
            self.documents.push(document);
        }
    }

    pub fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| &d.id == id)
    }

    /// Remove a document by id
    pub fn remove(&mut self, id: &DocumentId) -> Option<Document> {
        let pos = self.documents.iter().position(|d| &d.id == id)?;
        Some(self.documents.remove(pos))
    }

    /// All documents, most recent first
    pub fn list(&self) -> Vec<&Document> {
        let mut documents: Vec<_> = self.documents.iter().collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

use crate::traits::DocumentStore;
use crate::{DocumentRecord, DocumentSummary, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One pretty-printed `<id>.json` file per document under a root directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), StoreError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(metadata) if !metadata.is_dir() => Err(StoreError::NotReady(format!(
                "{} exists and is not a directory",
                self.root.display()
            ))),
            Ok(_) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.root).await?;
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn document_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }

        Ok(self.root.join(format!("{id}.json")))
    }
}

#[async_trait]
impl DocumentStore for JsonDirStore {
    async fn insert(&self, record: &DocumentRecord) -> Result<String, StoreError> {
        let path = self.document_path(&record.id)?;
        self.ensure_root().await?;

        let payload = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, payload).await?;
        Ok(record.id.clone())
    }

    async fn find(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let path = self.document_path(id)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn list(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if !is_json {
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<DocumentRecord>(&bytes) {
                Ok(record) => summaries.push(DocumentSummary::from(&record)),
                Err(error) => warn!(path = %path.display(), %error, "skipping unreadable record"),
            }
        }

        summaries.sort_by(|left, right| left.uploaded_at.cmp(&right.uploaded_at));
        Ok(summaries)
    }
}

use crate::traits::DocumentStore;
use crate::{DocumentRecord, DocumentSummary, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store, used when no persistent backend is configured.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert(&self, record: &DocumentRecord) -> Result<String, StoreError> {
        if record.id.trim().is_empty() {
            return Err(StoreError::InvalidId(record.id.clone()));
        }

        self.documents
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record.id.clone())
    }

    async fn find(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let mut summaries: Vec<DocumentSummary> = self
            .documents
            .read()
            .await
            .values()
            .map(DocumentSummary::from)
            .collect();
        summaries.sort_by(|left, right| left.uploaded_at.cmp(&right.uploaded_at));
        Ok(summaries)
    }
}

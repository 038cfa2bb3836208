use crate::{DocumentRecord, DocumentSummary, StoreError};
use async_trait::async_trait;

/// Keyed storage for processed documents. Backends are interchangeable; the
/// processing core never depends on which one is active.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores the record under its `id` and returns that id.
    async fn insert(&self, record: &DocumentRecord) -> Result<String, StoreError>;

    async fn find(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError>;

    /// Summaries of every stored document, oldest upload first.
    async fn list(&self) -> Result<Vec<DocumentSummary>, StoreError>;
}

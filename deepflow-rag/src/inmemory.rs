//! In-memory document store using cosine similarity.
//!
//! [`InMemoryDocumentStore`] keeps collections in creation order behind a
//! `tokio::sync::RwLock`. It is suitable for development, testing, and
//! small-scale use. Clones share the same data.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{RagError, Result};
use crate::store::{DocumentStore, SearchHit, StoreConnector, VectorSearchQuery};

/// A record held by the [`InMemoryDocumentStore`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredRecord {
    /// Record identifier, unique within its collection.
    pub id: String,
    /// Chunk text.
    pub content: String,
    /// Optional title.
    pub title: Option<String>,
    /// Optional source URL.
    pub url: Option<String>,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

type Collections = Vec<(String, Vec<StoredRecord>)>;

/// An in-memory document store.
///
/// # Example
///
/// ```rust,ignore
/// use deepflow_rag::InMemoryDocumentStore;
///
/// let store = InMemoryDocumentStore::new();
/// store.create_collection("papers").await;
/// store.insert("papers", records).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a named collection. No-op if it already exists.
    pub async fn create_collection(&self, name: &str) {
        let mut collections = self.collections.write().await;
        if !collections.iter().any(|(existing, _)| existing == name) {
            collections.push((name.to_string(), Vec::new()));
        }
    }

    /// Insert records into an existing collection.
    pub async fn insert(&self, collection: &str, records: Vec<StoredRecord>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let (_, stored) = collections
            .iter_mut()
            .find(|(name, _)| name == collection)
            .ok_or_else(|| missing_collection(collection))?;
        stored.extend(records);
        Ok(())
    }
}

fn missing_collection(collection: &str) -> RagError {
    RagError::VectorStoreError {
        backend: "InMemory".to_string(),
        message: format!("collection '{collection}' does not exist"),
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn backend(&self) -> &str {
        "InMemory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        Ok(collections.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn vector_search(
        &self,
        collection: &str,
        query: &VectorSearchQuery<'_>,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let (_, records) = collections
            .iter()
            .find(|(name, _)| name == collection)
            .ok_or_else(|| missing_collection(collection))?;

        let mut scored: Vec<(f32, &StoredRecord)> = records
            .iter()
            .map(|record| (cosine_similarity(&record.embedding, query.query_vector), record))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.num_candidates.min(query.limit));

        Ok(scored
            .into_iter()
            .map(|(score, record)| SearchHit {
                id: record.id.clone(),
                content: record.content.clone(),
                title: record.title.clone(),
                url: record.url.clone(),
                score: Some(f64::from(score)),
            })
            .collect())
    }
}

#[async_trait]
impl StoreConnector for InMemoryDocumentStore {
    fn backend(&self) -> &str {
        "InMemory"
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }

    async fn connect(&self) -> Result<Arc<dyn DocumentStore>> {
        Ok(Arc::new(self.clone()))
    }
}

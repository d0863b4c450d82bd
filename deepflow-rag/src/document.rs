//! Data types for resources, documents, and scored chunks.
//!
//! All three types are request-scoped: they are built while answering a
//! single query or listing and handed to the caller.

use serde::{Deserialize, Serialize};

/// A logical collection a caller wants searched.
///
/// The `uri` encodes the store and collection, e.g. `mongodb://deep_flow/papers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Resource {
    /// Scheme-qualified identifier of the collection.
    pub uri: String,
    /// Display title.
    pub title: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl Resource {
    /// Create a new resource.
    pub fn new(
        uri: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self { uri: uri.into(), title: title.into(), description: description.into() }
    }
}

/// One scored passage of text within a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The passage text.
    pub content: String,
    /// Store-defined relevance score (higher is more relevant, not normalized).
    pub similarity: f64,
}

/// A retrieval result grouping every chunk found for one physical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Composite key `"<collection>:<record_id>"`, unique within one result set.
    pub id: String,
    /// Source URL of the record, empty when unknown.
    pub url: String,
    /// Title of the record.
    pub title: String,
    /// Chunks in discovery order.
    pub chunks: Vec<Chunk>,
}

impl Document {
    /// Build the composite identity key for a record in a collection.
    pub fn composite_id(collection: &str, record_id: &str) -> String {
        format!("{collection}:{record_id}")
    }

    /// Highest chunk similarity, or `None` if the document has no chunks.
    pub fn best_similarity(&self) -> Option<f64> {
        self.chunks.iter().map(|c| c.similarity).reduce(f64::max)
    }
}

//! Vector-search-backed retriever.
//!
//! [`VectorSearchRetriever`] resolves resources to physical collections,
//! runs one similarity search per collection, and merges the hits into
//! documents keyed by `"<collection>:<record_id>"`.
//!
//! # Example
//!
//! ```rust,ignore
//! use deepflow_rag::{
//!     ConnectionManager, EmbeddingClient, RetrieverConfig, Retriever, VectorSearchRetriever,
//! };
//!
//! let retriever = VectorSearchRetriever::new(
//!     RetrieverConfig::default(),
//!     ConnectionManager::new(Arc::new(connector)),
//!     EmbeddingClient::new(EmbeddingSettings::default()),
//! )?;
//! let documents = retriever.query_relevant_documents("CRISPR off-target effects", None).await;
//! ```

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tracing::{debug, error, info, warn};

use crate::config::RetrieverConfig;
use crate::document::{Chunk, Document, Resource};
use crate::embedding::EmbeddingClient;
use crate::error::Result;
use crate::retriever::Retriever;
use crate::store::{ConnectionManager, SearchHit, VectorSearchQuery};
use crate::uri::ResourceUri;

/// Title given to records that carry none.
pub const UNTITLED: &str = "Untitled";

/// A [`Retriever`] backed by a document store with vector search.
///
/// The store connection and the embedding provider are both created on
/// first use and then reused for the lifetime of the retriever.
pub struct VectorSearchRetriever {
    config: RetrieverConfig,
    connection: ConnectionManager,
    embeddings: EmbeddingClient,
}

impl VectorSearchRetriever {
    /// Create a retriever. Nothing is connected until first use.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if
    /// `config` is invalid.
    pub fn new(
        config: RetrieverConfig,
        connection: ConnectionManager,
        embeddings: EmbeddingClient,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, connection, embeddings })
    }

    /// Return a reference to the retriever configuration.
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Return a reference to the connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Return a reference to the embedding client.
    pub fn embeddings(&self) -> &EmbeddingClient {
        &self.embeddings
    }

    /// Connect eagerly so that an unreachable store surfaces at startup.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConnectivityError`](crate::RagError::ConnectivityError)
    /// if the store cannot be reached.
    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await.map(|_| ())
    }

    /// Resolve resources to distinct collection names, in first-seen order.
    ///
    /// Unparseable URIs are skipped. Falls back to the configured default
    /// collection when nothing resolves.
    pub fn resolve_collections(&self, resources: Option<&[Resource]>) -> Vec<String> {
        let mut collections: Vec<String> = Vec::new();
        for resource in resources.unwrap_or_default() {
            match ResourceUri::parse(&resource.uri) {
                Ok(parsed) => {
                    if !collections.contains(&parsed.collection) {
                        collections.push(parsed.collection);
                    }
                }
                Err(e) => warn!(uri = %resource.uri, error = %e, "skipping resource"),
            }
        }

        if collections.is_empty() {
            debug!(collection = %self.config.collection, "no resource resolved, using default");
            collections.push(self.config.collection.clone());
        }
        collections
    }

    async fn try_query(
        &self,
        query: &str,
        resources: Option<&[Resource]>,
    ) -> Result<Vec<Document>> {
        let store = self.connection.connect().await?;
        let query_vector = self.embeddings.embed(query).await?;
        let collections = self.resolve_collections(resources);

        let search = VectorSearchQuery {
            index: &self.config.vector_index,
            vector_field: &self.config.vector_field,
            content_field: &self.config.content_field,
            query_vector: &query_vector,
            num_candidates: self.config.num_candidates,
            limit: self.config.result_limit,
        };
        let search = &search;

        let outcomes: Vec<_> = stream::iter(collections)
            .map(|collection| async move {
                let outcome = store.vector_search(&collection, search).await;
                (collection, outcome)
            })
            .buffered(self.config.max_concurrent_searches)
            .collect()
            .await;

        let mut batches = Vec::with_capacity(outcomes.len());
        for (collection, outcome) in outcomes {
            match outcome {
                Ok(hits) => {
                    debug!(collection = %collection, hits = hits.len(), "collection searched");
                    batches.push((collection, hits));
                }
                Err(e) => {
                    warn!(collection = %collection, error = %e, "vector search failed for collection")
                }
            }
        }

        Ok(merge_hits(batches))
    }

    async fn try_list_resources(&self, query: Option<&str>) -> Result<Vec<Resource>> {
        let store = self.connection.connect().await?;
        let names = store.list_collection_names().await?;
        let selected = select_resource_collections(&names, &self.config, query);

        Ok(selected
            .into_iter()
            .map(|name| {
                let uri = ResourceUri::format(
                    &self.config.resource_scheme,
                    &self.config.database,
                    &name,
                );
                let description = format!("{} Collection: {name}", store.backend());
                Resource { uri, title: name, description }
            })
            .collect())
    }
}

#[async_trait]
impl Retriever for VectorSearchRetriever {
    fn name(&self) -> &str {
        "vector_search"
    }

    async fn query_relevant_documents(
        &self,
        query: &str,
        resources: Option<&[Resource]>,
    ) -> Vec<Document> {
        match self.try_query(query, resources).await {
            Ok(documents) => {
                info!(document_count = documents.len(), "query completed");
                documents
            }
            Err(e) => {
                error!(error = %e, "failed to query relevant documents");
                Vec::new()
            }
        }
    }

    async fn list_resources(&self, query: Option<&str>) -> Vec<Resource> {
        match self.try_list_resources(query).await {
            Ok(resources) => resources,
            Err(e) => {
                error!(error = %e, "failed to list resources");
                Vec::new()
            }
        }
    }
}

/// Merge per-collection hits into documents.
///
/// Hits sharing `(collection, id)` land in one document, in arrival order;
/// equal ids in different collections stay separate. Documents keep the
/// order in which their first hit arrived.
pub fn merge_hits<I>(batches: I) -> Vec<Document>
where
    I: IntoIterator<Item = (String, Vec<SearchHit>)>,
{
    let mut documents: Vec<Document> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (collection, hits) in batches {
        for hit in hits {
            let position = match positions.entry(Document::composite_id(&collection, &hit.id)) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    documents.push(Document {
                        id: entry.key().clone(),
                        url: hit.url.unwrap_or_default(),
                        title: hit.title.unwrap_or_else(|| UNTITLED.to_string()),
                        chunks: Vec::new(),
                    });
                    *entry.insert(documents.len() - 1)
                }
            };
            documents[position]
                .chunks
                .push(Chunk { content: hit.content, similarity: hit.score.unwrap_or(0.0) });
        }
    }

    documents
}

/// Pick the collections that have a metadata companion, optionally keeping
/// only names containing `query` (case-insensitive). Listing order is kept.
pub fn select_resource_collections(
    names: &[String],
    config: &RetrieverConfig,
    query: Option<&str>,
) -> Vec<String> {
    let available: HashSet<&str> = names.iter().map(String::as_str).collect();
    let needle = query.map(str::to_lowercase);

    names
        .iter()
        .filter(|name| available.contains(config.file_meta_collection(name).as_str()))
        .filter(|name| needle.as_ref().is_none_or(|n| name.to_lowercase().contains(n.as_str())))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, content: &str, score: f64) -> SearchHit {
        SearchHit {
            id: id.into(),
            content: content.into(),
            title: Some(format!("title {id}")),
            url: None,
            score: Some(score),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn same_record_id_in_different_collections_stays_separate() {
        let documents = merge_hits(vec![
            ("papers".to_string(), vec![hit("1", "a", 0.9)]),
            ("notes".to_string(), vec![hit("1", "b", 0.8)]),
        ]);
        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["papers:1", "notes:1"]);
        assert!(documents.iter().all(|d| d.chunks.len() == 1));
    }

    #[test]
    fn repeated_record_merges_chunks_in_order() {
        let documents = merge_hits(vec![(
            "papers".to_string(),
            vec![hit("7", "first", 0.9), hit("8", "other", 0.5), hit("7", "second", 0.4)],
        )]);
        assert_eq!(documents.len(), 2);
        let merged = &documents[0];
        assert_eq!(merged.id, "papers:7");
        let contents: Vec<&str> = merged.chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let documents = merge_hits(vec![(
            "papers".to_string(),
            vec![SearchHit { id: "x".into(), ..Default::default() }],
        )]);
        assert_eq!(documents[0].title, UNTITLED);
        assert_eq!(documents[0].url, "");
        assert_eq!(documents[0].chunks[0].similarity, 0.0);
    }

    #[test]
    fn resource_selection_requires_metadata_companion() {
        let listed = names(&["papers", "papers_filemeta", "scratch"]);
        let config = RetrieverConfig::default();
        assert_eq!(select_resource_collections(&listed, &config, None), vec!["papers"]);
    }

    #[test]
    fn resource_selection_filters_case_insensitively() {
        let listed =
            names(&["papers_2023", "notes_2023", "notes_2023_filemeta", "papers_2023_filemeta"]);
        let config = RetrieverConfig::default();
        assert_eq!(
            select_resource_collections(&listed, &config, Some("PAPER")),
            vec!["papers_2023"]
        );
        assert_eq!(
            select_resource_collections(&listed, &config, None),
            vec!["papers_2023", "notes_2023"]
        );
    }

    #[test]
    fn resource_selection_honours_configured_suffix() {
        let listed = names(&["papers", "papers_filemeta", "notes", "notes_meta"]);
        let config = RetrieverConfig::builder().file_meta_suffix("_meta").build().unwrap();
        assert_eq!(select_resource_collections(&listed, &config, None), vec!["notes"]);
    }
}

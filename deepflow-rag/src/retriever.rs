//! The retriever capability contract.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::document::{Document, Resource};

/// A source of ranked documents for a natural-language query.
///
/// Retrieval is advisory input to a larger workflow, so neither operation
/// returns an error: implementations log failures and return an empty
/// sequence instead. An empty result therefore does not distinguish
/// "nothing relevant" from "retrieval failed".
///
/// New backends implement this trait and are selected through
/// [`RagProvider`](crate::RagProvider).
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short name of the implementation, used in logs.
    fn name(&self) -> &str;

    /// Return documents relevant to `query`, searching the collections named
    /// by `resources` or the default collection when none resolve.
    async fn query_relevant_documents(
        &self,
        query: &str,
        resources: Option<&[Resource]>,
    ) -> Vec<Document>;

    /// List searchable resources, optionally filtered by a case-insensitive
    /// substring of their name.
    async fn list_resources(&self, query: Option<&str>) -> Vec<Resource>;

    /// Like [`query_relevant_documents`](Retriever::query_relevant_documents),
    /// but gives up after `timeout`.
    ///
    /// In-flight embedding and store calls are cancelled when the deadline
    /// passes and an empty sequence is returned.
    async fn query_with_timeout(
        &self,
        query: &str,
        resources: Option<&[Resource]>,
        timeout: Duration,
    ) -> Vec<Document> {
        match tokio::time::timeout(timeout, self.query_relevant_documents(query, resources)).await
        {
            Ok(documents) => documents,
            Err(_) => {
                warn!(
                    retriever = self.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "retrieval timed out"
                );
                Vec::new()
            }
        }
    }
}

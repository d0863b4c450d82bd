//! Document store traits and the lazily-connected connection manager.
//!
//! A [`StoreConnector`] knows how to open a connection; the resulting
//! [`DocumentStore`] exposes the three primitives the retriever needs:
//! a liveness ping, collection listing, and per-collection similarity search.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::error::{RagError, Result};

/// Parameters of one similarity search against one collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorSearchQuery<'a> {
    /// Name of the similarity search index.
    pub index: &'a str,
    /// Field holding the embedding vector.
    pub vector_field: &'a str,
    /// Field holding the chunk text.
    pub content_field: &'a str,
    /// The query embedding.
    pub query_vector: &'a [f32],
    /// Nearest-neighbour candidate pool size.
    pub num_candidates: usize,
    /// Maximum number of records returned.
    pub limit: usize,
}

/// One record returned by a similarity search, as projected by the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchHit {
    /// Physical record identifier, unique within its collection.
    pub id: String,
    /// Chunk text.
    pub content: String,
    /// Record title, if projected.
    pub title: Option<String>,
    /// Source URL, if projected.
    pub url: Option<String>,
    /// Store-defined similarity score.
    pub score: Option<f64>,
}

/// An open connection to a collection-oriented document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human-readable backend name used in logs and resource descriptions.
    fn backend(&self) -> &str;

    /// Perform a cheap round-trip to confirm the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// List every collection name, in the store's own order.
    async fn list_collection_names(&self) -> Result<Vec<String>>;

    /// Run a similarity search against `collection`.
    ///
    /// Returns records ranked by the store, best first.
    async fn vector_search(
        &self,
        collection: &str,
        query: &VectorSearchQuery<'_>,
    ) -> Result<Vec<SearchHit>>;
}

/// Opens connections to a [`DocumentStore`].
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Backend name used when wrapping connection errors.
    fn backend(&self) -> &str;

    /// Connection parameters safe to log. Must not include credentials.
    fn describe(&self) -> String;

    /// Open a new connection.
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>>;
}

/// Owns at most one connection, established on first use.
///
/// [`connect`](ConnectionManager::connect) is idempotent and safe under
/// concurrent first use: exactly one caller opens and pings the connection,
/// the others wait for it. A failed attempt leaves the manager disconnected.
pub struct ConnectionManager {
    connector: Arc<dyn StoreConnector>,
    store: OnceCell<Arc<dyn DocumentStore>>,
}

impl ConnectionManager {
    /// Create a manager that connects through `connector` on first use.
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self { connector, store: OnceCell::new() }
    }

    /// Whether a verified connection is held.
    pub fn is_connected(&self) -> bool {
        self.store.initialized()
    }

    /// Return the connection, opening and pinging it on first call.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConnectivityError`] if the store cannot be reached.
    pub async fn connect(&self) -> Result<&Arc<dyn DocumentStore>> {
        self.store.get_or_try_init(|| self.establish()).await
    }

    async fn establish(&self) -> Result<Arc<dyn DocumentStore>> {
        let attempt = async {
            let store = self.connector.connect().await?;
            store.ping().await?;
            Ok::<_, RagError>(store)
        };

        match attempt.await {
            Ok(store) => {
                info!(backend = %self.connector.backend(), "connected to document store");
                Ok(store)
            }
            Err(e) => {
                error!(
                    backend = %self.connector.backend(),
                    params = %self.connector.describe(),
                    error = %e,
                    "failed to connect to document store"
                );
                Err(match e {
                    RagError::ConnectivityError { .. } => e,
                    other => RagError::ConnectivityError {
                        backend: self.connector.backend().to_string(),
                        message: other.to_string(),
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::inmemory::InMemoryDocumentStore;

    struct CountingConnector {
        store: InMemoryDocumentStore,
        connects: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl StoreConnector for CountingConnector {
        fn backend(&self) -> &str {
            "counting"
        }

        fn describe(&self) -> String {
            "uri=memory://***".into()
        }

        async fn connect(&self) -> Result<Arc<dyn DocumentStore>> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if attempt < self.fail_first {
                return Err(RagError::VectorStoreError {
                    backend: "counting".into(),
                    message: "connection refused".into(),
                });
            }
            Ok(Arc::new(self.store.clone()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_opens_one_connection() {
        let connector = Arc::new(CountingConnector {
            store: InMemoryDocumentStore::new(),
            connects: AtomicUsize::new(0),
            fail_first: 0,
        });
        let manager = Arc::new(ConnectionManager::new(connector.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.connect().await.map(|_| ()) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert!(manager.is_connected());

        manager.connect().await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_reported_as_connectivity_and_retried_later() {
        let connector = Arc::new(CountingConnector {
            store: InMemoryDocumentStore::new(),
            connects: AtomicUsize::new(0),
            fail_first: 1,
        });
        let manager = ConnectionManager::new(connector.clone());

        let err = manager.connect().await.err().unwrap();
        assert!(matches!(err, RagError::ConnectivityError { ref backend, .. } if backend == "counting"));
        assert!(!manager.is_connected());

        manager.connect().await.unwrap();
        assert!(manager.is_connected());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }
}

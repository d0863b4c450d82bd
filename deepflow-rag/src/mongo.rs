//! MongoDB Atlas Vector Search backend.
//!
//! Provides [`MongoConnector`] and [`MongoDocumentStore`], which implement
//! [`StoreConnector`] and [`DocumentStore`] on top of the official
//! [mongodb](https://docs.rs/mongodb) driver. Similarity search runs as an
//! aggregation with a `$vectorSearch` stage followed by a `$project` stage.
//!
//! This module is only available when the `mongodb` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use deepflow_rag::mongo::MongoConnector;
//! use deepflow_rag::ConnectionManager;
//!
//! let connector = MongoConnector::new("mongodb://localhost:27017", "deep_flow");
//! let connection = ConnectionManager::new(Arc::new(connector));
//! let store = connection.connect().await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document as BsonDocument, doc};
use mongodb::{Client, Database};
use tracing::debug;

use crate::error::{RagError, Result};
use crate::store::{DocumentStore, SearchHit, StoreConnector, VectorSearchQuery};
use crate::uri::mask_connection_string;

const BACKEND: &str = "MongoDB";

/// Field the `$project` stage writes the similarity score into.
const SCORE_FIELD: &str = "score";

fn map_err(e: mongodb::error::Error) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
}

/// Opens [`MongoDocumentStore`] connections for one database.
pub struct MongoConnector {
    uri: String,
    database: String,
}

impl MongoConnector {
    /// Create a connector for `database` on the cluster at `uri`.
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self { uri: uri.into(), database: database.into() }
    }
}

#[async_trait]
impl StoreConnector for MongoConnector {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn describe(&self) -> String {
        format!("uri={}, database={}", mask_connection_string(&self.uri), self.database)
    }

    async fn connect(&self) -> Result<Arc<dyn DocumentStore>> {
        let client = Client::with_uri_str(&self.uri).await.map_err(|e| {
            RagError::ConnectivityError { backend: BACKEND.to_string(), message: e.to_string() }
        })?;
        Ok(Arc::new(MongoDocumentStore::new(client, &self.database)))
    }
}

/// A [`DocumentStore`] backed by one MongoDB database.
pub struct MongoDocumentStore {
    client: Client,
    database: Database,
}

impl MongoDocumentStore {
    /// Wrap an existing client, scoped to `database`.
    pub fn new(client: Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn ping(&self) -> Result<()> {
        self.client.database("admin").run_command(doc! { "ping": 1 }).await.map_err(|e| {
            RagError::ConnectivityError { backend: BACKEND.to_string(), message: e.to_string() }
        })?;
        Ok(())
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        self.database.list_collection_names().await.map_err(map_err)
    }

    async fn vector_search(
        &self,
        collection: &str,
        query: &VectorSearchQuery<'_>,
    ) -> Result<Vec<SearchHit>> {
        let pipeline = vector_search_pipeline(query);
        let cursor = self
            .database
            .collection::<BsonDocument>(collection)
            .aggregate(pipeline)
            .await
            .map_err(map_err)?;
        let records: Vec<BsonDocument> = cursor.try_collect().await.map_err(map_err)?;

        debug!(collection, hits = records.len(), "vector search returned");
        Ok(records.iter().map(|record| hit_from_record(record, query.content_field)).collect())
    }
}

/// Build the `$vectorSearch` + `$project` aggregation pipeline for `query`.
pub fn vector_search_pipeline(query: &VectorSearchQuery<'_>) -> Vec<BsonDocument> {
    let query_vector: Vec<Bson> =
        query.query_vector.iter().map(|v| Bson::Double(f64::from(*v))).collect();
    let num_candidates = query.num_candidates as i64;
    let limit = query.limit as i64;

    let search = doc! {
        "$vectorSearch": {
            "index": query.index,
            "path": query.vector_field,
            "queryVector": query_vector,
            "numCandidates": num_candidates,
            "limit": limit,
        }
    };

    let mut projection = doc! {
        "_id": 1,
        "title": 1,
        "source": 1,
        "url": 1,
    };
    projection.insert(query.content_field, 1);
    projection.insert(SCORE_FIELD, doc! { "$meta": "vectorSearchScore" });

    vec![search, doc! { "$project": projection }]
}

/// Convert a projected record into a [`SearchHit`].
///
/// The URL is read from `url`, then `source`.
pub fn hit_from_record(record: &BsonDocument, content_field: &str) -> SearchHit {
    let id = match record.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let text = |field: &str| match record.get(field) {
        Some(Bson::String(s)) => Some(s.clone()),
        None | Some(Bson::Null) => None,
        Some(other) => {
            debug!(
                field,
                element_type = ?other.element_type(),
                "ignoring non-string field in vector search result"
            );
            None
        }
    };
    let score = match record.get(SCORE_FIELD) {
        Some(Bson::Double(v)) => Some(*v),
        Some(Bson::Int32(v)) => Some(f64::from(*v)),
        Some(Bson::Int64(v)) => Some(*v as f64),
        _ => None,
    };

    SearchHit {
        id,
        content: text(content_field).unwrap_or_default(),
        title: text("title"),
        url: text("url").or_else(|| text("source")),
        score,
    }
}

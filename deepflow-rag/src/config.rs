//! Configuration for retrievers and their embedding clients.
//!
//! Values are resolved once, either programmatically through
//! [`RetrieverConfig::builder`] or from the process environment through
//! [`RagSettings::from_env`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default database name.
pub const DEFAULT_DATABASE: &str = "deep_flow";
/// Default collection searched when no resource resolves.
pub const DEFAULT_COLLECTION: &str = "documents";
/// Suffix of the companion metadata collection that marks a user-facing collection.
pub const DEFAULT_FILE_META_SUFFIX: &str = "_filemeta";
/// Default name of the embedding vector field.
pub const DEFAULT_VECTOR_FIELD: &str = "embedding";
/// Default name of the text content field.
pub const DEFAULT_CONTENT_FIELD: &str = "text";
/// Default name of the vector search index.
pub const DEFAULT_VECTOR_INDEX: &str = "vector_index";
/// Default embedding provider.
pub const DEFAULT_EMBEDDING_PROVIDER: &str = "openai";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// Embedding providers the client adapter knows how to construct.
pub const SUPPORTED_EMBEDDING_PROVIDERS: &[&str] = &["openai"];

/// Static configuration of a [`VectorSearchRetriever`](crate::VectorSearchRetriever).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrieverConfig {
    /// Database holding the collections.
    pub database: String,
    /// Collection searched when no resource resolves to a collection.
    pub collection: String,
    /// Suffix of the metadata companion collection (`<collection><suffix>`).
    pub file_meta_suffix: String,
    /// Name of the field holding the embedding vector.
    pub vector_field: String,
    /// Name of the field holding the chunk text.
    pub content_field: String,
    /// Name of the similarity search index.
    pub vector_index: String,
    /// Number of nearest-neighbour candidates considered per collection.
    pub num_candidates: usize,
    /// Maximum number of records returned per collection.
    pub result_limit: usize,
    /// Maximum number of collections searched concurrently.
    pub max_concurrent_searches: usize,
    /// Scheme used when synthesizing resource URIs.
    pub resource_scheme: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.into(),
            collection: DEFAULT_COLLECTION.into(),
            file_meta_suffix: DEFAULT_FILE_META_SUFFIX.into(),
            vector_field: DEFAULT_VECTOR_FIELD.into(),
            content_field: DEFAULT_CONTENT_FIELD.into(),
            vector_index: DEFAULT_VECTOR_INDEX.into(),
            num_candidates: 100,
            result_limit: 10,
            max_concurrent_searches: 4,
            resource_scheme: "mongodb".into(),
        }
    }
}

impl RetrieverConfig {
    /// Create a new builder for constructing a [`RetrieverConfig`].
    pub fn builder() -> RetrieverConfigBuilder {
        RetrieverConfigBuilder::default()
    }

    /// Name of the metadata companion collection for `collection`.
    pub fn file_meta_collection(&self, collection: &str) -> String {
        format!("{collection}{}", self.file_meta_suffix)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `result_limit == 0`
    /// - `num_candidates < result_limit`
    /// - `max_concurrent_searches == 0`
    /// - any collection or field name is empty
    pub fn validate(&self) -> Result<()> {
        if self.result_limit == 0 {
            return Err(RagError::ConfigError("result_limit must be greater than zero".into()));
        }
        if self.num_candidates < self.result_limit {
            return Err(RagError::ConfigError(format!(
                "num_candidates ({}) must be at least result_limit ({})",
                self.num_candidates, self.result_limit
            )));
        }
        if self.max_concurrent_searches == 0 {
            return Err(RagError::ConfigError(
                "max_concurrent_searches must be greater than zero".into(),
            ));
        }
        let names = [
            ("database", &self.database),
            ("collection", &self.collection),
            ("file_meta_suffix", &self.file_meta_suffix),
            ("vector_field", &self.vector_field),
            ("content_field", &self.content_field),
            ("vector_index", &self.vector_index),
            ("resource_scheme", &self.resource_scheme),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(RagError::ConfigError(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RetrieverConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrieverConfigBuilder {
    config: RetrieverConfig,
}

impl RetrieverConfigBuilder {
    /// Set the database name.
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.config.database = name.into();
        self
    }

    /// Set the default collection.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the metadata companion suffix.
    pub fn file_meta_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.file_meta_suffix = suffix.into();
        self
    }

    /// Set the embedding vector field name.
    pub fn vector_field(mut self, field: impl Into<String>) -> Self {
        self.config.vector_field = field.into();
        self
    }

    /// Set the content field name.
    pub fn content_field(mut self, field: impl Into<String>) -> Self {
        self.config.content_field = field.into();
        self
    }

    /// Set the similarity index name.
    pub fn vector_index(mut self, index: impl Into<String>) -> Self {
        self.config.vector_index = index.into();
        self
    }

    /// Set the candidate pool size.
    pub fn num_candidates(mut self, n: usize) -> Self {
        self.config.num_candidates = n;
        self
    }

    /// Set the per-collection result cap.
    pub fn result_limit(mut self, n: usize) -> Self {
        self.config.result_limit = n;
        self
    }

    /// Set how many collections may be searched at once.
    pub fn max_concurrent_searches(mut self, n: usize) -> Self {
        self.config.max_concurrent_searches = n;
        self
    }

    /// Set the scheme of synthesized resource URIs.
    pub fn resource_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.resource_scheme = scheme.into();
        self
    }

    /// Build the [`RetrieverConfig`], validating it first.
    pub fn build(self) -> Result<RetrieverConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings for the embedding provider behind an [`EmbeddingClient`](crate::EmbeddingClient).
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingSettings {
    /// Provider name, e.g. `openai`.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// API key. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_EMBEDDING_PROVIDER.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            api_key: None,
            base_url: None,
        }
    }
}

impl fmt::Debug for EmbeddingSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl EmbeddingSettings {
    /// Reject providers the adapter cannot construct.
    pub fn validate(&self) -> Result<()> {
        let provider = self.provider.to_ascii_lowercase();
        if !SUPPORTED_EMBEDDING_PROVIDERS.contains(&provider.as_str()) {
            return Err(RagError::ConfigError(format!(
                "unsupported embedding provider: {}",
                self.provider
            )));
        }
        if self.model.trim().is_empty() {
            return Err(RagError::ConfigError("embedding model must not be empty".into()));
        }
        Ok(())
    }
}

/// Everything the retriever builder needs, resolved from one source.
#[derive(Debug, Clone, Default)]
pub struct RagSettings {
    /// Explicitly selected retriever provider, if any.
    pub provider: Option<String>,
    /// Document store connection string, if any.
    pub connection_string: Option<String>,
    /// Retriever parameters.
    pub retriever: RetrieverConfig,
    /// Embedding client parameters.
    pub embedding: EmbeddingSettings,
}

impl RagSettings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        // Legacy deployments configure the embedder under `MILVUS_EMBEDDING_*`.
        let embedding_var = |name: &str| {
            get(format!("RAG_EMBEDDING_{name}").as_str())
                .or_else(|| get(format!("MILVUS_EMBEDDING_{name}").as_str()))
        };
        let defaults = RetrieverConfig::default();

        let retriever = RetrieverConfig {
            database: get("MONGODB_DB").unwrap_or(defaults.database),
            collection: get("MONGODB_COLLECTION").unwrap_or(defaults.collection),
            file_meta_suffix: get("MONGODB_FILE_META_SUFFIX").unwrap_or(defaults.file_meta_suffix),
            vector_field: get("MONGODB_VECTOR_FIELD").unwrap_or(defaults.vector_field),
            content_field: get("MONGODB_CONTENT_FIELD").unwrap_or(defaults.content_field),
            vector_index: get("MONGODB_VECTOR_INDEX").unwrap_or(defaults.vector_index),
            ..defaults
        };

        let embedding = EmbeddingSettings {
            provider: embedding_var("PROVIDER")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_PROVIDER.into()),
            model: embedding_var("MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
            api_key: embedding_var("API_KEY"),
            base_url: embedding_var("BASE_URL"),
        };

        Self {
            provider: get("RAG_PROVIDER"),
            connection_string: get("MONGODB_URI"),
            retriever,
            embedding,
        }
    }
}

//! Error types for the `deepflow-rag` crate.

use thiserror::Error;

/// Errors that can occur while building or running a retriever.
///
/// Only [`RagError::ConfigError`] and [`RagError::ConnectivityError`] are
/// expected to escape a retriever; every other variant is recovered at the
/// [`Retriever`](crate::Retriever) boundary and turned into an empty result.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error, such as an unsupported provider.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The document store could not be reached on first connection.
    #[error("Connectivity error ({backend}): {message}")]
    ConnectivityError {
        /// The store backend that could not be reached.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A single collection's similarity search or listing failed.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A resource URI could not be resolved to a collection.
    #[error("Malformed resource URI '{uri}': {reason}")]
    MalformedResourceUri {
        /// The offending URI.
        uri: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A tool call carried missing or ill-typed arguments.
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// Results could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;

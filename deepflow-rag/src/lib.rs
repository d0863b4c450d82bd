//! Semantic document retrieval over collection-oriented document stores.
//!
//! This crate provides:
//! - a [`Retriever`] contract that never fails toward its caller
//! - [`VectorSearchRetriever`], which resolves resources to collections,
//!   fans out one similarity search per collection, and merges the hits
//!   into deduplicated [`Document`]s
//! - a lazily-connected [`ConnectionManager`] and a lazily-initialized
//!   [`EmbeddingClient`]
//! - provider selection through [`build_retriever`] and a process-wide
//!   [`global_retriever`]
//! - a JSON tool wrapper, [`RetrieverTool`], for agent frameworks
//!
//! # Features
//!
//! - `mongodb` (default): MongoDB Atlas Vector Search backend
//! - `openai` (default): OpenAI-compatible embedding provider

pub mod builder;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
#[cfg(feature = "mongodb")]
pub mod mongo;
#[cfg(feature = "openai")]
pub mod openai;
pub mod retriever;
pub mod store;
pub mod tool;
pub mod uri;
pub mod vector_search;

pub use builder::{
    RagProvider, build_retriever, global_retriever, init_global_retriever, select_provider,
};
pub use config::{EmbeddingSettings, RagSettings, RetrieverConfig, RetrieverConfigBuilder};
pub use document::{Chunk, Document, Resource};
pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use error::{RagError, Result};
pub use inmemory::{InMemoryDocumentStore, StoredRecord};
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
pub use retriever::Retriever;
pub use store::{ConnectionManager, DocumentStore, SearchHit, StoreConnector, VectorSearchQuery};
pub use tool::RetrieverTool;
pub use uri::ResourceUri;
pub use vector_search::VectorSearchRetriever;

//! Retriever provider selection and the process-wide retriever.
//!
//! Selection order:
//! 1. an explicitly configured, supported provider is used;
//! 2. with no explicit provider, a store connection string selects the
//!    vector-search retriever;
//! 3. an explicitly configured but unsupported provider is a configuration
//!    error;
//! 4. otherwise retrieval is disabled and no retriever is built.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::config::RagSettings;
use crate::error::{RagError, Result};
use crate::retriever::Retriever;

/// Connection string used when the provider is selected explicitly but no
/// connection string is configured.
pub const DEFAULT_CONNECTION_STRING: &str = "mongodb://localhost:27017";

/// Retriever implementations known to the builder.
///
/// Additional backends add a variant here and an arm in [`build_retriever`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RagProvider {
    /// MongoDB Atlas Vector Search.
    MongoDb,
}

impl RagProvider {
    /// The configuration spelling of this provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MongoDb => "mongodb",
        }
    }
}

impl fmt::Display for RagProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RagProvider {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongodb" => Ok(Self::MongoDb),
            _ => Err(RagError::ConfigError(format!("Unsupported RAG provider: {s}"))),
        }
    }
}

/// Decide which provider, if any, is active.
///
/// Blank explicit values count as unset.
pub fn select_provider(
    explicit: Option<&str>,
    connection_string_present: bool,
) -> Result<Option<RagProvider>> {
    match explicit.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.parse().map(Some),
        None if connection_string_present => Ok(Some(RagProvider::MongoDb)),
        None => Ok(None),
    }
}

/// Build the retriever described by `settings`.
///
/// Returns `Ok(None)` when retrieval is disabled. Nothing is connected here;
/// the retriever connects on first use.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] for an unsupported provider or invalid
/// retriever or embedding settings.
pub fn build_retriever(settings: &RagSettings) -> Result<Option<Arc<dyn Retriever>>> {
    let provider =
        select_provider(settings.provider.as_deref(), settings.connection_string.is_some())?;
    let Some(provider) = provider else {
        info!("no retriever configured, retrieval disabled");
        return Ok(None);
    };

    settings.retriever.validate()?;
    settings.embedding.validate()?;

    let retriever = match provider {
        RagProvider::MongoDb => build_mongodb(settings)?,
    };
    info!(provider = %provider, retriever = retriever.name(), "retriever configured");
    Ok(Some(retriever))
}

#[cfg(feature = "mongodb")]
fn build_mongodb(settings: &RagSettings) -> Result<Arc<dyn Retriever>> {
    use crate::embedding::EmbeddingClient;
    use crate::mongo::MongoConnector;
    use crate::store::ConnectionManager;
    use crate::vector_search::VectorSearchRetriever;

    let uri = settings.connection_string.as_deref().unwrap_or(DEFAULT_CONNECTION_STRING);
    let connector = MongoConnector::new(uri, settings.retriever.database.clone());
    let retriever = VectorSearchRetriever::new(
        settings.retriever.clone(),
        ConnectionManager::new(Arc::new(connector)),
        EmbeddingClient::new(settings.embedding.clone()),
    )?;
    Ok(Arc::new(retriever))
}

#[cfg(not(feature = "mongodb"))]
fn build_mongodb(_settings: &RagSettings) -> Result<Arc<dyn Retriever>> {
    Err(RagError::ConfigError(
        "the mongodb provider requires the `mongodb` feature".to_string(),
    ))
}

static GLOBAL_RETRIEVER: OnceLock<Option<Arc<dyn Retriever>>> = OnceLock::new();

/// Return the process-wide retriever, building it from the environment on
/// first call.
///
/// The first successful build is cached for the life of the process.
/// Configuration errors are returned and not cached.
pub fn global_retriever() -> Result<Option<Arc<dyn Retriever>>> {
    if let Some(retriever) = GLOBAL_RETRIEVER.get() {
        return Ok(retriever.clone());
    }
    let built = build_retriever(&RagSettings::from_env())?;
    Ok(GLOBAL_RETRIEVER.get_or_init(|| built).clone())
}

/// Install the process-wide retriever explicitly.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if a retriever was already installed or
/// built by [`global_retriever`].
pub fn init_global_retriever(retriever: Option<Arc<dyn Retriever>>) -> Result<()> {
    GLOBAL_RETRIEVER
        .set(retriever)
        .map_err(|_| RagError::ConfigError("global retriever is already initialized".into()))
}

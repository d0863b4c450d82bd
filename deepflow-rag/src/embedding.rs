//! Embedding provider trait and the lazily-initialized client adapter.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::EmbeddingSettings;
use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Builds an [`EmbeddingProvider`] from resolved settings.
pub type ProviderFactory =
    Arc<dyn Fn(&EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync>;

/// Wraps an embedding provider that is constructed on first use.
///
/// Construction happens at most once even under concurrent first calls; a
/// failed construction leaves the client uninitialized so a later call can
/// try again.
pub struct EmbeddingClient {
    settings: EmbeddingSettings,
    factory: ProviderFactory,
    provider: OnceCell<Arc<dyn EmbeddingProvider>>,
}

impl EmbeddingClient {
    /// Create a client that builds the provider named in `settings`.
    pub fn new(settings: EmbeddingSettings) -> Self {
        Self::with_factory(settings, Arc::new(default_provider))
    }

    /// Create a client with a custom provider factory.
    pub fn with_factory(settings: EmbeddingSettings, factory: ProviderFactory) -> Self {
        Self { settings, factory, provider: OnceCell::new() }
    }

    /// Create an already-initialized client around an existing provider.
    pub fn from_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            settings: EmbeddingSettings::default(),
            factory: Arc::new(fixed_provider_factory),
            provider: OnceCell::new_with(Some(provider)),
        }
    }

    /// The settings this client was created with.
    pub fn settings(&self) -> &EmbeddingSettings {
        &self.settings
    }

    /// Whether the provider has been constructed.
    pub fn is_initialized(&self) -> bool {
        self.provider.initialized()
    }

    /// Return the provider, constructing it on first use.
    pub async fn provider(&self) -> Result<&Arc<dyn EmbeddingProvider>> {
        self.provider
            .get_or_try_init(|| async {
                debug!(
                    provider = %self.settings.provider,
                    model = %self.settings.model,
                    "initializing embedding provider"
                );
                (self.factory)(&self.settings)
            })
            .await
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.provider().await?.embed(text).await
    }
}

fn fixed_provider_factory(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(RagError::EmbeddingError {
        provider: settings.provider.clone(),
        message: "client was created from a fixed provider".into(),
    })
}

fn default_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    match settings.provider.to_ascii_lowercase().as_str() {
        #[cfg(feature = "openai")]
        "openai" => {
            let provider = crate::openai::OpenAIEmbeddingProvider::from_settings(settings)?;
            Ok(Arc::new(provider))
        }
        _ => Err(RagError::EmbeddingError {
            provider: settings.provider.clone(),
            message: "provider is not available in this build".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ConstantProvider;

    #[async_trait]
    impl EmbeddingProvider for ConstantProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn factory_runs_once_under_concurrent_first_use() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let client = Arc::new(EmbeddingClient::with_factory(
            EmbeddingSettings::default(),
            Arc::new(move |_: &EmbeddingSettings| -> Result<Arc<dyn EmbeddingProvider>> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(ConstantProvider))
            }),
        ));
        assert!(!client.is_initialized());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.embed("abc").await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), vec![3.0, 1.0]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(client.is_initialized());
    }

    #[tokio::test]
    async fn failed_construction_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let client = EmbeddingClient::with_factory(
            EmbeddingSettings::default(),
            Arc::new(move |settings: &EmbeddingSettings| -> Result<Arc<dyn EmbeddingProvider>> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(RagError::EmbeddingError {
                        provider: settings.provider.clone(),
                        message: "boom".into(),
                    });
                }
                Ok(Arc::new(ConstantProvider))
            }),
        );

        assert!(client.embed("x").await.is_err());
        assert!(!client.is_initialized());
        assert!(client.embed("x").await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn from_provider_is_ready() {
        let client = EmbeddingClient::from_provider(Arc::new(ConstantProvider));
        assert!(client.is_initialized());
        assert_eq!(client.provider().await.unwrap().dimensions(), 2);
    }

    #[tokio::test]
    async fn unknown_provider_fails_at_first_embed() {
        let settings = EmbeddingSettings { provider: "nowhere".into(), ..Default::default() };
        let client = EmbeddingClient::new(settings);
        let err = client.embed("x").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
    }
}

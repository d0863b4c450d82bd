//! Callable retrieval tool for agent orchestration layers.
//!
//! [`RetrieverTool`] wraps any [`Retriever`] behind a JSON-in/JSON-out
//! interface with a parameter schema, so a host framework can register it
//! alongside its other tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use deepflow_rag::{RetrieverTool, global_retriever};
//!
//! if let Some(retriever) = global_retriever()? {
//!     let tool = RetrieverTool::new(retriever, selected_resources);
//!     let output = tool.execute(json!({ "keywords": "tau aggregation" })).await?;
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::info;

use crate::document::Resource;
use crate::error::{RagError, Result};
use crate::retriever::Retriever;

/// Returned in place of an empty result list.
pub const NO_RESULTS_MESSAGE: &str = "No results found from the local knowledge base.";

/// A retrieval tool bound to a retriever and a fixed set of resources.
pub struct RetrieverTool {
    retriever: Arc<dyn Retriever>,
    resources: Vec<Resource>,
    timeout: Option<Duration>,
}

impl RetrieverTool {
    /// Create a tool searching `resources` (or the default collection when empty).
    pub fn new(retriever: Arc<dyn Retriever>, resources: Vec<Resource>) -> Self {
        Self { retriever, resources, timeout: None }
    }

    /// Bound every call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Tool name presented to the model.
    pub fn name(&self) -> &str {
        "local_search_tool"
    }

    /// Tool description presented to the model.
    pub fn description(&self) -> &str {
        "Search the local knowledge base for passages relevant to the given keywords. \
         Prefer it over web search when the user has selected local resources."
    }

    /// JSON schema of the tool arguments.
    pub fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "keywords": {
                    "type": "string",
                    "description": "Search keywords or a natural-language question"
                }
            },
            "required": ["keywords"]
        })
    }

    /// Run a search with the given arguments.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArguments`] if `keywords` is missing or not
    /// a string. Retrieval failures are not errors; they produce the
    /// no-results message.
    pub async fn execute(&self, args: Value) -> Result<Value> {
        let keywords = args
            .get("keywords")
            .and_then(Value::as_str)
            .ok_or_else(|| RagError::InvalidArguments("missing required 'keywords'".into()))?;

        info!(keywords, resources = self.resources.len(), "local_search_tool called");

        let resources = (!self.resources.is_empty()).then_some(self.resources.as_slice());
        let documents = match self.timeout {
            Some(timeout) => self.retriever.query_with_timeout(keywords, resources, timeout).await,
            None => self.retriever.query_relevant_documents(keywords, resources).await,
        };

        if documents.is_empty() {
            return Ok(Value::String(NO_RESULTS_MESSAGE.to_string()));
        }
        Ok(serde_json::to_value(&documents)?)
    }
}

//! The process-wide retriever is installed once and then shared.

use std::sync::Arc;

use async_trait::async_trait;
use deepflow_rag::{
    Document, RagError, Resource, Retriever, global_retriever, init_global_retriever,
};

struct Named(&'static str);

#[async_trait]
impl Retriever for Named {
    fn name(&self) -> &str {
        self.0
    }

    async fn query_relevant_documents(
        &self,
        _query: &str,
        _resources: Option<&[Resource]>,
    ) -> Vec<Document> {
        Vec::new()
    }

    async fn list_resources(&self, _query: Option<&str>) -> Vec<Resource> {
        Vec::new()
    }
}

#[test]
fn first_installation_wins() {
    init_global_retriever(Some(Arc::new(Named("first")))).unwrap();

    let second = init_global_retriever(Some(Arc::new(Named("second"))));
    assert!(matches!(second, Err(RagError::ConfigError(_))));

    let shared = global_retriever().unwrap().expect("installed retriever");
    assert_eq!(shared.name(), "first");
    let again = global_retriever().unwrap().expect("installed retriever");
    assert!(Arc::ptr_eq(&shared, &again));
}

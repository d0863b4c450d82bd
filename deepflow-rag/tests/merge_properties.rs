//! Property tests for merging per-collection hits into documents.

use std::collections::{HashMap, HashSet};

use deepflow_rag::SearchHit;
use deepflow_rag::vector_search::merge_hits;
use proptest::prelude::*;

/// A batch of hits for one of a few collections, with ids drawn from a small
/// pool so that collisions within and across collections are common.
fn arb_batch() -> impl Strategy<Value = (String, Vec<SearchHit>)> {
    let collection = prop::sample::select(vec!["papers", "notes", "scratch"]);
    let hits = proptest::collection::vec(("[0-3]", "[a-z]{1,6}", 0.0f64..1.0), 0..8);
    (collection, hits).prop_map(|(collection, hits)| {
        let hits = hits
            .into_iter()
            .map(|(id, content, score)| SearchHit {
                id,
                content,
                title: None,
                url: None,
                score: Some(score),
            })
            .collect();
        (collection.to_string(), hits)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn ids_are_unique_and_every_hit_lands_in_its_own_document(
        batches in proptest::collection::vec(arb_batch(), 0..6),
    ) {
        let mut expected: HashMap<String, Vec<String>> = HashMap::new();
        let mut total = 0;
        for (collection, hits) in &batches {
            for hit in hits {
                expected
                    .entry(format!("{collection}:{}", hit.id))
                    .or_default()
                    .push(hit.content.clone());
                total += 1;
            }
        }

        let documents = merge_hits(batches);

        let unique: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        prop_assert_eq!(unique.len(), documents.len());
        prop_assert_eq!(documents.len(), expected.len());
        prop_assert_eq!(documents.iter().map(|d| d.chunks.len()).sum::<usize>(), total);

        for document in &documents {
            let contents: Vec<String> =
                document.chunks.iter().map(|c| c.content.clone()).collect();
            prop_assert_eq!(Some(&contents), expected.get(&document.id));
        }
    }
}

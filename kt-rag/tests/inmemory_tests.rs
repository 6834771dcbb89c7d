//! Property tests for in-memory chunk store search and deletion.

use kt_rag::document::StoredChunk;
use kt_rag::inmemory::InMemoryVectorStore;
use kt_rag::pattern::like_pattern;
use kt_rag::vectorstore::VectorStore;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate chunks for two documents with distinct chunk numbers per document.
fn arb_records(dim: usize) -> impl Strategy<Value = Vec<StoredChunk>> {
    proptest::collection::vec(("[a-z ]{5,30}", arb_normalized_embedding(dim), any::<bool>()), 1..20)
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (text, vector, first))| StoredChunk {
                    id: format!("id-{i}"),
                    text,
                    page_number: 1,
                    chunk_number: i as u32,
                    document_id: if first { "doc_1" } else { "doc_2" }.to_string(),
                    vector,
                })
                .collect()
        })
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

async fn seeded(records: &[StoredChunk]) -> InMemoryVectorStore {
    let store = InMemoryVectorStore::new();
    store.ensure_ready().await.unwrap();
    store.upsert(records).await.unwrap();
    store
}

mod prop_inmemory_search {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_scoped_ordered_and_bounded(
            records in arb_records(DIM),
            query in arb_normalized_embedding(DIM),
            limit in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                seeded(&records).await.vector_search(&query, "doc_1", limit).await.unwrap()
            });

            let in_doc = records.iter().filter(|r| r.document_id == "doc_1").count();
            prop_assert!(results.len() <= limit);
            prop_assert_eq!(results.len(), in_doc.min(limit));
            prop_assert!(results.iter().all(|r| r.document_id == "doc_1"));

            for window in results.windows(2) {
                let (a, b) = (cosine(&window[0].vector, &query), cosine(&window[1].vector, &query));
                prop_assert!(a + 1e-5 >= b, "results not in descending order: {} < {}", a, b);
            }
        }

        #[test]
        fn substring_search_finds_exactly_the_containing_chunks(
            records in arb_records(DIM),
            keyword in "[a-z]{1,3}",
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                seeded(&records)
                    .await
                    .substring_search("doc_2", &[like_pattern(&keyword)])
                    .await
                    .unwrap()
            });

            let expected: Vec<u32> = records
                .iter()
                .filter(|r| r.document_id == "doc_2" && r.text.contains(&keyword))
                .map(|r| r.chunk_number)
                .collect();
            let actual: Vec<u32> = results.iter().map(|r| r.chunk_number).collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn delete_by_document_is_exact(records in arb_records(DIM)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (deleted, left_1, left_2) = rt.block_on(async {
                let store = seeded(&records).await;
                let deleted = store.delete_by_document("doc_1").await.unwrap();
                (
                    deleted,
                    store.count_by_document("doc_1").await.unwrap(),
                    store.count_by_document("doc_2").await.unwrap(),
                )
            });

            let in_doc_1 = records.iter().filter(|r| r.document_id == "doc_1").count();
            prop_assert_eq!(deleted, in_doc_1);
            prop_assert_eq!(left_1, 0);
            prop_assert_eq!(left_2, records.len() - in_doc_1);
        }
    }
}

#[tokio::test]
async fn operations_before_ensure_ready_fail() {
    let store = InMemoryVectorStore::new();
    assert!(store.count_by_document("doc").await.is_err());
    store.ensure_ready().await.unwrap();
    store.ensure_ready().await.unwrap();
    assert_eq!(store.count_by_document("doc").await.unwrap(), 0);
}

#[tokio::test]
async fn empty_pattern_list_returns_nothing() {
    let store = seeded(&[StoredChunk {
        id: "a".into(),
        text: "anything".into(),
        page_number: 1,
        chunk_number: 0,
        document_id: "doc".into(),
        vector: vec![1.0, 0.0],
    }])
    .await;
    assert!(store.substring_search("doc", &[]).await.unwrap().is_empty());
}

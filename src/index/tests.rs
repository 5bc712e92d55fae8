use super::*;
use crate::embeddings::TfIdfEmbedder;
use tempfile::TempDir;

fn meta(doc_id: i64, position: i64) -> ChunkMetadata {
    ChunkMetadata {
        doc_id,
        position,
        source: format!("doc{}.md", doc_id),
        title: Some(format!("Doc {}", doc_id)),
    }
}

fn sample_index() -> VectorIndex {
    let mut index = VectorIndex::new(3);
    index
        .build(
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.7, 0.7, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
            vec![meta(1, 0), meta(1, 1), meta(2, 0), meta(3, 0)],
        )
        .expect("build index");
    index
}

#[test]
fn query_orders_by_ascending_distance() {
    let index = sample_index();
    let results = index.query(&[1.0, 0.1, 0.0], 4).expect("query");

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].0, meta(1, 0));
    assert_eq!(results[1].0, meta(2, 0));
    for pair in results.windows(2) {
        assert!(pair[0].1 <= pair[1].1);
    }
}

#[test]
fn query_returns_at_most_top_k() {
    let index = sample_index();

    assert_eq!(index.query(&[1.0, 0.0, 0.0], 2).expect("query").len(), 2);
    assert_eq!(index.query(&[1.0, 0.0, 0.0], 50).expect("query").len(), 4);
    assert!(index.query(&[1.0, 0.0, 0.0], 0).expect("query").is_empty());
}

#[test]
fn identical_vector_has_zero_distance() {
    let index = sample_index();
    let results = index.query(&[0.0, 0.0, 2.0], 1).expect("query");

    assert_eq!(results[0].0, meta(3, 0));
    assert!(results[0].1.abs() < 1e-6);
}

#[test]
fn ties_break_by_insertion_order() {
    let mut index = VectorIndex::new(2);
    index
        .build(
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0], vec![2.0, 0.0]],
            vec![meta(1, 0), meta(2, 0), meta(3, 0), meta(4, 0)],
        )
        .expect("build index");

    let results = index.query(&[1.0, 0.0], 3).expect("query");
    let order: Vec<i64> = results.iter().map(|(m, _)| m.doc_id).collect();
    assert_eq!(order, vec![2, 3, 4]);
}

#[test]
fn zero_vectors_sit_at_distance_one() {
    let mut index = VectorIndex::new(2);
    index
        .build(vec![vec![0.0, 0.0], vec![1.0, 0.0]], vec![meta(1, 0), meta(2, 0)])
        .expect("build index");

    let results = index.query(&[1.0, 0.0], 2).expect("query");
    assert_eq!(results[0].0.doc_id, 2);
    assert!((results[1].1 - 1.0).abs() < f32::EPSILON);

    let zero_query = index.query(&[0.0, 0.0], 2).expect("query");
    assert!(zero_query.iter().all(|(_, d)| (*d - 1.0).abs() < f32::EPSILON));
}

#[test]
fn empty_index_answers_with_nothing() {
    let mut index = VectorIndex::new(4);
    index.build(Vec::new(), Vec::new()).expect("build empty index");

    assert!(index.is_empty());
    for top_k in [0, 1, 10] {
        assert!(index.query(&[1.0, 0.0, 0.0, 0.0], top_k).expect("query").is_empty());
    }
}

#[test]
fn query_with_wrong_dimension_is_rejected() {
    let index = sample_index();
    let result = index.query(&[1.0, 0.0, 0.0, 0.0], 2);

    assert!(matches!(
        result,
        Err(RetrievalError::DimensionMismatch {
            expected: 3,
            actual: 4
        })
    ));
}

#[test]
fn build_rejects_mismatched_inputs() {
    let mut index = VectorIndex::new(2);

    let lengths = index.build(vec![vec![1.0, 0.0]], Vec::new());
    assert!(matches!(lengths, Err(RetrievalError::Other(_))));

    let width = index.build(vec![vec![1.0, 0.0, 0.0]], vec![meta(1, 0)]);
    assert!(matches!(
        width,
        Err(RetrievalError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    ));
    assert!(index.is_empty());
}

#[test]
fn save_then_load_answers_identically() {
    let temp_dir = TempDir::new().expect("temp dir");
    let index = sample_index();
    index.save(temp_dir.path(), "v1").expect("save index");

    let loaded = VectorIndex::load(temp_dir.path(), "v1").expect("load index");

    assert_eq!(loaded, index);
    for query in [[1.0, 0.2, 0.0], [0.0, 0.5, 0.5], [0.3, 0.3, 0.3]] {
        assert_eq!(
            loaded.query(&query, 3).expect("query loaded"),
            index.query(&query, 3).expect("query original")
        );
    }
}

#[test]
fn profile_survives_snapshot() {
    let temp_dir = TempDir::new().expect("temp dir");
    let texts = vec!["alpha beta".to_string(), "beta gamma".to_string()];
    let vocabulary = TfIdfEmbedder::new(3).fit(&texts);

    let mut index = VectorIndex::new(3).with_profile(EmbeddingProfile::TfIdf(vocabulary.clone()));
    index
        .build(vocabulary.transform(&texts), vec![meta(1, 0), meta(1, 1)])
        .expect("build index");
    index.save(temp_dir.path(), "tfidf").expect("save index");

    let loaded = VectorIndex::load(temp_dir.path(), "tfidf").expect("load index");
    assert_eq!(loaded.profile(), Some(&EmbeddingProfile::TfIdf(vocabulary)));
}

#[test]
fn loading_unknown_snapshot_is_not_found() {
    let temp_dir = TempDir::new().expect("temp dir");
    sample_index().save(temp_dir.path(), "v1").expect("save index");

    let result = VectorIndex::load(temp_dir.path(), "v2");
    assert!(matches!(
        result,
        Err(RetrievalError::IndexNotFound { ref name, .. }) if name == "v2"
    ));
}

#[test]
fn empty_index_round_trips_as_empty() {
    let temp_dir = TempDir::new().expect("temp dir");
    let mut index = VectorIndex::new(8);
    index.build(Vec::new(), Vec::new()).expect("build empty index");
    index.save(temp_dir.path(), "empty").expect("save index");

    let loaded = VectorIndex::load(temp_dir.path(), "empty").expect("load index");
    assert!(loaded.is_empty());
    assert_eq!(loaded.dimension(), 8);
}

#[test]
fn shared_index_swaps_without_disturbing_readers() {
    let shared = SharedIndex::new(VectorIndex::new(3));
    let before = shared.current();

    shared.replace(sample_index());

    assert!(before.is_empty());
    assert_eq!(shared.current().len(), 4);
}

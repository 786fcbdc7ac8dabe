use crate::{
    document_db::{DocumentDb, FileKind},
    error::Result,
    vector_db::VectorDb,
};

/// A candidate document with its content-similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub doc_id: u64,
    pub score: f32,
}

/// Cosine similarity between two vectors.
///
/// Returns 0 when either vector has zero norm or the lengths differ, so
/// zero-content and out-of-vocabulary inputs score 0 instead of NaN.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Brute-force similarity scan over every stored vector.
///
/// Scores the query against each record passing the kind filter, drops
/// non-positive scores, and returns the top `limit` in descending order.
/// Ties keep ascending-id enumeration order (stable sort). Vectors whose
/// stored model version differs from `model_version` are stale and skipped;
/// the next indexing pass refreshes them.
pub fn search_similar(
    documents: &DocumentDb,
    vectors: &VectorDb,
    query: &[f32],
    model_version: u64,
    limit: usize,
    kind: Option<FileKind>,
) -> Result<Vec<SimilarityHit>> {
    let mut hits = Vec::new();

    for (doc_id, record) in documents.list_records()? {
        if let Some(kind) = kind
            && record.kind != kind
        {
            continue;
        }

        let Some(stored) = vectors.load(doc_id)? else {
            continue;
        };
        if stored.version != model_version {
            tracing::debug!(
                doc_id,
                path = %record.relative_path,
                "skipping stale vector from an older model"
            );
            continue;
        }

        let score = cosine(query, &stored.values);
        if score > 0.0 {
            hits.push(SimilarityHit { doc_id, score });
        }
    }

    hits.sort_by(|a, b| {
        b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_db::DocumentRecord;

    #[test]
    fn cosine_self_similarity_is_one() {
        let v = vec![0.3, 0.4, 0.5];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = vec![0.1, 0.9, 0.2];
        let b = vec![0.7, 0.3, 0.5];
        assert!((cosine(&a, &b) - cosine(&b, &a)).abs() < 1e-7);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_zero_norm_is_zero_not_nan() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_length_mismatch_is_zero() {
        assert_eq!(cosine(&[1.0], &[1.0, 0.0]), 0.0);
    }

    fn setup() -> (tempfile::TempDir, DocumentDb, VectorDb) {
        let tmp = tempfile::tempdir().unwrap();
        let documents =
            DocumentDb::open(&tmp.path().join("index.redb")).unwrap();
        let vectors =
            VectorDb::open(&tmp.path().join("vectors.redb")).unwrap();
        (tmp, documents, vectors)
    }

    fn record(path: &str, kind: FileKind) -> DocumentRecord {
        DocumentRecord {
            root: "home".to_string(),
            relative_path: path.to_string(),
            display_name: path.to_string(),
            kind,
            size: 1,
            mtime: 1,
            preview: String::new(),
        }
    }

    #[test]
    fn returns_top_hits_in_descending_order() {
        let (_tmp, documents, vectors) = setup();

        documents.upsert_record(1, &record("a.txt", FileKind::Text)).unwrap();
        documents.upsert_record(2, &record("b.txt", FileKind::Text)).unwrap();
        documents.upsert_record(3, &record("c.txt", FileKind::Text)).unwrap();
        vectors.store(1, 7, &[1.0, 0.0]).unwrap();
        vectors.store(2, 7, &[0.6, 0.8]).unwrap();
        vectors.store(3, 7, &[0.0, 1.0]).unwrap();

        let hits = search_similar(
            &documents,
            &vectors,
            &[1.0, 0.0],
            7,
            10,
            None,
        )
        .unwrap();

        // Doc 3 is orthogonal (score 0) and must be dropped.
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, 1);
        assert_eq!(hits[1].doc_id, 2);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn respects_limit() {
        let (_tmp, documents, vectors) = setup();

        for id in 1..=5u64 {
            documents
                .upsert_record(id, &record(&format!("{id}.txt"), FileKind::Text))
                .unwrap();
            vectors.store(id, 7, &[1.0, 0.1 * id as f32]).unwrap();
        }

        let hits =
            search_similar(&documents, &vectors, &[1.0, 0.0], 7, 2, None)
                .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn kind_filter_excludes_other_kinds() {
        let (_tmp, documents, vectors) = setup();

        documents.upsert_record(1, &record("a.txt", FileKind::Text)).unwrap();
        documents
            .upsert_record(2, &record("b.pdf", FileKind::Document))
            .unwrap();
        vectors.store(1, 7, &[1.0, 0.0]).unwrap();
        vectors.store(2, 7, &[1.0, 0.0]).unwrap();

        let hits = search_similar(
            &documents,
            &vectors,
            &[1.0, 0.0],
            7,
            10,
            Some(FileKind::Document),
        )
        .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, 2);
    }

    #[test]
    fn stale_model_versions_are_skipped() {
        let (_tmp, documents, vectors) = setup();

        documents.upsert_record(1, &record("a.txt", FileKind::Text)).unwrap();
        documents.upsert_record(2, &record("b.txt", FileKind::Text)).unwrap();
        vectors.store(1, 7, &[1.0, 0.0]).unwrap();
        vectors.store(2, 6, &[1.0, 0.0]).unwrap(); // older model

        let hits =
            search_similar(&documents, &vectors, &[1.0, 0.0], 7, 10, None)
                .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, 1);
    }

    #[test]
    fn equal_scores_keep_enumeration_order() {
        let (_tmp, documents, vectors) = setup();

        for id in [5u64, 9, 2] {
            documents
                .upsert_record(id, &record(&format!("{id}.txt"), FileKind::Text))
                .unwrap();
            vectors.store(id, 7, &[1.0, 0.0]).unwrap();
        }

        let hits =
            search_similar(&documents, &vectors, &[1.0, 0.0], 7, 10, None)
                .unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.doc_id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}

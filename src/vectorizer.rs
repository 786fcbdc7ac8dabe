//! Token sequences to L2-normalized tf-idf vectors.

use std::collections::HashMap;

use crate::vocabulary::Vocabulary;

/// Convert a token sequence into a weighted, normalized vector of length
/// equal to the model's term count.
///
/// Weights are augmented term frequency times idf:
/// `vector[index(t)] = (tf(t) / max_tf) * idf(t)`. Terms absent from the
/// model are dropped. The result is L2-normalized; if no term overlaps the
/// model the vector stays all zeros. An empty model yields a zero-length
/// vector, which callers treat as "no signal" rather than a fault.
pub fn vectorize(tokens: &[String], vocab: &Vocabulary) -> Vec<f32> {
    if vocab.is_empty() {
        return Vec::new();
    }

    let mut tf: HashMap<&str, f32> = HashMap::new();
    for token in tokens {
        *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
    }

    let max_tf = tf.values().copied().fold(1.0f32, f32::max);

    let mut vector = vec![0.0f32; vocab.len()];
    for (term, count) in &tf {
        if let Some(idx) = vocab.index_of(term) {
            vector[idx] = (count / max_tf) * vocab.idf(idx);
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }

    vector
}

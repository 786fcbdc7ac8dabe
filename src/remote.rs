//! Optional secondary scoring via an external embedding source.
//!
//! An [`AltScorer`] produces dense vectors from a remote or otherwise
//! expensive model. The whole path is best-effort: scorer failures are
//! logged and ranking falls back to the primary content score, never
//! propagating an error to the caller.

use std::{
    hash::{Hash, Hasher},
    time::Duration,
};

use crate::{error::Result, vector_db::VectorDb};

/// A pluggable source of dense vectors for text.
pub trait AltScorer {
    /// Stable identifier for this scorer; vectors it produced are tagged
    /// with a hash of it so mixing scorers is detected.
    fn name(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Version tag stored alongside vectors produced by the named scorer.
pub fn scorer_version(name: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Batch shape for calls into a rate-limited external scorer.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub pace: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 8,
            pace: Duration::from_millis(200),
        }
    }
}

/// Embed documents through the scorer in bounded, paced batches and store
/// the resulting secondary vectors.
///
/// Scorer failures skip the affected document with a warning; storage
/// failures are real errors and propagate. Returns how many vectors were
/// stored.
pub fn embed_and_store(
    scorer: &dyn AltScorer,
    vectors: &VectorDb,
    documents: &[(u64, String)],
    options: &BatchOptions,
) -> Result<usize> {
    if documents.is_empty() {
        return Ok(0);
    }

    let version = scorer_version(scorer.name());
    let batch_size = options.batch_size.max(1);
    let mut stored = 0usize;

    for (i, batch) in documents.chunks(batch_size).enumerate() {
        if i > 0 && !options.pace.is_zero() {
            std::thread::sleep(options.pace);
        }

        for (doc_id, text) in batch {
            match scorer.embed(text) {
                Ok(values) => {
                    vectors.store_alt(*doc_id, version, &values)?;
                    stored += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        doc_id,
                        scorer = scorer.name(),
                        "secondary scorer failed, keeping primary signal only: {e}"
                    );
                }
            }
        }
    }

    Ok(stored)
}

/// Strategy for combining the primary content similarity with an optional
/// secondary similarity.
pub trait AltFusion {
    fn fuse(&self, content: f32, alternate: Option<f32>) -> f32;
}

/// Default strategy: use the alternate similarity when both sides have a
/// secondary vector, otherwise keep the primary score.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferAlternate;

impl AltFusion for PreferAlternate {
    fn fuse(&self, content: f32, alternate: Option<f32>) -> f32 {
        alternate.unwrap_or(content)
    }
}

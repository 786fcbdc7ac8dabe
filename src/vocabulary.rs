//! Document-frequency vocabulary shared by every stored vector.
//!
//! A `Vocabulary` assigns each distinct term a dense index in discovery order
//! and an inverse-document-frequency weight. Index assignment is only
//! meaningful within a single model instance, so the model is always rebuilt
//! in full; the version hash lets stored vectors be checked against the model
//! that is currently loaded.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Term index and idf weights built from a corpus of token sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    indices: HashMap<String, usize>,
    idf: Vec<f32>,
    terms: Vec<String>,
    version: u64,
}

/// Serializable form of a [`Vocabulary`]: `terms[i]` owns index `i` and
/// weight `idf[i]`. Round-tripping reproduces identical index assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularySnapshot {
    pub terms: Vec<String>,
    pub idf: Vec<f32>,
    pub version: u64,
}

impl Vocabulary {
    /// Build a fresh model from per-document token sequences.
    ///
    /// Document frequency counts each term once per document regardless of
    /// repetition. `idf(term) = ln((N+1)/(df(term)+1)) + 1`, which stays
    /// strictly positive for any corpus size and document frequency.
    pub fn build(corpus: &[Vec<String>]) -> Self {
        let mut indices: HashMap<String, usize> = HashMap::new();
        let mut terms: Vec<String> = Vec::new();
        let mut df: Vec<u32> = Vec::new();

        for tokens in corpus {
            let mut seen: HashSet<&str> = HashSet::new();
            for token in tokens {
                if !seen.insert(token) {
                    continue;
                }
                match indices.get(token).copied() {
                    Some(idx) => df[idx] += 1,
                    None => {
                        indices.insert(token.clone(), terms.len());
                        terms.push(token.clone());
                        df.push(1);
                    }
                }
            }
        }

        let n = corpus.len() as f32;
        let idf = df
            .iter()
            .map(|&d| ((n + 1.0) / (d as f32 + 1.0)).ln() + 1.0)
            .collect();

        let version = hash_terms(&terms);
        Self {
            indices,
            idf,
            terms,
            version,
        }
    }

    /// Number of terms (the dimensionality of every vector built against
    /// this model).
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The dense index assigned to `term`, if it is in the model.
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.indices.get(term).copied()
    }

    /// The idf weight for the term owning `index`.
    pub fn idf(&self, index: usize) -> f32 {
        self.idf[index]
    }

    /// Hash of the ordered term list, identifying this model instance.
    /// Vectors stored under a different version must not be compared
    /// against vectors from this one.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn to_snapshot(&self) -> VocabularySnapshot {
        VocabularySnapshot {
            terms: self.terms.clone(),
            idf: self.idf.clone(),
            version: self.version,
        }
    }

    /// Restore a model from a snapshot, reproducing the exact index
    /// assignment and weights it was exported with.
    pub fn from_snapshot(snapshot: VocabularySnapshot) -> Self {
        let indices = snapshot
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        let version = hash_terms(&snapshot.terms);

        Self {
            indices,
            idf: snapshot.idf,
            terms: snapshot.terms,
            version,
        }
    }
}

fn hash_terms(terms: &[String]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    terms.len().hash(&mut hasher);
    for term in terms {
        term.hash(&mut hasher);
    }
    hasher.finish()
}

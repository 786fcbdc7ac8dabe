//! Multi-signal ranking: content similarity, usage-history recency, and
//! path/filename overlap fused into one ordered result set.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    doc_id::DocumentId,
    document_db::{DocumentDb, FileKind},
    error::Result,
    history_db::{self, HistoryDb},
    remote::{AltFusion, AltScorer},
    similarity::{self, cosine},
    tokenizer::tokenize,
    vector_db::VectorDb,
    vectorizer::vectorize,
};

/// Fused-score weights when the document has history for the site.
const W_CONTENT: f32 = 0.50;
const W_HISTORY: f32 = 0.35;
const W_PATH: f32 = 0.15;

/// Without history the history weight is redistributed instead of scoring
/// a structural zero, so never-used files are not penalized by the full
/// history share.
const W_CONTENT_NO_HISTORY: f32 = 0.75;
const W_PATH_NO_HISTORY: f32 = 0.25;

/// History decays to the floor over this many days.
const DECAY_DAYS: f32 = 90.0;
const BOOST_FLOOR: f32 = 0.1;

/// Candidates fetched from the similarity scan beyond the requested count,
/// leaving room for re-ranking.
const OVERFETCH_FACTOR: usize = 3;
const OVERFETCH_MIN: usize = 30;

const SECONDS_PER_DAY: f32 = 86_400.0;

/// One rank invocation.
#[derive(Debug, Clone)]
pub struct RankRequest<'a> {
    /// Short query context (page text, prompt, field label, ...).
    pub context: &'a str,
    /// Destination site for history lookups.
    pub site: Option<&'a str>,
    pub kind: Option<FileKind>,
    /// Maximum results to return.
    pub count: usize,
}

/// A ranked candidate file.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub rank: usize,
    pub id: String,
    #[serde(skip)]
    pub doc_id: u64,
    pub root: String,
    pub path: String,
    pub display_name: String,
    pub kind: FileKind,
    pub score: f32,
    pub content_score: f32,
    pub path_score: f32,
    pub history_count: u32,
}

/// Why a rank call produced no suggestions. None of these is an error;
/// "nothing matched" is a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// No vocabulary snapshot exists yet (nothing indexed).
    NoVocabulary,
    /// The query shares no terms with the vocabulary.
    NoQuerySignal,
    /// No stored document scored positively.
    NoCandidates,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankOutcome {
    pub suggestions: Vec<Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EmptyReason>,
}

impl RankOutcome {
    fn empty(reason: EmptyReason) -> Self {
        Self {
            suggestions: Vec::new(),
            reason: Some(reason),
        }
    }
}

/// Rank candidate files for a query context.
pub fn rank(
    request: &RankRequest<'_>,
    documents: &DocumentDb,
    vectors: &VectorDb,
    history: &HistoryDb,
    alt: Option<(&dyn AltScorer, &dyn AltFusion)>,
) -> Result<RankOutcome> {
    rank_at(
        request,
        documents,
        vectors,
        history,
        alt,
        history_db::now_epoch_secs(),
    )
}

/// [`rank`] with an explicit "now", so recency decay is deterministic.
pub fn rank_at(
    request: &RankRequest<'_>,
    documents: &DocumentDb,
    vectors: &VectorDb,
    history: &HistoryDb,
    alt: Option<(&dyn AltScorer, &dyn AltFusion)>,
    now: u64,
) -> Result<RankOutcome> {
    let Some(vocab) = documents.load_vocabulary()? else {
        return Ok(RankOutcome::empty(EmptyReason::NoVocabulary));
    };

    let query_tokens = tokenize(request.context);
    let query_vec = vectorize(&query_tokens, &vocab);
    if query_vec.is_empty() || query_vec.iter().all(|&v| v == 0.0) {
        return Ok(RankOutcome::empty(EmptyReason::NoQuerySignal));
    }

    let overfetch =
        (request.count * OVERFETCH_FACTOR).max(OVERFETCH_MIN);
    let hits = similarity::search_similar(
        documents,
        vectors,
        &query_vec,
        vocab.version(),
        overfetch,
        request.kind,
    )?;
    if hits.is_empty() {
        return Ok(RankOutcome::empty(EmptyReason::NoCandidates));
    }

    // Secondary query vector is best-effort; a scorer failure keeps the
    // primary signal.
    let alt_query: Option<Vec<f32>> = alt.and_then(|(scorer, _)| {
        match scorer.embed(request.context) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(
                    scorer = scorer.name(),
                    "secondary scorer unavailable for query: {e}"
                );
                None
            }
        }
    });

    let usage = match request.site {
        Some(site) => history.usage_for_site(site)?,
        None => Default::default(),
    };

    let query_terms: HashSet<&str> =
        query_tokens.iter().map(|t| t.as_str()).collect();

    let mut suggestions: Vec<Suggestion> = Vec::with_capacity(hits.len());
    for hit in &hits {
        let Some(record) = documents.get_record(hit.doc_id)? else {
            continue;
        };

        let mut content = hit.score;
        if let Some((scorer, fusion)) = alt {
            let alternate = alt_similarity(
                vectors,
                hit.doc_id,
                scorer,
                alt_query.as_deref(),
            )?;
            content = fusion.fuse(content, alternate);
        }

        let path_score = path_overlap(&record.relative_path, &query_terms);

        let doc_usage = usage.get(&hit.doc_id);
        let score = match doc_usage {
            Some(u) => {
                let boost = recency_boost(now, u.last_used);
                W_CONTENT * content + W_HISTORY * boost + W_PATH * path_score
            }
            None => {
                W_CONTENT_NO_HISTORY * content
                    + W_PATH_NO_HISTORY * path_score
            }
        };

        suggestions.push(Suggestion {
            rank: 0,
            id: DocumentId::new(&record.root, &record.relative_path)
                .to_string(),
            doc_id: hit.doc_id,
            root: record.root,
            path: record.relative_path,
            display_name: record.display_name,
            kind: record.kind,
            score,
            content_score: content,
            path_score,
            history_count: doc_usage.map(|u| u.count).unwrap_or(0),
        });
    }

    // Stable, so equal fused scores keep the similarity scan's order.
    suggestions.sort_by(|a, b| {
        b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
    });
    suggestions.retain(|s| s.score > 0.0);
    suggestions.truncate(request.count);

    for (i, suggestion) in suggestions.iter_mut().enumerate() {
        suggestion.rank = i + 1;
    }

    if suggestions.is_empty() {
        return Ok(RankOutcome::empty(EmptyReason::NoCandidates));
    }
    Ok(RankOutcome {
        suggestions,
        reason: None,
    })
}

fn alt_similarity(
    vectors: &VectorDb,
    doc_id: u64,
    scorer: &dyn AltScorer,
    alt_query: Option<&[f32]>,
) -> Result<Option<f32>> {
    let Some(query) = alt_query else {
        return Ok(None);
    };
    let Some(stored) = vectors.load_alt(doc_id)? else {
        return Ok(None);
    };
    if stored.version != crate::remote::scorer_version(scorer.name())
        || stored.values.len() != query.len()
    {
        return Ok(None);
    }
    Ok(Some(cosine(query, &stored.values)))
}

/// Recency-decayed history boost: 1.0 for a just-used document, linearly
/// down to a 0.1 floor at 90 days, never below.
pub(crate) fn recency_boost(now: u64, last_used: u64) -> f32 {
    let days = now.saturating_sub(last_used) as f32 / SECONDS_PER_DAY;
    (1.0 - days / DECAY_DAYS).max(BOOST_FLOOR)
}

/// Fraction of the path's tokens that appear in the query's token set.
pub(crate) fn path_overlap(
    path: &str,
    query_terms: &HashSet<&str>,
) -> f32 {
    let path_tokens = tokenize(path);
    if path_tokens.is_empty() {
        return 0.0;
    }
    let matches = path_tokens
        .iter()
        .filter(|t| query_terms.contains(t.as_str()))
        .count();
    matches as f32 / path_tokens.len() as f32
}

/// Format suggestions for human-readable terminal output.
pub fn format_human(outcome: &RankOutcome) {
    if outcome.suggestions.is_empty() {
        let reason = match outcome.reason {
            Some(EmptyReason::NoVocabulary) => "nothing indexed yet",
            Some(EmptyReason::NoQuerySignal) => {
                "query shares no terms with the index"
            }
            _ => "no matching files",
        };
        println!("No suggestions ({reason}).");
        return;
    }

    for s in &outcome.suggestions {
        let history = if s.history_count > 0 {
            format!(" (used {}x)", s.history_count)
        } else {
            String::new()
        };
        println!(
            "{:>3}. [{:.3}] {}:{} {}{history}",
            s.rank, s.score, s.root, s.path, s.id
        );
        if s.display_name != s.path {
            println!("     {}", s.display_name);
        }
    }
    println!("\n{} suggestion(s)", outcome.suggestions.len());
}

/// Format the outcome as a JSON object on stdout.
pub fn format_json(outcome: &RankOutcome) -> Result<()> {
    println!("{}", serde_json::to_string(outcome)?);
    Ok(())
}

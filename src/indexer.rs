//! Change-aware indexing: reconcile enumerated files against the stored
//! records without redoing work for unchanged content.
//!
//! Any membership change invalidates the vocabulary's index assignment, so
//! a pass that finds changes rebuilds the model over the whole corpus (new
//! text plus the stored previews of unchanged files) and re-vectorizes
//! every document. The snapshot is persisted only after all vectors have
//! been recomputed, so a crash mid-pass can never leave a model on disk
//! that disagrees with the stored vectors.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use kdam::BarExt;
use rayon::prelude::*;

use crate::{
    doc_id::DocumentId,
    document_db::{DocumentDb, DocumentRecord},
    error::{Error, Result},
    extract,
    remote::{self, AltScorer, BatchOptions},
    tokenizer::tokenize,
    vector_db::VectorDb,
    vectorizer::vectorize,
    vocabulary::Vocabulary,
    walker::{self, DiscoveredFile},
};

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub added_or_modified: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Records in the store after the pass.
    pub total_indexed: usize,
}

impl IndexReport {
    pub fn is_noop(&self) -> bool {
        self.added_or_modified == 0 && self.deleted == 0
    }
}

/// Drives incremental and full indexing passes over all registered roots.
pub struct Indexer<'a> {
    documents: &'a DocumentDb,
    vectors: &'a VectorDb,
    alt: Option<(&'a dyn AltScorer, BatchOptions)>,
    progress: bool,
    in_progress: AtomicBool,
}

impl<'a> Indexer<'a> {
    pub fn new(documents: &'a DocumentDb, vectors: &'a VectorDb) -> Self {
        Self {
            documents,
            vectors,
            alt: None,
            progress: false,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Show a progress bar while vectorizing (CLI use).
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Also maintain secondary vectors through an alternate scorer.
    pub fn with_alt_scorer(
        mut self,
        scorer: &'a dyn AltScorer,
        options: BatchOptions,
    ) -> Self {
        self.alt = Some((scorer, options));
        self
    }

    pub fn is_indexing(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Number of indexed documents.
    pub fn count(&self) -> Result<usize> {
        self.documents.record_count()
    }

    /// Incremental pass: only new, changed, and deleted files cause work.
    pub fn sync(&self) -> Result<IndexReport> {
        self.run(false)
    }

    /// Full pass: clear everything and re-index from scratch.
    pub fn rebuild(&self) -> Result<IndexReport> {
        self.run(true)
    }

    fn run(&self, full: bool) -> Result<IndexReport> {
        // Indexing must not interleave with itself; rank queries keep
        // serving from the last committed snapshot meanwhile.
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return Err(Error::IndexInProgress);
        }
        let result = self.run_inner(full);
        self.in_progress.store(false, Ordering::SeqCst);
        result
    }

    fn run_inner(&self, full: bool) -> Result<IndexReport> {
        let discovered = self.enumerate_roots()?;

        if full {
            self.documents.clear_records()?;
            self.vectors.clear()?;
        }

        let known: HashMap<u64, DocumentRecord> =
            self.documents.list_records()?.into_iter().collect();

        // Partition against stored fingerprints.
        let mut changed: Vec<(u64, String, DiscoveredFile)> = Vec::new();
        let mut unchanged: Vec<(u64, DocumentRecord)> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();

        for (root, file) in &discovered {
            let rel = file.relative_path.to_string_lossy();
            let id = DocumentId::new(root, &rel).numeric;
            seen.insert(id);
            match known.get(&id) {
                Some(record)
                    if record.fingerprint_matches(file.size, file.mtime) =>
                {
                    unchanged.push((id, record.clone()));
                }
                _ => changed.push((id, root.clone(), file.clone())),
            }
        }

        let deleted: Vec<u64> =
            known.keys().filter(|id| !seen.contains(id)).copied().collect();

        if changed.is_empty() && deleted.is_empty() {
            tracing::debug!(
                documents = unchanged.len(),
                "no changes detected, index is current"
            );
            return Ok(IndexReport {
                added_or_modified: 0,
                unchanged: unchanged.len(),
                deleted: 0,
                total_indexed: unchanged.len(),
            });
        }

        self.documents.batch_remove_records(&deleted)?;
        self.vectors.batch_remove(&deleted)?;

        // Text extraction is the expensive per-file step; only changed and
        // new files pay it.
        let refreshed: Vec<(u64, DocumentRecord)> = changed
            .par_iter()
            .map(|(id, root, file)| {
                let extraction = extract::extract(file);
                let record = DocumentRecord {
                    root: root.clone(),
                    relative_path: file
                        .relative_path
                        .to_string_lossy()
                        .into_owned(),
                    display_name: extraction.display_name,
                    kind: extraction.kind,
                    size: file.size,
                    mtime: file.mtime,
                    preview: extraction.text,
                };
                (*id, record)
            })
            .collect();

        let alt_docs: Vec<(u64, String)> = if self.alt.is_some() {
            refreshed
                .iter()
                .map(|(id, r)| (*id, r.preview.clone()))
                .collect()
        } else {
            Vec::new()
        };

        // The model must cover changed and unchanged documents alike;
        // unchanged ones contribute their stored previews.
        let mut all: Vec<(u64, DocumentRecord)> = refreshed;
        all.extend(unchanged.iter().cloned());
        all.sort_by(|a, b| {
            a.1.root
                .cmp(&b.1.root)
                .then_with(|| a.1.relative_path.cmp(&b.1.relative_path))
        });

        let token_seqs: Vec<Vec<String>> =
            all.par_iter().map(|(_, r)| tokenize(&r.preview)).collect();
        let vocab = Vocabulary::build(&token_seqs);

        // Index assignment changed, so every document is re-vectorized,
        // not just the changed ones.
        let mut bar = self
            .progress
            .then(|| kdam::tqdm!(total = all.len(), desc = "vectorizing"));
        let mut computed: Vec<(u64, Vec<f32>)> = Vec::with_capacity(all.len());
        for ((id, _), tokens) in all.iter().zip(&token_seqs) {
            computed.push((*id, vectorize(tokens, &vocab)));
            if let Some(pb) = bar.as_mut() {
                let _ = pb.update(1);
            }
        }

        self.documents.batch_upsert_records(&all)?;
        self.vectors.batch_store(vocab.version(), &computed)?;
        // Snapshot last: a pass abandoned before this line leaves the
        // previous snapshot paired with the vectors it produced.
        self.documents.save_vocabulary(&vocab.to_snapshot())?;

        if let Some((scorer, options)) = &self.alt {
            let stored = remote::embed_and_store(
                *scorer,
                self.vectors,
                &alt_docs,
                options,
            )?;
            tracing::debug!(stored, "secondary vectors refreshed");
        }

        let report = IndexReport {
            added_or_modified: changed.len(),
            unchanged: unchanged.len(),
            deleted: deleted.len(),
            total_indexed: all.len(),
        };
        tracing::info!(
            added_or_modified = report.added_or_modified,
            unchanged = report.unchanged,
            deleted = report.deleted,
            total = report.total_indexed,
            "indexing pass complete"
        );
        Ok(report)
    }

    fn enumerate_roots(&self) -> Result<Vec<(String, DiscoveredFile)>> {
        let mut discovered = Vec::new();
        for root in self.documents.list_roots()? {
            let path = Path::new(&root.path);
            if !path.is_dir() {
                tracing::warn!(
                    root = %root.name,
                    path = %root.path,
                    "root directory is unavailable, skipping"
                );
                continue;
            }
            let excludes = walker::build_excludes(&root.excludes)?;
            for file in walker::discover_files(path, excludes.as_ref())? {
                discovered.push((root.name.clone(), file));
            }
        }
        Ok(discovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_db::RootConfig;

    struct Fixture {
        _data: tempfile::TempDir,
        files: tempfile::TempDir,
        documents: DocumentDb,
        vectors: VectorDb,
    }

    fn fixture() -> Fixture {
        let data = tempfile::tempdir().unwrap();
        let files = tempfile::tempdir().unwrap();
        let documents =
            DocumentDb::open(&data.path().join("index.redb")).unwrap();
        let vectors =
            VectorDb::open(&data.path().join("vectors.redb")).unwrap();
        documents
            .set_root(&RootConfig {
                name: "home".to_string(),
                path: files.path().to_string_lossy().into_owned(),
                excludes: vec![],
            })
            .unwrap();
        Fixture {
            _data: data,
            files,
            documents,
            vectors,
        }
    }

    fn write(fx: &Fixture, name: &str, content: &str) {
        let path = fx.files.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn first_sync_indexes_everything() {
        let fx = fixture();
        write(&fx, "a.txt", "rust systems programming");
        write(&fx, "b.txt", "pasta cooking instructions");

        let indexer = Indexer::new(&fx.documents, &fx.vectors);
        let report = indexer.sync().unwrap();

        assert_eq!(report.added_or_modified, 2);
        assert_eq!(report.unchanged, 0);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.total_indexed, 2);
        assert_eq!(indexer.count().unwrap(), 2);
        assert!(fx.documents.load_vocabulary().unwrap().is_some());
        assert_eq!(fx.vectors.list_ids().unwrap().len(), 2);
    }

    #[test]
    fn noop_resync_reports_zeros_and_keeps_vectors() {
        let fx = fixture();
        write(&fx, "a.txt", "rust systems programming");

        let indexer = Indexer::new(&fx.documents, &fx.vectors);
        indexer.sync().unwrap();

        let id = DocumentId::new("home", "a.txt").numeric;
        let before = fx.vectors.load(id).unwrap().unwrap();

        let report = indexer.sync().unwrap();
        assert!(report.is_noop());
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.total_indexed, 1);

        let after = fx.vectors.load(id).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn changed_file_is_reindexed() {
        let fx = fixture();
        write(&fx, "a.txt", "first draft");

        let indexer = Indexer::new(&fx.documents, &fx.vectors);
        indexer.sync().unwrap();

        // Different length so the fingerprint changes even within the same
        // mtime second.
        write(&fx, "a.txt", "second draft with far more words in it");
        let report = indexer.sync().unwrap();

        assert_eq!(report.added_or_modified, 1);
        assert_eq!(report.deleted, 0);

        let id = DocumentId::new("home", "a.txt").numeric;
        let record = fx.documents.get_record(id).unwrap().unwrap();
        assert!(record.preview.contains("second draft"));
    }

    #[test]
    fn deleted_file_is_removed_and_model_rebuilt() {
        let fx = fixture();
        write(&fx, "keep.txt", "shared words here");
        write(&fx, "gone.txt", "exclusive vanishing terms");

        let indexer = Indexer::new(&fx.documents, &fx.vectors);
        indexer.sync().unwrap();
        let old_version =
            fx.documents.load_vocabulary().unwrap().unwrap().version();

        std::fs::remove_file(fx.files.path().join("gone.txt")).unwrap();
        let report = indexer.sync().unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.total_indexed, 1);

        let gone = DocumentId::new("home", "gone.txt").numeric;
        assert!(fx.documents.get_record(gone).unwrap().is_none());
        assert!(fx.vectors.load(gone).unwrap().is_none());

        // The removed document's exclusive terms left the model.
        let new_version =
            fx.documents.load_vocabulary().unwrap().unwrap().version();
        assert_ne!(old_version, new_version);
    }

    #[test]
    fn unchanged_files_are_revectorized_against_the_new_model() {
        let fx = fixture();
        write(&fx, "stable.txt", "unmoving content");

        let indexer = Indexer::new(&fx.documents, &fx.vectors);
        indexer.sync().unwrap();

        write(&fx, "fresh.txt", "brand new vocabulary entries");
        indexer.sync().unwrap();

        let vocab = fx.documents.load_vocabulary().unwrap().unwrap();
        let stable = DocumentId::new("home", "stable.txt").numeric;
        let stored = fx.vectors.load(stable).unwrap().unwrap();

        assert_eq!(stored.version, vocab.version());
        assert_eq!(stored.values.len(), vocab.len());
    }

    #[test]
    fn rebuild_reindexes_from_scratch() {
        let fx = fixture();
        write(&fx, "a.txt", "alpha content");
        write(&fx, "b.txt", "beta content");

        let indexer = Indexer::new(&fx.documents, &fx.vectors);
        indexer.sync().unwrap();

        let report = indexer.rebuild().unwrap();
        assert_eq!(report.added_or_modified, 2);
        assert_eq!(report.unchanged, 0);
        assert_eq!(report.total_indexed, 2);
    }

    #[test]
    fn missing_root_directory_is_skipped() {
        let fx = fixture();
        fx.documents
            .set_root(&RootConfig {
                name: "ghost".to_string(),
                path: "/nonexistent/attache-test".to_string(),
                excludes: vec![],
            })
            .unwrap();
        write(&fx, "a.txt", "content");

        let report = Indexer::new(&fx.documents, &fx.vectors).sync().unwrap();
        assert_eq!(report.total_indexed, 1);
    }

    #[test]
    fn excludes_are_honored() {
        let fx = fixture();
        fx.documents
            .set_root(&RootConfig {
                name: "home".to_string(),
                path: fx.files.path().to_string_lossy().into_owned(),
                excludes: vec!["*.log".to_string()],
            })
            .unwrap();
        write(&fx, "keep.txt", "kept");
        write(&fx, "noise.log", "ignored");

        let report = Indexer::new(&fx.documents, &fx.vectors).sync().unwrap();
        assert_eq!(report.total_indexed, 1);
    }

    #[test]
    fn concurrent_pass_is_rejected() {
        let fx = fixture();
        let indexer = Indexer::new(&fx.documents, &fx.vectors);

        indexer.in_progress.store(true, Ordering::SeqCst);
        assert!(indexer.is_indexing());
        assert!(matches!(indexer.sync(), Err(Error::IndexInProgress)));

        // The stuck flag belongs to the aborted caller; clearing it lets
        // the next pass proceed.
        indexer.in_progress.store(false, Ordering::SeqCst);
        assert!(indexer.sync().is_ok());
    }

    #[test]
    fn alt_scorer_vectors_are_stored_for_changed_files() {
        struct Constant;
        impl AltScorer for Constant {
            fn name(&self) -> &str {
                "constant"
            }
            fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(vec![0.5, 0.5])
            }
        }

        let fx = fixture();
        write(&fx, "a.txt", "alpha content");

        let options = BatchOptions {
            batch_size: 4,
            pace: std::time::Duration::ZERO,
        };
        let scorer = Constant;
        let indexer = Indexer::new(&fx.documents, &fx.vectors)
            .with_alt_scorer(&scorer, options);
        indexer.sync().unwrap();

        let id = DocumentId::new("home", "a.txt").numeric;
        let alt = fx.vectors.load_alt(id).unwrap().unwrap();
        assert_eq!(alt.version, remote::scorer_version("constant"));
        assert_eq!(alt.values, vec![0.5, 0.5]);
    }
}

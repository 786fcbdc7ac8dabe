//! attache - a local file relevance engine.
//!
//! attache keeps an incrementally-updated tf-idf index over registered
//! directories and, given a short query context, suggests the files most
//! likely to be wanted - fusing content similarity with usage-history
//! recency and path/filename overlap.
//!
//! # Quick start
//!
//! ```no_run
//! use attache::{DataDir, DocumentDb, HistoryDb, Indexer, VectorDb};
//! use attache::ranker::{self, RankRequest};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let documents = DocumentDb::open(&data_dir.index_db()).unwrap();
//! let vectors = VectorDb::open(&data_dir.vectors_db()).unwrap();
//! let history = HistoryDb::open(&data_dir.history_db()).unwrap();
//!
//! let report = Indexer::new(&documents, &vectors).sync().unwrap();
//! println!("{} document(s) indexed", report.total_indexed);
//!
//! let request = RankRequest {
//!     context: "please upload your resume",
//!     site: Some("jobs.example"),
//!     kind: None,
//!     count: 5,
//! };
//! let outcome =
//!     ranker::rank(&request, &documents, &vectors, &history, None).unwrap();
//! for s in &outcome.suggestions {
//!     println!("{}. [{:.3}] {}:{}", s.rank, s.score, s.root, s.path);
//! }
//! ```

pub mod cli;
pub mod data_dir;
pub mod doc_id;
pub mod document_db;
pub mod error;
pub mod extract;
pub mod history_db;
pub mod indexer;
pub mod ranker;
pub mod remote;
pub mod scheduler;
pub mod similarity;
pub mod tokenizer;
pub mod vector_db;
pub mod vectorizer;
pub mod vocabulary;
pub mod walker;

pub use data_dir::DataDir;
pub use doc_id::DocumentId;
pub use document_db::{DocumentDb, DocumentRecord, FileKind, RootConfig};
pub use error::{Error, Result};
pub use history_db::HistoryDb;
pub use indexer::{IndexReport, Indexer};
pub use vector_db::VectorDb;
pub use vocabulary::Vocabulary;

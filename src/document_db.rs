use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    vocabulary::{Vocabulary, VocabularySnapshot},
};

const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
const ROOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("roots");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");
const VOCABULARY: TableDefinition<&str, &[u8]> =
    TableDefinition::new("vocabulary");

/// Key under which the single current vocabulary snapshot is stored.
const VOCABULARY_KEY: &str = "current";

/// Coarse file classification used for type filtering at rank time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Plain-text formats whose content is indexed directly.
    Text,
    /// Structured or binary document formats (pdf, office, ...).
    Document,
    Image,
    Other,
}

impl std::str::FromStr for FileKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "document" => Ok(Self::Document),
            "image" => Ok(Self::Image),
            "other" => Ok(Self::Other),
            other => Err(Error::Config(format!(
                "unknown file kind '{other}' (expected text, document, image, or other)"
            ))),
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Document => "document",
            Self::Image => "image",
            Self::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// One indexed file.
///
/// The (size, mtime) fingerprint reflects the exact file version the stored
/// vector was derived from; a differing fingerprint on disk means the record
/// must be refreshed before its vector is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub root: String,
    pub relative_path: String,
    pub display_name: String,
    pub kind: FileKind,
    pub size: u64,
    pub mtime: u64,
    /// Bounded text surrogate; also the corpus text used when the
    /// vocabulary is rebuilt without re-reading unchanged files.
    pub preview: String,
}

impl DocumentRecord {
    pub fn fingerprint_matches(&self, size: u64, mtime: u64) -> bool {
        self.size == size && self.mtime == mtime
    }
}

/// A registered root directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootConfig {
    pub name: String,
    pub path: String,
    /// Glob patterns excluded during enumeration, relative to the root.
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// Keyed store for document records, root definitions, settings, and the
/// vocabulary snapshot, backed by a single redb file.
pub struct DocumentDb {
    db: Database,
}

impl DocumentDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.open_table(ROOTS)?;
        txn.open_table(SETTINGS)?;
        txn.open_table(VOCABULARY)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Document records --

    pub fn upsert_record(
        &self,
        doc_id: u64,
        record: &DocumentRecord,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS)?;
            table.insert(doc_id, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Upsert multiple records in a single transaction.
    pub fn batch_upsert_records(
        &self,
        entries: &[(u64, DocumentRecord)],
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS)?;
            for (doc_id, record) in entries {
                let bytes = serde_json::to_vec(record)?;
                table.insert(*doc_id, bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_record(&self, doc_id: u64) -> Result<Option<DocumentRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        match table.get(doc_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn remove_record(&self, doc_id: u64) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(RECORDS)?;
            table.remove(doc_id)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Remove multiple records in a single transaction.
    pub fn batch_remove_records(&self, doc_ids: &[u64]) -> Result<()> {
        if doc_ids.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS)?;
            for &doc_id in doc_ids {
                table.remove(doc_id)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// All records in ascending id order (the enumeration order similarity
    /// ties fall back to).
    pub fn list_records(&self) -> Result<Vec<(u64, DocumentRecord)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value(), serde_json::from_slice(v.value())?));
        }
        Ok(result)
    }

    pub fn record_count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let mut count = 0usize;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Drop every record (full, non-incremental rebuild path).
    pub fn clear_records(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.delete_table(RECORDS)?;
        txn.open_table(RECORDS)?;
        txn.commit()?;
        Ok(())
    }

    // -- Roots --

    pub fn set_root(&self, root: &RootConfig) -> Result<()> {
        let bytes = serde_json::to_vec(root)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ROOTS)?;
            table.insert(root.name.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_root(&self, name: &str) -> Result<Option<RootConfig>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ROOTS)?;
        match table.get(name)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn remove_root(&self, name: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(ROOTS)?;
            table.remove(name)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_roots(&self) -> Result<Vec<RootConfig>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ROOTS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    // -- Vocabulary snapshot --

    /// Persist the current model snapshot. Callers only do this after every
    /// vector in the store has been recomputed against it.
    pub fn save_vocabulary(
        &self,
        snapshot: &VocabularySnapshot,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(VOCABULARY)?;
            table.insert(VOCABULARY_KEY, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn load_vocabulary(&self) -> Result<Option<Vocabulary>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(VOCABULARY)?;
        match table.get(VOCABULARY_KEY)? {
            Some(guard) => {
                let snapshot: VocabularySnapshot =
                    serde_json::from_slice(guard.value())?;
                Ok(Some(Vocabulary::from_snapshot(snapshot)))
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for DocumentDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentDb").finish_non_exhaustive()
    }
}

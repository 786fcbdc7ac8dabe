use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::error::Result;

const CONTENT_VECTORS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("content_vectors");
const ALT_VECTORS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("alt_vectors");

/// Header size: 8 bytes model version + 4 bytes dimension.
const HEADER_SIZE: usize = 12;

/// A stored vector tagged with the version of the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVector {
    pub version: u64,
    pub values: Vec<f32>,
}

/// Stores per-document vectors keyed by numeric document ID.
///
/// Binary format per entry:
/// - 8 bytes: model version (u64 LE): vocabulary hash for content vectors,
///   scorer hash for secondary vectors
/// - 4 bytes: dimension D (u32 LE)
/// - D * 4 bytes: f32 LE values
pub struct VectorDb {
    db: Database,
}

impl VectorDb {
    /// Open or create a vector database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(CONTENT_VECTORS)?;
        txn.open_table(ALT_VECTORS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Store a content vector for a document.
    pub fn store(
        &self,
        doc_id: u64,
        version: u64,
        values: &[f32],
    ) -> Result<()> {
        self.store_in(CONTENT_VECTORS, doc_id, version, values)
    }

    /// Store a secondary vector from an alternate scorer.
    pub fn store_alt(
        &self,
        doc_id: u64,
        version: u64,
        values: &[f32],
    ) -> Result<()> {
        self.store_in(ALT_VECTORS, doc_id, version, values)
    }

    fn store_in(
        &self,
        table_def: TableDefinition<u64, &[u8]>,
        doc_id: u64,
        version: u64,
        values: &[f32],
    ) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table_def)?;
            write_entry(&mut table, doc_id, version, values)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Store multiple content vectors under one model version in a single
    /// transaction.
    pub fn batch_store(
        &self,
        version: u64,
        entries: &[(u64, Vec<f32>)],
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(CONTENT_VECTORS)?;
            for (doc_id, values) in entries {
                write_entry(&mut table, *doc_id, version, values)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Retrieve a document's content vector, or None if absent or malformed.
    pub fn load(&self, doc_id: u64) -> Result<Option<StoredVector>> {
        self.load_from(CONTENT_VECTORS, doc_id)
    }

    /// Retrieve a document's secondary vector, if an alternate scorer has
    /// produced one.
    pub fn load_alt(&self, doc_id: u64) -> Result<Option<StoredVector>> {
        self.load_from(ALT_VECTORS, doc_id)
    }

    fn load_from(
        &self,
        table_def: TableDefinition<u64, &[u8]>,
        doc_id: u64,
    ) -> Result<Option<StoredVector>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table_def)?;

        let Some(guard) = table.get(doc_id)? else {
            return Ok(None);
        };
        Ok(decode_entry(guard.value()))
    }

    /// Remove a document's vectors (content and secondary) in a single
    /// transaction.
    pub fn remove(&self, doc_id: u64) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut content = txn.open_table(CONTENT_VECTORS)?;
            let mut alt = txn.open_table(ALT_VECTORS)?;
            let had_content = content.remove(doc_id)?.is_some();
            let had_alt = alt.remove(doc_id)?.is_some();
            had_content || had_alt
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Remove vectors for multiple documents in a single transaction.
    pub fn batch_remove(&self, doc_ids: &[u64]) -> Result<()> {
        if doc_ids.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut content = txn.open_table(CONTENT_VECTORS)?;
            let mut alt = txn.open_table(ALT_VECTORS)?;
            for &doc_id in doc_ids {
                content.remove(doc_id)?;
                alt.remove(doc_id)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// List all document IDs holding a content vector.
    pub fn list_ids(&self) -> Result<Vec<u64>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CONTENT_VECTORS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, _) = entry?;
            result.push(k.value());
        }
        Ok(result)
    }

    /// Drop every stored vector (full rebuild path).
    pub fn clear(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.delete_table(CONTENT_VECTORS)?;
        txn.delete_table(ALT_VECTORS)?;
        txn.open_table(CONTENT_VECTORS)?;
        txn.open_table(ALT_VECTORS)?;
        txn.commit()?;
        Ok(())
    }
}

fn write_entry(
    table: &mut redb::Table<'_, u64, &[u8]>,
    doc_id: u64,
    version: u64,
    values: &[f32],
) -> Result<()> {
    let byte_len = HEADER_SIZE + std::mem::size_of_val(values);
    let mut guard = table.insert_reserve(doc_id, byte_len)?;
    let dest = guard.as_mut();

    dest[0..8].copy_from_slice(&version.to_le_bytes());
    dest[8..12].copy_from_slice(&(values.len() as u32).to_le_bytes());
    dest[HEADER_SIZE..].copy_from_slice(bytemuck::cast_slice(values));
    Ok(())
}

fn decode_entry(bytes: &[u8]) -> Option<StoredVector> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }

    let version = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let dimension = u32::from_le_bytes(bytes[8..12].try_into().unwrap());

    let expected_len = HEADER_SIZE + (dimension as usize) * 4;
    if bytes.len() != expected_len {
        return None;
    }

    // pod_collect_to_vec copies, so the source alignment does not matter.
    let values: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes[HEADER_SIZE..]);
    Some(StoredVector { version, values })
}

impl std::fmt::Debug for VectorDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, VectorDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = VectorDb::open(&tmp.path().join("vectors.redb")).unwrap();
        (tmp, db)
    }

    #[test]
    fn store_and_load() {
        let (_tmp, db) = test_db();

        db.store(42, 7, &[0.1, 0.2, 0.3]).unwrap();

        let stored = db.load(42).unwrap().unwrap();
        assert_eq!(stored.version, 7);
        assert_eq!(stored.values, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn load_missing_returns_none() {
        let (_tmp, db) = test_db();
        assert!(db.load(999).unwrap().is_none());
    }

    #[test]
    fn content_and_alt_are_independent() {
        let (_tmp, db) = test_db();

        db.store(1, 7, &[1.0, 0.0]).unwrap();
        assert!(db.load_alt(1).unwrap().is_none());

        db.store_alt(1, 99, &[0.5, 0.5, 0.5]).unwrap();
        assert_eq!(db.load(1).unwrap().unwrap().values, vec![1.0, 0.0]);
        assert_eq!(db.load_alt(1).unwrap().unwrap().version, 99);
    }

    #[test]
    fn remove_clears_both_tables() {
        let (_tmp, db) = test_db();

        db.store(1, 7, &[1.0]).unwrap();
        db.store_alt(1, 9, &[2.0]).unwrap();

        assert!(db.remove(1).unwrap());
        assert!(db.load(1).unwrap().is_none());
        assert!(db.load_alt(1).unwrap().is_none());
        assert!(!db.remove(1).unwrap());
    }

    #[test]
    fn batch_store_and_list_ids() {
        let (_tmp, db) = test_db();

        db.batch_store(7, &[
            (10, vec![1.0, 0.0]),
            (20, vec![0.0, 1.0]),
            (30, vec![0.5, 0.5]),
        ])
        .unwrap();

        assert_eq!(db.list_ids().unwrap(), vec![10, 20, 30]);
        assert_eq!(db.load(20).unwrap().unwrap().version, 7);
    }

    #[test]
    fn batch_remove() {
        let (_tmp, db) = test_db();

        db.batch_store(7, &[(1, vec![1.0]), (2, vec![2.0]), (3, vec![3.0])])
            .unwrap();
        db.batch_remove(&[1, 3]).unwrap();
        assert_eq!(db.list_ids().unwrap(), vec![2]);
    }

    #[test]
    fn overwrite_replaces_version_and_values() {
        let (_tmp, db) = test_db();

        db.store(42, 7, &[1.0, 2.0]).unwrap();
        db.store(42, 8, &[3.0]).unwrap();

        let stored = db.load(42).unwrap().unwrap();
        assert_eq!(stored.version, 8);
        assert_eq!(stored.values, vec![3.0]);
    }

    #[test]
    fn empty_vector_roundtrips() {
        let (_tmp, db) = test_db();
        db.store(1, 7, &[]).unwrap();
        let stored = db.load(1).unwrap().unwrap();
        assert!(stored.values.is_empty());
    }

    #[test]
    fn clear_empties_everything() {
        let (_tmp, db) = test_db();
        db.store(1, 7, &[1.0]).unwrap();
        db.store_alt(2, 9, &[2.0]).unwrap();

        db.clear().unwrap();
        assert!(db.list_ids().unwrap().is_empty());
        assert!(db.load_alt(2).unwrap().is_none());
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vectors.redb");

        {
            let db = VectorDb::open(&path).unwrap();
            db.store(42, 7, &[1.0, 2.0]).unwrap();
        }

        {
            let db = VectorDb::open(&path).unwrap();
            let stored = db.load(42).unwrap().unwrap();
            assert_eq!(stored.values, vec![1.0, 2.0]);
        }
    }
}

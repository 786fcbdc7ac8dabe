use std::{collections::HashMap, path::Path, time::SystemTime};

use percent_encoding::percent_decode_str;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Entries keyed by (site, sequence id) so per-site lookups are range scans.
const ENTRIES: TableDefinition<(&str, u64), &[u8]> =
    TableDefinition::new("entries");
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const SEQ_COUNTER: &str = "seq";

/// Seconds since the Unix epoch.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A confirmed file-selection event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub seq: u64,
    pub doc_id: u64,
    pub site: String,
    pub page_url: String,
    pub page_title: String,
    /// Free-text context captured at selection time.
    pub context: String,
    pub timestamp: u64,
}

/// Fields of a selection event supplied by the caller; the store assigns
/// the sequence id.
#[derive(Debug, Clone)]
pub struct SelectionEvent {
    pub doc_id: u64,
    pub site: String,
    pub page_url: String,
    pub page_title: String,
    pub context: String,
}

/// Per-document usage aggregate for one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentUsage {
    pub count: u32,
    /// Timestamp of the most recent selection.
    pub last_used: u64,
}

/// Append-only log of past file selections, indexed by destination site.
pub struct HistoryDb {
    db: Database,
}

impl HistoryDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(ENTRIES)?;
        txn.open_table(COUNTERS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Record a selection event. Returns the entry as written, with its
    /// assigned sequence id and a percent-decoded page URL.
    pub fn append(
        &self,
        event: SelectionEvent,
        timestamp: u64,
    ) -> Result<HistoryEntry> {
        let entry = HistoryEntry {
            seq: 0,
            doc_id: event.doc_id,
            site: event.site,
            page_url: normalize_url(&event.page_url),
            page_title: event.page_title,
            context: event.context,
            timestamp,
        };

        let txn = self.db.begin_write()?;
        let entry = {
            let mut counters = txn.open_table(COUNTERS)?;
            let seq = counters
                .get(SEQ_COUNTER)?
                .map(|v| v.value())
                .unwrap_or(0)
                + 1;
            counters.insert(SEQ_COUNTER, seq)?;

            let entry = HistoryEntry { seq, ..entry };
            let bytes = serde_json::to_vec(&entry)?;
            let mut entries = txn.open_table(ENTRIES)?;
            entries.insert((entry.site.as_str(), seq), bytes.as_slice())?;
            entry
        };
        txn.commit()?;
        Ok(entry)
    }

    /// All entries for a site, in insertion order.
    pub fn list_for_site(&self, site: &str) -> Result<Vec<HistoryEntry>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTRIES)?;
        let mut result = Vec::new();
        for entry in table.range((site, 0)..=(site, u64::MAX))? {
            let (_, v) = entry?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    /// Aggregate a site's history per referenced document: how often it was
    /// selected and when it was last used.
    pub fn usage_for_site(
        &self,
        site: &str,
    ) -> Result<HashMap<u64, DocumentUsage>> {
        let mut usage: HashMap<u64, DocumentUsage> = HashMap::new();
        for entry in self.list_for_site(site)? {
            let slot = usage.entry(entry.doc_id).or_insert(DocumentUsage {
                count: 0,
                last_used: 0,
            });
            slot.count += 1;
            slot.last_used = slot.last_used.max(entry.timestamp);
        }
        Ok(usage)
    }

    /// Total number of entries ever written.
    pub fn entry_count(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(COUNTERS)?;
        Ok(table.get(SEQ_COUNTER)?.map(|v| v.value()).unwrap_or(0))
    }
}

/// Normalize a page URL for storage: strip the fragment and decode
/// percent-escapes.
pub fn normalize_url(url: &str) -> String {
    let without_fragment =
        url.split_once('#').map(|(base, _)| base).unwrap_or(url);
    percent_decode_str(without_fragment)
        .decode_utf8_lossy()
        .into_owned()
}

impl std::fmt::Debug for HistoryDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryDb").finish_non_exhaustive()
    }
}

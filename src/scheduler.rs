//! Periodic rescans without user action.
//!
//! The rescan configuration is a process-wide singleton persisted in the
//! settings table; updates are whole-record replacements. The watch loop
//! re-reads it every cycle, so enabling/disabling or changing the interval
//! takes effect without a restart.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    document_db::DocumentDb,
    error::Result,
    history_db::now_epoch_secs,
    indexer::Indexer,
    vector_db::VectorDb,
};

const RESCAN_KEY: &str = "rescan";

/// Floor for the rescan interval; anything lower would busy-loop.
const MIN_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescanConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Epoch seconds of the last completed scheduled scan, 0 if none.
    pub last_scan: u64,
}

impl Default for RescanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 900,
            last_scan: 0,
        }
    }
}

impl RescanConfig {
    pub fn load(documents: &DocumentDb) -> Result<Self> {
        match documents.get_setting(RESCAN_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, documents: &DocumentDb) -> Result<()> {
        documents.set_setting(RESCAN_KEY, &serde_json::to_string(self)?)
    }
}

/// Run scheduled incremental scans until cancelled.
///
/// Sleeps for the configured interval, then syncs all roots when rescans
/// are enabled. A failed pass is logged and the loop keeps going; only a
/// failure to reach the settings store terminates it.
pub async fn watch(
    documents: &DocumentDb,
    vectors: &VectorDb,
) -> Result<()> {
    loop {
        let config = RescanConfig::load(documents)?;
        let interval = config.interval_secs.max(MIN_INTERVAL_SECS);
        tokio::time::sleep(Duration::from_secs(interval)).await;

        if !config.enabled {
            continue;
        }

        let indexer = Indexer::new(documents, vectors);
        match indexer.sync() {
            Ok(report) => {
                tracing::info!(
                    added_or_modified = report.added_or_modified,
                    unchanged = report.unchanged,
                    deleted = report.deleted,
                    "scheduled rescan finished"
                );
            }
            Err(e) => {
                tracing::warn!("scheduled rescan failed: {e}");
                continue;
            }
        }

        let mut config = RescanConfig::load(documents)?;
        config.last_scan = now_epoch_secs();
        config.save(documents)?;
    }
}

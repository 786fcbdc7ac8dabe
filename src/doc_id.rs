use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

/// A stable document identifier derived from (root_name, relative_path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentId {
    /// The numeric ID used as the key in redb tables.
    pub numeric: u64,
    /// A short hex string for human display (e.g. "a1b2c3").
    pub short: String,
}

const SHORT_LEN: usize = 6;

impl DocumentId {
    /// Derive a stable document ID for a file within a named root.
    pub fn new(root: &str, relative_path: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        root.hash(&mut hasher);
        relative_path.hash(&mut hasher);
        let numeric = hasher.finish();

        Self {
            short: format!("{numeric:016x}")[..SHORT_LEN].to_string(),
            numeric,
        }
    }

    /// Whether `reference` (a short hex prefix, with or without a leading
    /// `#`) refers to this document.
    pub fn matches_short(&self, reference: &str) -> bool {
        let reference = reference.strip_prefix('#').unwrap_or(reference);
        !reference.is_empty()
            && format!("{:016x}", self.numeric).starts_with(reference)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.short)
    }
}

use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use globset::GlobSet;

use crate::error::Result;

/// A file observed during enumeration, with the metadata needed for
/// change detection. Size and mtime come from directory metadata, so no
/// content read happens until a file is known to be new or changed.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the root directory.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time as seconds since the Unix epoch.
    pub mtime: u64,
}

impl DiscoveredFile {
    /// The (size, mtime) fingerprint used for change detection.
    pub fn fingerprint(&self) -> (u64, u64) {
        (self.size, self.mtime)
    }
}

/// Recursively enumerate files under a root directory.
///
/// Skips hidden files/directories (names starting with `.`) and anything
/// matching `excludes`. Results are sorted by relative path.
pub fn discover_files(
    root: &Path,
    excludes: Option<&GlobSet>,
) -> Result<Vec<DiscoveredFile>> {
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, excludes, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    excludes: Option<&GlobSet>,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden files and directories.
        if name.starts_with('.') {
            continue;
        }

        if let Some(set) = excludes {
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(&path);
            if set.is_match(relative) {
                continue;
            }
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), excludes, results)?;
        } else if file_type.is_symlink() {
            // Resolve symlink and check for cycles.
            let resolved = match entry.path().canonicalize() {
                Ok(p) => p,
                Err(_) => continue, // Skip broken symlinks
            };
            // Skip if the symlink points back into or above the root
            // (cycle prevention).
            if resolved.starts_with(root) && resolved.is_dir() {
                continue;
            }
            if resolved.is_file()
                && let Some(df) = make_discovered(root, &entry.path(), &resolved)?
            {
                results.push(df);
            }
        } else if file_type.is_file()
            && let Some(df) =
                make_discovered(root, &entry.path(), &entry.path().canonicalize()?)?
        {
            results.push(df);
        }
    }

    Ok(())
}

fn make_discovered(
    root: &Path,
    original_path: &Path,
    absolute_path: &Path,
) -> Result<Option<DiscoveredFile>> {
    let relative_path = original_path
        .strip_prefix(root)
        .unwrap_or(original_path)
        .to_path_buf();

    let metadata = std::fs::metadata(absolute_path)?;
    let mtime = metadata
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    Ok(Some(DiscoveredFile {
        relative_path,
        absolute_path: absolute_path.to_path_buf(),
        size: metadata.len(),
        mtime,
    }))
}

/// Compile root exclude patterns into a matcher. Invalid patterns are a
/// configuration error.
pub fn build_excludes(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::Glob::new(pattern).map_err(|e| {
            crate::error::Error::Config(format!(
                "invalid exclude pattern '{pattern}': {e}"
            ))
        })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| {
        crate::error::Error::Config(format!("invalid exclude set: {e}"))
    })?;
    Ok(Some(set))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_all_regular_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("note.md"), "# Hello").unwrap();
        std::fs::write(tmp.path().join("photo.png"), [0u8; 16]).unwrap();

        let files = discover_files(tmp.path(), None).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn skips_hidden_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(".secret.txt"), "hidden").unwrap();
        let hidden_dir = tmp.path().join(".cache");
        std::fs::create_dir(&hidden_dir).unwrap();
        std::fs::write(hidden_dir.join("blob.txt"), "cached").unwrap();
        std::fs::write(tmp.path().join("visible.txt"), "hello").unwrap();

        let files = discover_files(tmp.path(), None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path.to_string_lossy(), "visible.txt");
    }

    #[test]
    fn recurses_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("projects").join("rust");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("deep.txt"), "deep").unwrap();
        std::fs::write(tmp.path().join("top.txt"), "top").unwrap();

        let files = discover_files(tmp.path(), None).unwrap();
        let paths: Vec<_> = files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().to_string())
            .collect();
        assert!(paths.contains(&"top.txt".to_string()));
        assert!(paths.contains(&"projects/rust/deep.txt".to_string()));
    }

    #[test]
    fn captures_size_and_mtime() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("file.txt"), "12345").unwrap();

        let files = discover_files(tmp.path(), None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 5);
        assert!(files[0].mtime > 0);
        assert_eq!(files[0].fingerprint(), (5, files[0].mtime));
    }

    #[test]
    fn results_are_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("z.txt"), "z").unwrap();
        std::fs::write(tmp.path().join("a.txt"), "a").unwrap();
        std::fs::write(tmp.path().join("m.txt"), "m").unwrap();

        let files = discover_files(tmp.path(), None).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "m.txt", "z.txt"]);
    }

    #[test]
    fn excludes_filter_matching_paths() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("keep.txt"), "keep").unwrap();
        std::fs::write(tmp.path().join("scratch.tmp"), "drop").unwrap();
        let sub = tmp.path().join("target");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("artifact.txt"), "drop").unwrap();

        let excludes =
            build_excludes(&["*.tmp".to_string(), "target".to_string()])
                .unwrap();
        let files = discover_files(tmp.path(), excludes.as_ref()).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path.to_string_lossy(), "keep.txt");
    }

    #[test]
    fn invalid_exclude_pattern_is_an_error() {
        assert!(build_excludes(&["[".to_string()]).is_err());
    }

    #[test]
    fn empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let files = discover_files(tmp.path(), None).unwrap();
        assert!(files.is_empty());
    }
}

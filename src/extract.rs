//! Best-effort text surrogates for discovered files.
//!
//! Plain-text formats are read directly (bounded); structured and binary
//! formats fall back to a surrogate derived from the path plus a kind
//! keyword. Extraction never fails a batch: whatever happens, every file
//! yields *some* text.

use std::{io::Read, path::Path};

use crate::{document_db::FileKind, walker::DiscoveredFile};

/// Cap on bytes read from a plain-text file.
pub const MAX_TEXT_BYTES: u64 = 256 * 1024;

/// Cap on the stored surrogate, in characters.
pub const MAX_SURROGATE_CHARS: usize = 8192;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "rs", "py", "js", "ts", "json", "toml",
    "yaml", "yml", "csv", "tsv", "html", "htm", "xml", "css", "log", "ini",
    "cfg", "sh",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "odt", "rtf", "ppt", "pptx", "xls", "xlsx", "ods",
    "odp", "epub",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "webp", "svg", "tif", "tiff", "heic",
];

/// Everything the indexer needs to build a record from one file.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub kind: FileKind,
    pub display_name: String,
    /// Bounded text surrogate, stored as the record preview.
    pub text: String,
}

/// Classify a file by extension.
pub fn classify(path: &Path) -> FileKind {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return FileKind::Other;
    };
    let ext = ext.to_ascii_lowercase();

    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        FileKind::Text
    } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        FileKind::Document
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        FileKind::Image
    } else {
        FileKind::Other
    }
}

/// Produce the text surrogate, kind, and display name for a file.
pub fn extract(file: &DiscoveredFile) -> Extraction {
    let kind = classify(&file.relative_path);

    let text = match kind {
        FileKind::Text => read_text(&file.absolute_path)
            .unwrap_or_else(|| fallback_text(&file.relative_path, kind)),
        _ => fallback_text(&file.relative_path, kind),
    };
    let text = truncate_chars(text, MAX_SURROGATE_CHARS);

    Extraction {
        kind,
        display_name: display_name(&file.relative_path, kind, &text),
        text,
    }
}

fn read_text(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let mut buf = Vec::new();
    file.take(MAX_TEXT_BYTES).read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

/// Surrogate for content no text can be recovered from: the path's words
/// plus a kind keyword, so queries can still match on naming.
fn fallback_text(relative_path: &Path, kind: FileKind) -> String {
    let keyword = match kind {
        FileKind::Text => "text",
        FileKind::Document => "document",
        FileKind::Image => "image",
        FileKind::Other => "file",
    };
    format!("{} {keyword}", relative_path.to_string_lossy())
}

/// Display name: the first markdown heading for markdown files, otherwise
/// the file name without extension.
fn display_name(relative_path: &Path, kind: FileKind, text: &str) -> String {
    if kind == FileKind::Text
        && matches!(
            relative_path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("markdown")
        )
    {
        for line in text.lines() {
            if let Some(heading) = line.trim().strip_prefix("# ") {
                let title = heading.trim();
                if !title.is_empty() {
                    return title.to_string();
                }
            }
        }
    }

    relative_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate_chars(mut s: String, max_chars: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
    }
    s
}

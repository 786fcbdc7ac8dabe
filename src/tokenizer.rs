//! Text normalization into index terms.
//!
//! Terms are runs of ASCII alphanumerics, individual CJK characters, and
//! adjacent CJK character pairs. The pair terms approximate word boundaries
//! in languages written without whitespace segmentation.

/// Split text into normalized tokens.
///
/// Lower-cases the input, extracts runs of ASCII alphanumerics, emits each
/// CJK character as its own token, and every pair of directly adjacent CJK
/// characters as an extra bigram token. Empty input yields an empty sequence.
///
/// # Examples
///
/// ```
/// use attache::tokenizer::tokenize;
///
/// assert_eq!(tokenize("Hello, World-42"), vec!["hello", "world", "42"]);
/// assert!(tokenize("").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut run = String::new();
    let mut prev_cjk: Option<char> = None;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            run.push(c.to_ascii_lowercase());
            prev_cjk = None;
            continue;
        }

        if !run.is_empty() {
            tokens.push(std::mem::take(&mut run));
        }

        if is_cjk(c) {
            tokens.push(c.to_string());
            if let Some(prev) = prev_cjk {
                let mut pair = String::with_capacity(prev.len_utf8() + c.len_utf8());
                pair.push(prev);
                pair.push(c);
                tokens.push(pair);
            }
            prev_cjk = Some(c);
        } else {
            prev_cjk = None;
        }
    }

    if !run.is_empty() {
        tokens.push(run);
    }

    tokens
}

/// Whether a character belongs to the CJK ranges tokenized per-character.
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'   // CJK Unified Ideographs
        | '\u{3400}'..='\u{4DBF}' // CJK Extension A
        | '\u{F900}'..='\u{FAFF}' // CJK Compatibility Ideographs
        | '\u{3040}'..='\u{309F}' // Hiragana
        | '\u{30A0}'..='\u{30FF}' // Katakana
        | '\u{AC00}'..='\u{D7AF}' // Hangul Syllables
    )
}

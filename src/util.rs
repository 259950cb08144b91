//! Shared text helpers

/// Truncate a string to a maximum length, appending "..." if truncated.
/// Handles multi-byte characters by finding a valid char boundary.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let suffix = "...";
    let target = max_len.saturating_sub(suffix.len());
    let mut end = target;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &s[..end], suffix)
}

/// Lowercase, drop punctuation and collapse whitespace.
///
/// Punctuation is removed rather than replaced, so "Sci-Fi" becomes "scifi"
/// and "O'Brien" becomes "obrien" on both the query and the document side.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if !c.is_alphanumeric() {
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.extend(c.to_lowercase().filter(|lc| lc.is_alphanumeric()));
    }
    out
}

/// Tokenize for lexical indexing: normalize, then split on whitespace
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Whole-word containment over already-normalized strings
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let left_ok = start == 0 || haystack[..start].ends_with(' ');
        let right_ok = end == haystack.len() || haystack[end..].starts_with(' ');
        left_ok && right_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("héllo wörld", 8), "héll...");
    }

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize_text("  Dr. Leonardo   DiCaprio! "), "dr leonardo dicaprio");
        assert_eq!(normalize_text("Sci-Fi"), "scifi");
        assert_eq!(normalize_text("..."), "");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("The Revenant, 2015."), vec!["the", "revenant", "2015"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_contains_phrase_respects_word_boundaries() {
        assert!(contains_phrase("a tense thriller", "thriller"));
        assert!(contains_phrase("love story in paris", "love story"));
        assert!(!contains_phrase("a lovely day", "love"));
        assert!(!contains_phrase("anything", ""));
    }
}

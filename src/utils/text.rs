// src/utils/text.rs

/// Trims and collapses every run of whitespace into a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns at most `max_chars` characters of `text`, never splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_and_newlines() {
        assert_eq!(collapse_whitespace("  Magnetics \n\t and  Coils "), "Magnetics and Coils");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        // Hebrew letters are two bytes each in UTF-8
        assert_eq!(truncate_chars("חברה", 2), "חב");
    }
}

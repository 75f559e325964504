use unicode_normalization::UnicodeNormalization;

/// Trims surrounding whitespace and applies Unicode NFKC normalization so
/// that visually identical content hashes and FTS-indexes the same way
/// regardless of the input encoding form.
pub fn canonicalize_content(content: &str) -> String {
    content.trim().nfkc().collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(canonicalize_content("  hello world  "), "hello world");
    }

    #[test]
    fn normalizes_compatibility_equivalent_forms() {
        // U+FB01 LATIN SMALL LIGATURE FI decomposes to "fi" under NFKC.
        assert_eq!(canonicalize_content("\u{FB01}le"), "file");
    }
}

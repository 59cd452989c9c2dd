//! # Text Normalization Module
//!
//! Media metadata arrives as arbitrary Unicode. Keyword matching works on a much
//! smaller alphabet: plain lowercase ASCII letters separated by single spaces.
//! This module provides the composable steps that get a title or artist name
//! into that shape.
//!
//! ## Pipeline
//!
//! 1. [`fold_diacritics`] - Romanian accented letters become their base Latin
//!    letter (case preserved), anything else outside ASCII is dropped
//! 2. [`to_lower`] - ASCII lowercasing
//! 3. [`keep_alpha_and_spaces`] - punctuation and digits are removed
//! 4. [`split_words`] / [`word_aligned_substrings`] - candidate generation
//!
//! [`prepare`] runs steps 1-3 in order.
//!
//! ## Example
//!
//! ```
//! use manelemax::text;
//!
//! assert_eq!(text::prepare("Nicolae Guță - Hit"), "nicolae guta  hit");
//! assert_eq!(text::split_words("nicolae guta  hit"), vec!["nicolae", "guta", "hit"]);
//! ```

/// Maps a single accented character to its base Latin letter.
///
/// Covers the Romanian alphabet, including the legacy cedilla forms of
/// `ş`/`ţ` that still show up in a lot of tagged files.
fn fold_char(c: char) -> char {
    match c {
        'ă' | 'â' => 'a',
        'Ă' | 'Â' => 'A',
        'î' => 'i',
        'Î' => 'I',
        'ș' | 'ş' => 's',
        'Ș' | 'Ş' => 'S',
        'ț' | 'ţ' => 't',
        'Ț' | 'Ţ' => 'T',
        other => other,
    }
}

/// Folds diacritics and drops every character without a single-byte form.
///
/// Case is preserved. Characters that are still outside ASCII after folding
/// are removed so downstream steps only ever see single-byte characters.
/// Empty input yields empty output.
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(fold_char)
        .filter(char::is_ascii)
        .collect()
}

/// ASCII lowercasing.
pub fn to_lower(text: &str) -> String {
    text.to_ascii_lowercase()
}

/// Removes everything that is neither an ASCII letter nor whitespace.
pub fn keep_alpha_and_spaces(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphabetic() || c.is_ascii_whitespace())
        .collect()
}

/// Full normalization used before matching: fold, lowercase, strip.
pub fn prepare(text: &str) -> String {
    keep_alpha_and_spaces(&to_lower(&fold_diacritics(text)))
}

/// Splits on runs of whitespace, keeping word order.
pub fn split_words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Enumerates every contiguous run of up to `max_words` words.
///
/// Shorter runs come first; within a run length, the leftmost run comes first.
/// A `max_words` of 0, or one larger than the word count, means "all words".
/// Runs are joined with single spaces regardless of the original spacing.
///
/// ```
/// use manelemax::text::word_aligned_substrings;
///
/// let all: Vec<String> = word_aligned_substrings(&["a", "b", "c"], 2).collect();
/// assert_eq!(all, vec!["a", "b", "c", "a b", "b c"]);
/// ```
pub fn word_aligned_substrings<'a>(
    words: &'a [&'a str],
    max_words: usize,
) -> impl Iterator<Item = String> + 'a {
    let count = words.len();
    let max_words = if max_words == 0 || max_words > count {
        count
    } else {
        max_words
    };

    (1..=max_words).flat_map(move |window| {
        (0..=count - window).map(move |start| words[start..start + window].join(" "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_diacritics_romanian_letters() {
        assert_eq!(fold_diacritics("ăâîșț"), "aaist");
        assert_eq!(fold_diacritics("ĂÂÎȘȚ"), "AAIST");
        assert_eq!(fold_diacritics("şţŞŢ"), "stST");
    }

    #[test]
    fn test_fold_diacritics_drops_non_ascii() {
        assert_eq!(fold_diacritics("café ♫ 東京"), "caf  ");
        assert_eq!(fold_diacritics("Guță"), "Guta");
    }

    #[test]
    fn test_fold_diacritics_empty_input() {
        assert_eq!(fold_diacritics(""), "");
        assert_eq!(prepare(""), "");
    }

    #[test]
    fn test_fold_preserves_case() {
        assert_eq!(fold_diacritics("Florin SALAM"), "Florin SALAM");
    }

    #[test]
    fn test_keep_alpha_and_spaces() {
        assert_eq!(keep_alpha_and_spaces("AC/DC - 2024 (Live!)"), "ACDC   Live");
        assert_eq!(keep_alpha_and_spaces("\ttab\nnewline"), "\ttab\nnewline");
    }

    #[test]
    fn test_prepare_full_pipeline() {
        assert_eq!(prepare("Nicolae Guță - Hit"), "nicolae guta  hit");
        assert_eq!(prepare("Ştefan & Ţuţu 2"), "stefan  tutu ");
    }

    #[test]
    fn test_split_words_collapses_whitespace() {
        assert_eq!(split_words("  one   two\tthree \n"), vec!["one", "two", "three"]);
        assert!(split_words("   ").is_empty());
        assert!(split_words("").is_empty());
    }

    #[test]
    fn test_substrings_order_shortest_then_leftmost() {
        let words = ["a", "b", "c"];
        let all: Vec<String> = word_aligned_substrings(&words, 0).collect();
        assert_eq!(all, vec!["a", "b", "c", "a b", "b c", "a b c"]);
    }

    #[test]
    fn test_substrings_clamp_max_words() {
        let words = ["x", "y"];
        let clamped: Vec<String> = word_aligned_substrings(&words, 10).collect();
        assert_eq!(clamped, vec!["x", "y", "x y"]);

        let limited: Vec<String> = word_aligned_substrings(&words, 1).collect();
        assert_eq!(limited, vec!["x", "y"]);
    }

    #[test]
    fn test_substrings_no_words() {
        let words: [&str; 0] = [];
        assert_eq!(word_aligned_substrings(&words, 4).count(), 0);
        assert_eq!(word_aligned_substrings(&words, 0).count(), 0);
    }

    #[test]
    fn test_substrings_count() {
        // n + (n-1) + ... + (n-k+1) candidates for n words, window k
        let words = ["a", "b", "c", "d", "e", "f"];
        assert_eq!(word_aligned_substrings(&words, 4).count(), 6 + 5 + 4 + 3);
    }
}

//! # Keyword Matching Module
//!
//! Decides whether a piece of media metadata (an artist or a title) mentions one
//! of the configured keywords.
//!
//! ## Matching Rules
//!
//! The input is normalized with [`text::prepare`], split into words, and every
//! word-aligned substring of up to `max_words` words is tested against the
//! [`KeywordSet`]. Candidates are tried shortest first, and leftmost first within
//! the same length, so the result is deterministic:
//!
//! - a one-word keyword wins over a longer phrase that is also present
//! - between two keywords of the same length the earlier one wins
//!
//! Membership is plain string equality against keywords that were normalized
//! with the same pipeline when the set was built.

use crate::text;
use lazy_static::lazy_static;
use log::trace;
use std::collections::HashSet;

/// Default cap on the number of words in a candidate substring.
pub const DEFAULT_MAX_WORDS: usize = 4;

/// Keywords shipped with the binary.
///
/// Entries are written the way they appear in tags; [`KeywordSet::new`]
/// normalizes them.
pub const BUILTIN_KEYWORDS: &[&str] = &[
    "Adi de Vito",
    "Adrian Minune",
    "Babi Minune",
    "Bogdan de la Ploiești",
    "Carmen de la Sălciua",
    "Copilul de Aur",
    "Costi Ioniță",
    "Culiță Sterp",
    "Dani Mocanu",
    "Denisa",
    "Florin Peste",
    "Florin Salam",
    "Guță",
    "Ionuț Cercel",
    "Jean de la Craiova",
    "Liviu Guță",
    "Manea",
    "Manele",
    "Mr Juve",
    "Nicolae Guță",
    "Salam",
    "Sandu Ciorbă",
    "Sorinel Pustiu",
    "Tzancă Uraganu",
    "Vali Vijelie",
];

lazy_static! {
    static ref BUILTIN: KeywordSet = KeywordSet::new(BUILTIN_KEYWORDS.iter().copied());
}

/// Immutable set of normalized keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    entries: HashSet<String>,
}

impl KeywordSet {
    /// Builds a set, normalizing every entry.
    ///
    /// Entries are folded, lowercased, stripped and whitespace-collapsed, so
    /// `"Nicolae  Guță"` is stored as `"nicolae guta"`. Entries that normalize
    /// to nothing are skipped.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = keywords
            .into_iter()
            .map(|k| text::split_words(&text::prepare(k.as_ref())).join(" "))
            .filter(|k| !k.is_empty())
            .collect();
        Self { entries }
    }

    /// The built-in keyword list.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Exact membership test.
    ///
    /// `candidate` is compared as-is, so it must already be normalized the
    /// way [`find_match`] normalizes text.
    ///
    /// # Examples
    ///
    /// ```
    /// use manelemax::keywords::KeywordSet;
    ///
    /// let set = KeywordSet::new(["Nicolae Guță"]);
    /// assert!(set.contains("nicolae guta"));
    /// assert!(!set.contains("Nicolae Guță"));
    /// ```
    pub fn contains(&self, candidate: &str) -> bool {
        self.entries.contains(candidate)
    }

    /// Number of distinct normalized entries.
    ///
    /// Spellings that normalize to the same keyword count once.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the set has no entries; [`find_match`] then never matches.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in alphabetical order.
    pub fn sorted(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self.entries.iter().map(String::as_str).collect();
        all.sort_unstable();
        all
    }
}

/// Finds the first keyword mentioned in `text`.
///
/// Returns the matching word-aligned substring of the normalized text, or
/// `None` when nothing matches, the text has no words, or the set is empty.
/// `max_words == 0` means no limit.
///
/// # Examples
///
/// ```
/// use manelemax::keywords::{find_match, KeywordSet};
///
/// let set = KeywordSet::new(["guta"]);
/// assert_eq!(find_match("Nicolae Guță - Hit", &set, 4).as_deref(), Some("guta"));
/// assert_eq!(find_match("Random Song", &set, 4), None);
/// ```
pub fn find_match(text: &str, keywords: &KeywordSet, max_words: usize) -> Option<String> {
    if keywords.is_empty() {
        return None;
    }

    let prepared = text::prepare(text);
    let words = text::split_words(&prepared);
    if words.is_empty() {
        return None;
    }

    let found = text::word_aligned_substrings(&words, max_words).find(|c| keywords.contains(c));
    trace!("Keyword search in '{prepared}': {found:?}");
    found
}

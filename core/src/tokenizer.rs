use crate::stemmer::Language;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"(?u)\w+").expect("valid regex");
    static ref ENGLISH_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a", "and", "are", "as", "at",
            "be", "but", "by",
            "for",
            "if", "in", "into", "is", "it",
            "near", "no", "not",
            "of", "on", "or",
            "such",
            "that", "the", "their", "then", "there", "these", "they", "this", "to",
            "was", "will", "with",
        ];
        words.iter().copied().collect()
    };
    static ref NO_STOPWORDS: HashSet<&'static str> = HashSet::new();
}

/// Stopwords for `language`. Only English carries a list.
pub fn stopwords(language: Language) -> &'static HashSet<&'static str> {
    match language {
        Language::English => &ENGLISH_STOPWORDS,
        _ => &NO_STOPWORDS,
    }
}

/// Split text into words: NFKC normalization, then runs of unicode word characters.
pub fn split_words(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>();
    WORD_RE.find_iter(&normalized).map(|m| m.as_str().to_string()).collect()
}

/// Whether a (stemmed) word belongs in the index. Latin-range words need three
/// characters and must not be stopwords; short Hiragana words are dropped too.
pub fn word_filter(word: &str, stopwords: &HashSet<&str>) -> bool {
    let Some(first) = word.chars().next() else {
        return false;
    };
    let len = word.chars().count();
    let code = first as u32;
    if len < 3 && (12354..12436).contains(&code) {
        return false;
    }
    if code < 256 && (len < 3 || stopwords.contains(word)) {
        return false;
    }
    true
}

/// Split a search query on whitespace, trimming punctuation from each piece.
/// A leading `-` survives so it can mark an excluded term.
pub fn split_query(query: &str) -> Vec<String> {
    query
        .nfkc()
        .collect::<String>()
        .split_whitespace()
        .filter_map(|piece| {
            let excluded = piece.starts_with('-');
            let word = piece.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'));
            match (excluded, word.is_empty()) {
                (_, true) => None,
                (true, false) => Some(format!("-{word}")),
                (false, false) => Some(word.to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_word_characters() {
        let words = split_words("Set MEGATRON_APP_MODE=dev, then run `docker-compose up`.");
        assert_eq!(words, vec!["Set", "MEGATRON_APP_MODE", "dev", "then", "run", "docker", "compose", "up"]);
    }

    #[test]
    fn filter_drops_short_words_and_stopwords() {
        let sw = stopwords(Language::English);
        assert!(word_filter("megatron", sw));
        assert!(word_filter("thi", sw));
        assert!(word_filter("The", sw));
        assert!(!word_filter("the", sw));
        assert!(!word_filter("aw", sw));
        assert!(!word_filter("", sw));
        assert!(word_filter("日本", sw));
        assert!(!word_filter("\u{3042}\u{3044}", sw));
    }

    #[test]
    fn query_pieces_keep_exclusion_marker() {
        assert_eq!(split_query("  pause, -unpause \"slack\" -- "), vec!["pause", "-unpause", "slack"]);
    }
}

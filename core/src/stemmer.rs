use crate::error::IndexError;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use rust_stemmers::Algorithm;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Entries kept before the stem cache is reset.
const CACHE_LIMIT: usize = 16 * 1024;

/// Consonant sequence, vowel sequence and single vowel as used by Porter's measure.
const C: &str = "[^aeiou][^aeiouy]*";
const V: &str = "[aeiouy][aeiou]*";
const VOWEL: &str = "[aeiouy]";

lazy_static! {
    static ref MGR0: Regex = Regex::new(&format!("^({C})?{V}{C}")).expect("valid regex");
    static ref MEQ1: Regex = Regex::new(&format!("^({C})?{V}{C}({V})?$")).expect("valid regex");
    static ref MGR1: Regex = Regex::new(&format!("^({C})?{V}{C}{V}{C}")).expect("valid regex");
    static ref S_V: Regex = Regex::new(&format!("^({C})?{VOWEL}")).expect("valid regex");
    static ref CVC: Regex = Regex::new(&format!("^{C}{VOWEL}[^aeiouwxy]$")).expect("valid regex");
    static ref STEP1A_IES: Regex = Regex::new(r"^(.+?)(ss|i)es$").expect("valid regex");
    static ref STEP1A_S: Regex = Regex::new(r"^(.+?)([^s])s$").expect("valid regex");
    static ref STEP1B_EED: Regex = Regex::new(r"^(.+?)eed$").expect("valid regex");
    static ref STEP1B_ED: Regex = Regex::new(r"^(.+?)(ed|ing)$").expect("valid regex");
    static ref STEP1B_ATE: Regex = Regex::new(r"(at|bl|iz)$").expect("valid regex");
    static ref STEP1C: Regex = Regex::new(r"^(.+?)y$").expect("valid regex");
    static ref STEP2: Regex = Regex::new(
        r"^(.+?)(ational|tional|enci|anci|izer|bli|alli|entli|eli|ousli|ization|ation|ator|alism|iveness|fulness|ousness|aliti|iviti|biliti|logi)$"
    )
    .expect("valid regex");
    static ref STEP3: Regex = Regex::new(r"^(.+?)(icate|ative|alize|iciti|ical|ful|ness)$").expect("valid regex");
    static ref STEP4: Regex = Regex::new(
        r"^(.+?)(al|ance|ence|er|ic|able|ible|ant|ement|ment|ent|ou|ism|ate|iti|ous|ive|ize)$"
    )
    .expect("valid regex");
    static ref STEP4_ION: Regex = Regex::new(r"^(.+?)(s|t)(ion)$").expect("valid regex");
    static ref STEP5: Regex = Regex::new(r"^(.+?)e$").expect("valid regex");
}

/// Search languages. English uses the Porter stemmer the generated indexes are
/// built with; the others use Snowball.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Danish,
    Dutch,
    #[default]
    English,
    Finnish,
    French,
    German,
    Hungarian,
    Italian,
    Norwegian,
    Portuguese,
    Romanian,
    Russian,
    Spanish,
    Swedish,
    Turkish,
}

impl Language {
    pub const ALL: [Language; 15] = [
        Language::Danish,
        Language::Dutch,
        Language::English,
        Language::Finnish,
        Language::French,
        Language::German,
        Language::Hungarian,
        Language::Italian,
        Language::Norwegian,
        Language::Portuguese,
        Language::Romanian,
        Language::Russian,
        Language::Spanish,
        Language::Swedish,
        Language::Turkish,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::Danish => "da",
            Language::Dutch => "nl",
            Language::English => "en",
            Language::Finnish => "fi",
            Language::French => "fr",
            Language::German => "de",
            Language::Hungarian => "hu",
            Language::Italian => "it",
            Language::Norwegian => "no",
            Language::Portuguese => "pt",
            Language::Romanian => "ro",
            Language::Russian => "ru",
            Language::Spanish => "es",
            Language::Swedish => "sv",
            Language::Turkish => "tr",
        }
    }

    fn snowball(self) -> Option<Algorithm> {
        Some(match self {
            Language::English => return None,
            Language::Danish => Algorithm::Danish,
            Language::Dutch => Algorithm::Dutch,
            Language::Finnish => Algorithm::Finnish,
            Language::French => Algorithm::French,
            Language::German => Algorithm::German,
            Language::Hungarian => Algorithm::Hungarian,
            Language::Italian => Algorithm::Italian,
            Language::Norwegian => Algorithm::Norwegian,
            Language::Portuguese => Algorithm::Portuguese,
            Language::Romanian => Algorithm::Romanian,
            Language::Russian => Algorithm::Russian,
            Language::Spanish => Algorithm::Spanish,
            Language::Swedish => Algorithm::Swedish,
            Language::Turkish => Algorithm::Turkish,
        })
    }
}

impl FromStr for Language {
    type Err = IndexError;

    /// Accepts a two-letter code (`en`, also with a region like `en_US`) or the
    /// English name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let code = lower.split(['_', '-']).next().unwrap_or_default();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == code || format!("{lang:?}").to_lowercase() == lower)
            .ok_or_else(|| IndexError::UnknownLanguage(s.to_string()))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Lowercases and stems words, memoizing results.
pub struct Stemmer {
    language: Language,
    snowball: Option<rust_stemmers::Stemmer>,
    cache: Mutex<HashMap<String, String>>,
}

impl fmt::Debug for Stemmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stemmer").field("language", &self.language).finish_non_exhaustive()
    }
}

impl Default for Stemmer {
    fn default() -> Self {
        Self::new(Language::English)
    }
}

impl Stemmer {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            snowball: language.snowball().map(rust_stemmers::Stemmer::create),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn stem(&self, word: &str) -> String {
        let lower = word.to_lowercase();
        if let Some(hit) = self.cache.lock().get(&lower) {
            return hit.clone();
        }
        let stemmed = match &self.snowball {
            Some(snowball) => snowball.stem(&lower).into_owned(),
            None => porter_stem(&lower),
        };
        let mut cache = self.cache.lock();
        if cache.len() >= CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(lower, stemmed.clone());
        stemmed
    }
}

/// Porter (1980) stemmer, matching the one shipped with the search page so that
/// query terms line up with the stems stored in the index. Expects lowercase input.
pub fn porter_stem(word: &str) -> String {
    if word.chars().count() < 3 {
        return word.to_string();
    }
    // A leading y is a consonant; uppercase keeps it out of the vowel classes.
    let initial_y = word.starts_with('y');
    let mut w = if initial_y { format!("Y{}", &word[1..]) } else { word.to_string() };

    // Step 1a
    if let Some(c) = STEP1A_IES.captures(&w) {
        w = format!("{}{}", &c[1], &c[2]);
    } else if let Some(c) = STEP1A_S.captures(&w) {
        w = format!("{}{}", &c[1], &c[2]);
    }

    // Step 1b
    if let Some(c) = STEP1B_EED.captures(&w) {
        if MGR0.is_match(&c[1]) {
            w.pop();
        }
    } else if let Some(c) = STEP1B_ED.captures(&w) {
        let stem = c[1].to_string();
        if S_V.is_match(&stem) {
            w = stem;
            if STEP1B_ATE.is_match(&w) || CVC.is_match(&w) {
                w.push('e');
            } else if ends_with_double_consonant(&w) {
                w.pop();
            }
        }
    }

    // Step 1c
    if let Some(c) = STEP1C.captures(&w) {
        let stem = c[1].to_string();
        if S_V.is_match(&stem) {
            w = stem + "i";
        }
    }

    // Step 2
    if let Some(c) = STEP2.captures(&w) {
        if MGR0.is_match(&c[1]) {
            w = format!("{}{}", &c[1], step2_suffix(&c[2]));
        }
    }

    // Step 3
    if let Some(c) = STEP3.captures(&w) {
        if MGR0.is_match(&c[1]) {
            w = format!("{}{}", &c[1], step3_suffix(&c[2]));
        }
    }

    // Step 4
    if let Some(c) = STEP4.captures(&w) {
        if MGR1.is_match(&c[1]) {
            w = c[1].to_string();
        }
    } else if let Some(c) = STEP4_ION.captures(&w) {
        let stem = format!("{}{}", &c[1], &c[2]);
        if MGR1.is_match(&stem) {
            w = stem;
        }
    }

    // Step 5
    if let Some(c) = STEP5.captures(&w) {
        let stem = &c[1];
        if MGR1.is_match(stem) || (MEQ1.is_match(stem) && !CVC.is_match(stem)) {
            w = stem.to_string();
        }
    }
    if w.ends_with("ll") && MGR1.is_match(&w) {
        w.pop();
    }

    if initial_y {
        w.replace_range(..1, "y");
    }
    w
}

/// Same consonant twice at the end, except l, s and z.
fn ends_with_double_consonant(w: &str) -> bool {
    let mut rev = w.chars().rev();
    match (rev.next(), rev.next()) {
        (Some(a), Some(b)) => a == b && !"aeiouylsz".contains(a),
        _ => false,
    }
}

fn step2_suffix(suffix: &str) -> &'static str {
    match suffix {
        "ational" => "ate",
        "tional" => "tion",
        "enci" => "ence",
        "anci" => "ance",
        "izer" => "ize",
        "bli" => "ble",
        "alli" => "al",
        "entli" => "ent",
        "eli" => "e",
        "ousli" => "ous",
        "ization" => "ize",
        "ation" => "ate",
        "ator" => "ate",
        "alism" => "al",
        "iveness" => "ive",
        "fulness" => "ful",
        "ousness" => "ous",
        "aliti" => "al",
        "iviti" => "ive",
        "biliti" => "ble",
        "logi" => "log",
        _ => "",
    }
}

fn step3_suffix(suffix: &str) -> &'static str {
    match suffix {
        "icate" => "ic",
        "alize" => "al",
        "iciti" => "ic",
        "ical" => "ic",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porter_matches_stems_found_in_generated_indexes() {
        let cases = [
            ("always", "alwai"),
            ("configuration", "configur"),
            ("environment", "environ"),
            ("this", "thi"),
            ("celery", "celeri"),
            ("key", "kei"),
            ("welcome", "welcom"),
            ("commands", "command"),
            ("megatron", "megatron"),
            ("messages", "messag"),
            ("directly", "directli"),
            ("pause", "paus"),
            ("table", "tabl"),
            ("indices", "indic"),
        ];
        for (word, stem) in cases {
            assert_eq!(porter_stem(word), stem, "stem of {word}");
        }
    }

    #[test]
    fn porter_classic_examples() {
        let cases = [
            ("caresses", "caress"),
            ("ponies", "poni"),
            ("agreed", "agre"),
            ("hopping", "hop"),
            ("filing", "file"),
            ("relational", "relat"),
            ("hopeful", "hope"),
            ("adjustment", "adjust"),
            ("controll", "control"),
            ("yelling", "yell"),
        ];
        for (word, stem) in cases {
            assert_eq!(porter_stem(word), stem, "stem of {word}");
        }
    }

    #[test]
    fn short_words_are_untouched() {
        assert_eq!(porter_stem("is"), "is");
        assert_eq!(porter_stem("a"), "a");
    }

    #[test]
    fn stemmer_lowercases_and_caches() {
        let s = Stemmer::default();
        assert_eq!(s.stem("Configuration"), "configur");
        assert_eq!(s.stem("CONFIGURATION"), "configur");
        assert_eq!(s.cache.lock().len(), 1);
    }

    #[test]
    fn snowball_languages() {
        let s = Stemmer::new(Language::German);
        assert_eq!(s.stem("Häuser"), "haus");
    }

    #[test]
    fn language_parsing() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::English);
        assert_eq!("de_DE".parse::<Language>().unwrap(), Language::German);
        assert_eq!("french".parse::<Language>().unwrap(), Language::French);
        assert!("xx".parse::<Language>().is_err());
    }
}

//! Query evaluation over a [`SearchIndex`], ranked the way the documentation
//! search page ranks: full-text hits scored by where the term matched (title or
//! body, exact or partial) plus object-name hits scored by name match and
//! object priority.

use crate::index::{full_name, DocId, PostingSet, SearchIndex};
use crate::stemmer::{Language, Stemmer};
use crate::tokenizer::{split_query, stopwords};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Score weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorer {
    /// Query equals the full object name or its last dotted part.
    pub obj_name_match: i32,
    /// Query is contained in the last dotted part of the object name.
    pub obj_partial_match: i32,
    /// Additive bonus per object priority.
    pub obj_prio: BTreeMap<i32, i32>,
    pub obj_prio_default: i32,
    pub title: i32,
    pub partial_title: i32,
    pub term: i32,
    pub partial_term: i32,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            obj_name_match: 11,
            obj_partial_match: 6,
            obj_prio: BTreeMap::from([(0, 15), (1, 5), (2, -5)]),
            obj_prio_default: 0,
            title: 15,
            partial_title: 7,
            term: 5,
            partial_term: 2,
        }
    }
}

/// A query split into the lists the two search passes need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    /// Stemmed terms every result must contain.
    pub search_terms: Vec<String>,
    /// Stemmed terms no result may contain.
    pub excluded: Vec<String>,
    /// Lowercased original words, for highlighting.
    pub highlight: Vec<String>,
    /// Lowercased original words, matched against object names.
    pub object_terms: Vec<String>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.search_terms.is_empty() && self.object_terms.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub doc_id: DocId,
    pub docname: String,
    pub filename: String,
    pub title: String,
    /// Fragment to append to the page URL, including `#`; empty for page hits.
    pub anchor: String,
    pub description: Option<String>,
    pub score: i32,
}

pub fn parse_query(query: &str, stemmer: &Stemmer) -> ParsedQuery {
    let stopwords = stopwords(stemmer.language());
    let mut parsed = ParsedQuery::default();
    for piece in split_query(query) {
        let (exclude, word) = match piece.strip_prefix('-') {
            Some(rest) => (true, rest.to_string()),
            None => (false, piece),
        };
        let lower = word.to_lowercase();
        if !exclude {
            parsed.object_terms.push(lower.clone());
        }
        if stopwords.contains(lower.as_str()) || lower.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let mut stemmed = stemmer.stem(&lower);
        // the stemmer must not shrink a real word below three characters; the
        // index keeps such words as written, so fall back to the typed form
        if stemmed.chars().count() < 3 && word.chars().count() >= 3 {
            stemmed = word.clone();
        }
        let target = if exclude {
            &mut parsed.excluded
        } else {
            parsed.highlight.push(lower);
            &mut parsed.search_terms
        };
        if !target.contains(&stemmed) {
            target.push(stemmed);
        }
    }
    parsed
}

/// Runs queries against one shared, immutable index.
#[derive(Debug)]
pub struct Searcher {
    index: Arc<SearchIndex>,
    stemmer: Stemmer,
    scorer: Scorer,
}

impl Searcher {
    pub fn new(index: Arc<SearchIndex>, language: Language) -> Self {
        Self { index, stemmer: Stemmer::new(language), scorer: Scorer::default() }
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn stemmer(&self) -> &Stemmer {
        &self.stemmer
    }

    pub fn parse(&self, query: &str) -> ParsedQuery {
        parse_query(query, &self.stemmer)
    }

    /// Parse and run `query`, best results first.
    pub fn query(&self, query: &str) -> Vec<SearchResult> {
        let parsed = self.parse(query);
        self.run(&parsed)
    }

    pub fn run(&self, parsed: &ParsedQuery) -> Vec<SearchResult> {
        let mut results = Vec::new();
        for (i, term) in parsed.object_terms.iter().enumerate() {
            let others: Vec<&str> = parsed
                .object_terms
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, t)| t.as_str())
                .collect();
            results.extend(self.object_search(term, &others));
        }
        results.extend(self.term_search(&parsed.search_terms, &parsed.excluded));
        let results = dedup(results);
        tracing::debug!(
            terms = ?parsed.search_terms,
            excluded = ?parsed.excluded,
            hits = results.len(),
            "query evaluated"
        );
        results
    }

    /// Full-text pass: a page qualifies when it contains every search term (in body
    /// or title, exactly or as part of a longer indexed word) and no excluded term.
    pub fn term_search(&self, search_terms: &[String], excluded: &[String]) -> Vec<SearchResult> {
        let idx = &self.index;
        let mut matched: BTreeMap<DocId, BTreeSet<&str>> = BTreeMap::new();
        let mut scores: HashMap<(DocId, &str), i32> = HashMap::new();

        for word in search_terms {
            let exact_term = idx.terms.get(word);
            let exact_title = idx.titleterms.get(word);
            let mut sources: Vec<(&PostingSet, i32)> = Vec::new();
            sources.extend(exact_term.map(|p| (p, self.scorer.term)));
            sources.extend(exact_title.map(|p| (p, self.scorer.title)));
            if word.chars().count() > 2 {
                if exact_term.is_none() {
                    sources.extend(
                        idx.terms
                            .iter()
                            .filter(|(w, _)| w.contains(word.as_str()))
                            .map(|(_, p)| (p, self.scorer.partial_term)),
                    );
                }
                if exact_title.is_none() {
                    sources.extend(
                        idx.titleterms
                            .iter()
                            .filter(|(w, _)| w.contains(word.as_str()))
                            .map(|(_, p)| (p, self.scorer.partial_title)),
                    );
                }
            }
            // a required word with no postings at all ends the pass
            if sources.is_empty() {
                break;
            }
            for (postings, score) in sources {
                for doc in postings.iter() {
                    matched.entry(doc).or_default().insert(word.as_str());
                    let slot = scores.entry((doc, word.as_str())).or_insert(score);
                    *slot = (*slot).max(score);
                }
            }
        }

        // words of one or two characters are optional
        let required_long = search_terms.iter().filter(|t| t.chars().count() > 2).count();
        let mut results = Vec::new();
        for (doc, words) in matched {
            if words.len() != search_terms.len() && words.len() != required_long {
                continue;
            }
            let is_excluded = excluded
                .iter()
                .any(|ex| idx.lookup(ex).contains(doc) || idx.title_lookup(ex).contains(doc));
            if is_excluded {
                continue;
            }
            let score = words.iter().filter_map(|w| scores.get(&(doc, *w))).copied().max().unwrap_or(0);
            results.push(self.page_result(doc, String::new(), None, score));
        }
        results
    }

    /// Object pass: objects whose full dotted name contains `term`. With several
    /// query words the remaining words must appear in the object's name, type
    /// label or page title.
    pub fn object_search(&self, term: &str, others: &[&str]) -> Vec<SearchResult> {
        let idx = &self.index;
        let mut results = Vec::new();
        for (prefix, name, entry) in idx.objects() {
            let full = full_name(prefix, name);
            let full_lower = full.to_lowercase();
            if !full_lower.contains(term) {
                continue;
            }
            let Some(objname) = idx.objname(entry.objtype) else {
                continue;
            };
            let title = idx.title(entry.doc).unwrap_or_default();
            // name bonuses compare the name as documented, not lowercased
            let last = full.rsplit('.').next().unwrap_or_default();
            let mut score = 0;
            if full == term || last == term {
                score += self.scorer.obj_name_match;
            } else if last.contains(term) {
                score += self.scorer.obj_partial_match;
            }
            if !others.is_empty() {
                let haystack = format!("{prefix} {name} {} {title}", objname.label).to_lowercase();
                if !others.iter().all(|o| haystack.contains(o)) {
                    continue;
                }
            }
            score += self.scorer.obj_prio.get(&entry.priority).copied().unwrap_or(self.scorer.obj_prio_default);
            let anchor = match entry.anchor.as_str() {
                "" => full.clone(),
                "-" => format!("{}-{}", objname.objtype, full),
                other => other.to_string(),
            };
            let description = format!("{}, in {}", objname.label, title);
            let mut hit = self.page_result(entry.doc, format!("#{anchor}"), Some(description), score);
            hit.title = full;
            results.push(hit);
        }
        results
    }

    fn page_result(&self, doc: DocId, anchor: String, description: Option<String>, score: i32) -> SearchResult {
        let idx = &self.index;
        SearchResult {
            doc_id: doc,
            docname: idx.docname(doc).unwrap_or_default().to_string(),
            filename: idx.filename(doc).unwrap_or_default().to_string(),
            title: idx.title(doc).unwrap_or_default().to_string(),
            anchor,
            description,
            score,
        }
    }
}

/// Keep the best-scoring hit per (page, anchor) and order by score descending,
/// then title, then page name.
fn dedup(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut best: HashMap<(DocId, String), SearchResult> = HashMap::new();
    for r in results {
        let key = (r.doc_id, r.anchor.clone());
        match best.get(&key) {
            Some(existing) if existing.score >= r.score => {}
            _ => {
                best.insert(key, r);
            }
        }
    }
    let mut out: Vec<SearchResult> = best.into_values().collect();
    out.sort_by(rank);
    out
}

fn rank(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.docname.cmp(&b.docname))
        .then_with(|| a.anchor.cmp(&b.anchor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{IndexBuilder, SourceDoc, SourceObject};

    #[test]
    fn parse_splits_stems_and_excludes() {
        let stemmer = Stemmer::default();
        let q = parse_query("The Slack commands -pause 2024 and", &stemmer);
        assert_eq!(q.search_terms, vec!["slack", "command"]);
        assert_eq!(q.excluded, vec!["paus"]);
        assert_eq!(q.highlight, vec!["slack", "commands"]);
        assert_eq!(q.object_terms, vec!["the", "slack", "commands", "2024", "and"]);
    }

    #[test]
    fn parse_keeps_word_when_stem_is_too_short() {
        let stemmer = Stemmer::default();
        let q = parse_query("aws", &stemmer);
        assert_eq!(q.search_terms, vec!["aws"]);
    }

    #[test]
    fn short_stem_falls_back_to_the_word_as_typed() {
        let stemmer = Stemmer::default();
        let q = parse_query("Using AWS", &stemmer);
        assert_eq!(q.search_terms, vec!["Using", "AWS"]);
        assert_eq!(q.highlight, vec!["using", "aws"]);
    }

    #[test]
    fn object_name_bonus_is_case_sensitive() {
        let mut b = IndexBuilder::new(Language::English);
        b.feed(SourceDoc {
            docname: "api".into(),
            filename: None,
            title: "API".into(),
            headings: vec![],
            body: String::new(),
        })
        .unwrap();
        for fullname in ["megatron.pause", "megatron.Unpause", "megatron.Resume"] {
            b.add_object(SourceObject {
                domain: "py".into(),
                objtype: "function".into(),
                label: Some("Python function".into()),
                fullname: fullname.into(),
                docname: "api".into(),
                anchor: None,
                priority: 1,
            });
        }
        let searcher = Searcher::new(Arc::new(b.freeze()), Language::English);
        let score = |q: &str, name: &str| {
            searcher.object_search(q, &[]).into_iter().find(|h| h.title == name).map(|h| h.score)
        };
        // exact name match plus default priority
        assert_eq!(score("pause", "megatron.pause"), Some(11 + 5));
        // substring of the last segment
        assert_eq!(score("pause", "megatron.Unpause"), Some(6 + 5));
        // matched case-insensitively, but the mixed-case name earns no name bonus
        assert_eq!(score("resume", "megatron.Resume"), Some(5));
    }

    #[test]
    fn parse_deduplicates_terms() {
        let stemmer = Stemmer::default();
        let q = parse_query("command commands", &stemmer);
        assert_eq!(q.search_terms, vec!["command"]);
    }

    #[test]
    fn stopword_only_query_is_empty() {
        let stemmer = Stemmer::default();
        let q = parse_query("the and of", &stemmer);
        assert!(q.search_terms.is_empty());
        assert!(!q.is_empty());
    }
}

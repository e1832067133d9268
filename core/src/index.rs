use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocId = u32;

/// Documents containing a term, sorted ascending without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<DocId>")]
pub struct PostingSet(Vec<DocId>);

static EMPTY_POSTINGS: PostingSet = PostingSet(Vec::new());

impl PostingSet {
    pub fn new(mut docs: Vec<DocId>) -> Self {
        docs.sort_unstable();
        docs.dedup();
        Self(docs)
    }

    pub fn empty() -> &'static PostingSet {
        &EMPTY_POSTINGS
    }

    pub fn as_slice(&self) -> &[DocId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = DocId> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, doc: DocId) -> bool {
        self.0.binary_search(&doc).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<DocId>> for PostingSet {
    fn from(docs: Vec<DocId>) -> Self {
        Self::new(docs)
    }
}

impl FromIterator<DocId> for PostingSet {
    fn from_iter<I: IntoIterator<Item = DocId>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// One documented object (function, class, option, ...) in `objects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub doc: DocId,
    /// Key into `objtypes` / `objnames`.
    pub objtype: u32,
    /// 0 important, 1 default, 2 unimportant.
    pub priority: i32,
    /// `""` means the full name is the anchor, `"-"` means `type-fullname`.
    pub anchor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjName {
    pub domain: String,
    pub objtype: String,
    /// Human readable type name, e.g. "Python function".
    pub label: String,
}

/// An immutable documentation search index.
///
/// Built once (parsed from `searchindex.js`, loaded from a snapshot, or frozen by
/// [`crate::builder::IndexBuilder`]) and only read afterwards, so a shared
/// reference can be handed to any number of concurrent readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub(crate) docnames: Vec<String>,
    pub(crate) filenames: Vec<String>,
    pub(crate) titles: Vec<String>,
    pub(crate) terms: BTreeMap<String, PostingSet>,
    pub(crate) titleterms: BTreeMap<String, PostingSet>,
    pub(crate) objects: BTreeMap<String, BTreeMap<String, ObjectEntry>>,
    pub(crate) objnames: BTreeMap<u32, ObjName>,
    pub(crate) objtypes: BTreeMap<u32, String>,
    pub(crate) envversion: BTreeMap<String, u64>,
}

impl SearchIndex {
    pub fn num_docs(&self) -> usize {
        self.docnames.len()
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Documents whose body contains `term`. `term` must already be normalized;
    /// an unknown term yields an empty set.
    pub fn lookup(&self, term: &str) -> &PostingSet {
        self.terms.get(term).unwrap_or(PostingSet::empty())
    }

    /// Documents whose title contains `term`.
    pub fn title_lookup(&self, term: &str) -> &PostingSet {
        self.titleterms.get(term).unwrap_or(PostingSet::empty())
    }

    /// Display title, `None` when `doc` is out of range.
    pub fn title(&self, doc: DocId) -> Option<&str> {
        self.titles.get(doc as usize).map(String::as_str)
    }

    pub fn docname(&self, doc: DocId) -> Option<&str> {
        self.docnames.get(doc as usize).map(String::as_str)
    }

    /// Source file name; older indexes carry none and yield `None`.
    pub fn filename(&self, doc: DocId) -> Option<&str> {
        self.filenames.get(doc as usize).map(String::as_str)
    }

    pub fn doc_id(&self, docname: &str) -> Option<DocId> {
        self.docnames.iter().position(|d| d == docname).map(|i| i as DocId)
    }

    pub fn docnames(&self) -> &[String] {
        &self.docnames
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &PostingSet)> {
        self.terms.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn title_terms(&self) -> impl Iterator<Item = (&str, &PostingSet)> {
        self.titleterms.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate objects as `(prefix, name, entry)`.
    pub fn objects(&self) -> impl Iterator<Item = (&str, &str, &ObjectEntry)> {
        self.objects
            .iter()
            .flat_map(|(prefix, names)| names.iter().map(move |(name, e)| (prefix.as_str(), name.as_str(), e)))
    }

    pub fn object(&self, prefix: &str, name: &str) -> Option<&ObjectEntry> {
        self.objects.get(prefix)?.get(name)
    }

    pub fn objname(&self, objtype: u32) -> Option<&ObjName> {
        self.objnames.get(&objtype)
    }

    pub fn objtype(&self, objtype: u32) -> Option<&str> {
        self.objtypes.get(&objtype).map(String::as_str)
    }

    pub fn env_version(&self) -> &BTreeMap<String, u64> {
        &self.envversion
    }

    /// Check referential integrity: every posting and object points at an existing
    /// document, per-document tables line up with `docnames`, and every object type
    /// is named.
    pub fn validate(&self) -> Result<()> {
        let num_docs = self.docnames.len();
        if self.titles.len() != num_docs {
            return Err(IndexError::LengthMismatch { field: "titles", len: self.titles.len(), expected: num_docs });
        }
        if !self.filenames.is_empty() && self.filenames.len() != num_docs {
            return Err(IndexError::LengthMismatch { field: "filenames", len: self.filenames.len(), expected: num_docs });
        }
        for (table, map) in [("terms", &self.terms), ("titleterms", &self.titleterms)] {
            for (term, postings) in map {
                // postings are sorted, so the last one is the largest
                if let Some(&doc) = postings.as_slice().last() {
                    if doc as usize >= num_docs {
                        return Err(IndexError::DanglingPosting { table, term: term.clone(), doc, num_docs });
                    }
                }
            }
        }
        for (prefix, name, entry) in self.objects() {
            let full = full_name(prefix, name);
            if entry.doc as usize >= num_docs {
                return Err(IndexError::DanglingObject { name: full, doc: entry.doc, num_docs });
            }
            if !self.objnames.contains_key(&entry.objtype) {
                return Err(IndexError::UnknownObjectType { name: full, objtype: entry.objtype });
            }
        }
        Ok(())
    }
}

/// `prefix.name`, or just `name` for the empty prefix.
pub fn full_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> SearchIndex {
        let mut terms = BTreeMap::new();
        terms.insert("rust".to_string(), PostingSet::new(vec![1, 0, 1]));
        terms.insert("empti".to_string(), PostingSet::default());
        SearchIndex {
            docnames: vec!["a".into(), "b".into()],
            filenames: vec!["a.rst".into(), "b.rst".into()],
            titles: vec!["Doc A".into(), "Doc B".into()],
            terms,
            ..Default::default()
        }
    }

    #[test]
    fn posting_set_is_sorted_and_deduplicated() {
        let p = PostingSet::new(vec![4, 2, 4, 0]);
        assert_eq!(p.as_slice(), &[0, 2, 4]);
        assert!(p.contains(2));
        assert!(!p.contains(3));
    }

    #[test]
    fn deserialized_posting_set_is_normalized() {
        let p: PostingSet = serde_json::from_str("[9, 0, 9]").unwrap();
        assert_eq!(p.as_slice(), &[0, 9]);
        assert!(p.contains(0));
    }

    #[test]
    fn lookup_and_title() {
        let idx = tiny();
        assert_eq!(idx.lookup("rust").as_slice(), &[0, 1]);
        assert!(idx.lookup("missing").is_empty());
        assert!(idx.lookup("empti").is_empty());
        assert_eq!(idx.title(1), Some("Doc B"));
        assert_eq!(idx.title(2), None);
        assert_eq!(idx.doc_id("b"), Some(1));
        assert!(idx.validate().is_ok());
    }

    #[test]
    fn validate_rejects_dangling_posting() {
        let mut idx = tiny();
        idx.titleterms.insert("ghost".into(), PostingSet::new(vec![7]));
        match idx.validate() {
            Err(IndexError::DanglingPosting { table, term, doc, num_docs }) => {
                assert_eq!((table, term.as_str(), doc, num_docs), ("titleterms", "ghost", 7, 2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn validate_checks_filenames_only_when_present() {
        let mut idx = tiny();
        idx.filenames.pop();
        assert!(matches!(
            idx.validate(),
            Err(IndexError::LengthMismatch { field: "filenames", len: 1, expected: 2 })
        ));
        idx.filenames.clear();
        assert!(idx.validate().is_ok());
        assert_eq!(idx.filename(0), None);
    }

    #[test]
    fn validate_rejects_title_count_mismatch() {
        let mut idx = tiny();
        idx.titles.pop();
        assert!(matches!(idx.validate(), Err(IndexError::LengthMismatch { field: "titles", .. })));
    }

    #[test]
    fn validate_rejects_unknown_object_type() {
        let mut idx = tiny();
        idx.objects.entry("pkg".into()).or_default().insert(
            "run".into(),
            ObjectEntry { doc: 0, objtype: 3, priority: 1, anchor: String::new() },
        );
        assert!(matches!(idx.validate(), Err(IndexError::UnknownObjectType { objtype: 3, .. })));
    }
}

use crate::error::{IndexError, Result};
use crate::index::{DocId, ObjName, ObjectEntry, PostingSet, SearchIndex};
use crate::stemmer::{Language, Stemmer};
use crate::tokenizer::{split_words, stopwords, word_filter};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A page handed to [`IndexBuilder::feed`].
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDoc {
    pub docname: String,
    /// Source file name; defaults to `<docname>.rst`.
    #[serde(default)]
    pub filename: Option<String>,
    pub title: String,
    /// Section headings; their words count as title words.
    #[serde(default)]
    pub headings: Vec<String>,
    pub body: String,
}

/// A documented object handed to [`IndexBuilder::add_object`].
#[derive(Debug, Clone, Deserialize)]
pub struct SourceObject {
    pub domain: String,
    pub objtype: String,
    /// Human readable type name; defaults to `objtype`.
    #[serde(default)]
    pub label: Option<String>,
    /// Dotted full name, e.g. `megatron.commands.pause`.
    pub fullname: String,
    pub docname: String,
    #[serde(default)]
    pub anchor: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    1
}

/// Collects pages and objects, then freezes them into an immutable [`SearchIndex`].
#[derive(Debug)]
pub struct IndexBuilder {
    stemmer: Stemmer,
    docs: BTreeMap<String, (String, String)>,
    mapping: HashMap<String, BTreeSet<String>>,
    title_mapping: HashMap<String, BTreeSet<String>>,
    objects: Vec<SourceObject>,
    envversion: BTreeMap<String, u64>,
}

impl IndexBuilder {
    pub fn new(language: Language) -> Self {
        Self {
            stemmer: Stemmer::new(language),
            docs: BTreeMap::new(),
            mapping: HashMap::new(),
            title_mapping: HashMap::new(),
            objects: Vec::new(),
            envversion: BTreeMap::new(),
        }
    }

    pub fn language(&self) -> Language {
        self.stemmer.language()
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn set_env_version(&mut self, name: impl Into<String>, version: u64) -> &mut Self {
        self.envversion.insert(name.into(), version);
        self
    }

    pub fn feed(&mut self, doc: SourceDoc) -> Result<()> {
        if self.docs.contains_key(&doc.docname) {
            return Err(IndexError::DuplicateDocument(doc.docname));
        }
        let stopwords = stopwords(self.stemmer.language());
        let docname = doc.docname;

        let title_words = std::iter::once(doc.title.as_str())
            .chain(doc.headings.iter().map(String::as_str))
            .flat_map(split_words);
        for word in title_words {
            let stemmed = self.stemmer.stem(&word);
            // fall back to the raw word when stemming pushes it under the filter
            let key = if word_filter(&stemmed, stopwords) {
                Some(stemmed)
            } else if word_filter(&word, stopwords) {
                Some(word)
            } else {
                None
            };
            if let Some(key) = key {
                self.title_mapping.entry(key).or_default().insert(docname.clone());
            }
        }

        for word in split_words(&doc.body) {
            let mut stemmed = self.stemmer.stem(&word);
            if !word_filter(&stemmed, stopwords) && word_filter(&word, stopwords) {
                stemmed = word;
            }
            let in_title = self.title_mapping.get(&stemmed).is_some_and(|docs| docs.contains(&docname));
            if word_filter(&stemmed, stopwords) && !in_title {
                self.mapping.entry(stemmed).or_default().insert(docname.clone());
            }
        }

        let filename = doc.filename.unwrap_or_else(|| format!("{docname}.rst"));
        tracing::debug!(%docname, "fed document");
        self.docs.insert(docname, (filename, doc.title));
        Ok(())
    }

    /// Objects are resolved at [`freeze`](Self::freeze) time; those pointing at
    /// unknown pages or with a negative priority are left out.
    pub fn add_object(&mut self, object: SourceObject) {
        self.objects.push(object);
    }

    pub fn freeze(self) -> SearchIndex {
        let mut docnames = Vec::with_capacity(self.docs.len());
        let mut filenames = Vec::with_capacity(self.docs.len());
        let mut titles = Vec::with_capacity(self.docs.len());
        for (docname, (filename, title)) in self.docs {
            docnames.push(docname);
            filenames.push(filename);
            titles.push(title);
        }
        let doc_ids: HashMap<&str, DocId> =
            docnames.iter().enumerate().map(|(i, d)| (d.as_str(), i as DocId)).collect();

        let postings = |mapping: HashMap<String, BTreeSet<String>>| -> BTreeMap<String, PostingSet> {
            mapping
                .into_iter()
                .map(|(term, docs)| (term, docs.iter().filter_map(|d| doc_ids.get(d.as_str()).copied()).collect()))
                .collect()
        };
        let terms = postings(self.mapping);
        let titleterms = postings(self.title_mapping);

        let mut objects: BTreeMap<String, BTreeMap<String, ObjectEntry>> = BTreeMap::new();
        let mut type_ids: HashMap<(String, String), u32> = HashMap::new();
        let mut objnames = BTreeMap::new();
        let mut objtypes = BTreeMap::new();
        for obj in self.objects {
            let Some(&doc) = doc_ids.get(obj.docname.as_str()) else {
                continue;
            };
            if obj.priority < 0 {
                continue;
            }
            let next_id = type_ids.len() as u32;
            let objtype = *type_ids.entry((obj.domain.clone(), obj.objtype.clone())).or_insert_with(|| {
                objtypes.insert(next_id, format!("{}:{}", obj.domain, obj.objtype));
                objnames.insert(
                    next_id,
                    ObjName {
                        domain: obj.domain.clone(),
                        objtype: obj.objtype.clone(),
                        label: obj.label.clone().unwrap_or_else(|| obj.objtype.clone()),
                    },
                );
                next_id
            });
            let anchor = match obj.anchor.as_deref() {
                None => String::new(),
                Some(a) if a == obj.fullname => String::new(),
                Some(a) if a == format!("{}-{}", obj.objtype, obj.fullname) => "-".to_string(),
                Some(a) => a.to_string(),
            };
            let (prefix, name) = match obj.fullname.rsplit_once('.') {
                Some((prefix, name)) => (prefix.to_string(), name.to_string()),
                None => (String::new(), obj.fullname.clone()),
            };
            objects
                .entry(prefix)
                .or_default()
                .insert(name, ObjectEntry { doc, objtype, priority: obj.priority, anchor });
        }

        tracing::info!(num_docs = docnames.len(), num_terms = terms.len(), "froze search index");
        SearchIndex { docnames, filenames, titles, terms, titleterms, objects, objnames, objtypes, envversion: self.envversion }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(docname: &str, title: &str, body: &str) -> SourceDoc {
        SourceDoc { docname: docname.into(), filename: None, title: title.into(), headings: vec![], body: body.into() }
    }

    #[test]
    fn builds_sorted_documents_and_postings() {
        let mut b = IndexBuilder::new(Language::English);
        b.feed(doc("quickstart", "Quickstart", "Run the bot with docker")).unwrap();
        b.feed(doc("commands", "Megatron Commands", "Pause the bot. Commands are sent by users.")).unwrap();
        let idx = b.freeze();
        assert_eq!(idx.docnames(), &["commands".to_string(), "quickstart".to_string()]);
        assert_eq!(idx.filename(1), Some("quickstart.rst"));
        assert_eq!(idx.lookup("bot").as_slice(), &[0, 1]);
        assert_eq!(idx.lookup("paus").as_slice(), &[0]);
        assert_eq!(idx.title_lookup("megatron").as_slice(), &[0]);
        // title words are not repeated in the body table for the same page
        assert!(idx.lookup("command").is_empty());
        assert!(idx.validate().is_ok());
    }

    #[test]
    fn keeps_raw_word_when_stem_is_filtered() {
        let mut b = IndexBuilder::new(Language::English);
        b.feed(doc("env", "Environment", "Set AWS keys. The bucket is private.")).unwrap();
        let idx = b.freeze();
        assert_eq!(idx.lookup("AWS").as_slice(), &[0]);
        assert_eq!(idx.lookup("The").as_slice(), &[0]);
        assert!(idx.lookup("the").is_empty());
        assert_eq!(idx.lookup("kei").as_slice(), &[0]);
    }

    #[test]
    fn duplicate_document_is_rejected() {
        let mut b = IndexBuilder::new(Language::English);
        b.feed(doc("a", "A", "text")).unwrap();
        assert!(matches!(b.feed(doc("a", "A", "again")), Err(IndexError::DuplicateDocument(_))));
    }

    #[test]
    fn objects_get_type_ids_and_short_anchors() {
        let mut b = IndexBuilder::new(Language::English);
        b.feed(doc("api", "API", "Command reference")).unwrap();
        b.add_object(SourceObject {
            domain: "py".into(),
            objtype: "function".into(),
            label: Some("Python function".into()),
            fullname: "megatron.commands.pause".into(),
            docname: "api".into(),
            anchor: Some("function-megatron.commands.pause".into()),
            priority: 1,
        });
        b.add_object(SourceObject {
            domain: "py".into(),
            objtype: "function".into(),
            label: None,
            fullname: "orphan".into(),
            docname: "missing".into(),
            anchor: None,
            priority: 1,
        });
        let idx = b.freeze();
        let entry = idx.object("megatron.commands", "pause").unwrap();
        assert_eq!(entry.anchor, "-");
        assert_eq!(idx.objtype(entry.objtype), Some("py:function"));
        assert_eq!(idx.objname(entry.objtype).unwrap().label, "Python function");
        assert_eq!(idx.objects().count(), 1);
        assert!(idx.validate().is_ok());
    }
}

use crate::error::IndexError;
use crate::index::{DocId, ObjName, ObjectEntry, PostingSet, SearchIndex};
use crate::jsdump;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
    /// The `searchindex.js` the snapshot was compiled from, if any.
    #[serde(default)]
    pub source: Option<String>,
}

/// Layout of a compiled snapshot directory.
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// A term's postings as written: a bare id for one document, an array otherwise.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WirePostings {
    One(DocId),
    Many(Vec<DocId>),
}

impl From<WirePostings> for PostingSet {
    fn from(w: WirePostings) -> Self {
        match w {
            WirePostings::One(doc) => PostingSet::new(vec![doc]),
            WirePostings::Many(docs) => PostingSet::new(docs),
        }
    }
}

impl From<&PostingSet> for WirePostings {
    fn from(p: &PostingSet) -> Self {
        match p.as_slice() {
            [doc] => WirePostings::One(*doc),
            docs => WirePostings::Many(docs.to_vec()),
        }
    }
}

/// The top-level object inside `Search.setIndex(...)`.
#[derive(Serialize, Deserialize)]
struct WireIndex {
    docnames: Vec<String>,
    #[serde(default)]
    envversion: BTreeMap<String, u64>,
    #[serde(default)]
    filenames: Vec<String>,
    #[serde(default)]
    objects: BTreeMap<String, BTreeMap<String, (DocId, u32, i32, String)>>,
    #[serde(default)]
    objnames: BTreeMap<u32, (String, String, String)>,
    #[serde(default)]
    objtypes: BTreeMap<u32, String>,
    terms: BTreeMap<String, WirePostings>,
    titles: Vec<String>,
    titleterms: BTreeMap<String, WirePostings>,
}

fn postings_from_wire(map: BTreeMap<String, WirePostings>) -> BTreeMap<String, PostingSet> {
    map.into_iter().map(|(k, v)| (k, v.into())).collect()
}

fn postings_to_wire(map: &BTreeMap<String, PostingSet>) -> BTreeMap<String, WirePostings> {
    map.iter().map(|(k, v)| (k.clone(), v.into())).collect()
}

impl From<WireIndex> for SearchIndex {
    fn from(w: WireIndex) -> Self {
        let objects = w
            .objects
            .into_iter()
            .map(|(prefix, names)| {
                let names = names
                    .into_iter()
                    .map(|(name, (doc, objtype, priority, anchor))| (name, ObjectEntry { doc, objtype, priority, anchor }))
                    .collect();
                (prefix, names)
            })
            .collect();
        let objnames = w
            .objnames
            .into_iter()
            .map(|(id, (domain, objtype, label))| (id, ObjName { domain, objtype, label }))
            .collect();
        SearchIndex {
            docnames: w.docnames,
            filenames: w.filenames,
            titles: w.titles,
            terms: postings_from_wire(w.terms),
            titleterms: postings_from_wire(w.titleterms),
            objects,
            objnames,
            objtypes: w.objtypes,
            envversion: w.envversion,
        }
    }
}

impl From<&SearchIndex> for WireIndex {
    fn from(idx: &SearchIndex) -> Self {
        let objects = idx
            .objects
            .iter()
            .map(|(prefix, names)| {
                let names = names
                    .iter()
                    .map(|(name, e)| (name.clone(), (e.doc, e.objtype, e.priority, e.anchor.clone())))
                    .collect();
                (prefix.clone(), names)
            })
            .collect();
        let objnames = idx
            .objnames
            .iter()
            .map(|(id, n)| (*id, (n.domain.clone(), n.objtype.clone(), n.label.clone())))
            .collect();
        WireIndex {
            docnames: idx.docnames.clone(),
            envversion: idx.envversion.clone(),
            filenames: idx.filenames.clone(),
            objects,
            objnames,
            objtypes: idx.objtypes.clone(),
            terms: postings_to_wire(&idx.terms),
            titles: idx.titles.clone(),
            titleterms: postings_to_wire(&idx.titleterms),
        }
    }
}

/// Parse and validate the contents of a `searchindex.js` file.
pub fn parse_searchindex(text: &str) -> std::result::Result<SearchIndex, IndexError> {
    let body = jsdump::strip_wrapper(text)?;
    let value = jsdump::loads(body)?;
    let wire: WireIndex = serde_json::from_value(value)?;
    let index = SearchIndex::from(wire);
    index.validate()?;
    Ok(index)
}

/// Render an index as `searchindex.js` contents.
pub fn render_searchindex(index: &SearchIndex) -> std::result::Result<String, IndexError> {
    let value = serde_json::to_value(WireIndex::from(index))?;
    Ok(jsdump::wrap(&jsdump::dumps(&value)))
}

pub fn load_searchindex<P: AsRef<Path>>(path: P) -> Result<SearchIndex> {
    let path = path.as_ref();
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let index = parse_searchindex(&buf).with_context(|| format!("parsing {}", path.display()))?;
    tracing::debug!(path = %path.display(), num_docs = index.num_docs(), num_terms = index.num_terms(), "loaded searchindex.js");
    Ok(index)
}

pub fn save_searchindex<P: AsRef<Path>>(path: P, index: &SearchIndex) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let text = render_searchindex(index).with_context(|| format!("rendering {}", path.display()))?;
    f.write_all(text.as_bytes())?;
    Ok(())
}

pub fn save_snapshot(paths: &IndexPaths, index: &SearchIndex, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.index())?;
    let bytes = bincode::serialize(index)?;
    f.write_all(&bytes)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Load a compiled snapshot, re-checking integrity since the file may have been
/// produced by another build.
pub fn load_snapshot(paths: &IndexPaths) -> Result<(SearchIndex, MetaFile)> {
    let meta = load_meta(paths)?;
    if meta.version != SNAPSHOT_VERSION {
        anyhow::bail!("unsupported snapshot version {} (expected {SNAPSHOT_VERSION})", meta.version);
    }
    let mut f = File::open(paths.index())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let index: SearchIndex = bincode::deserialize(&buf)?;
    index.validate()?;
    Ok((index, meta))
}

/// A directory is read as a snapshot, anything else as `searchindex.js`.
pub fn load_any<P: AsRef<Path>>(path: P) -> Result<SearchIndex> {
    let path = path.as_ref();
    if path.is_dir() {
        let (index, _) = load_snapshot(&IndexPaths::new(path))?;
        Ok(index)
    } else {
        load_searchindex(path)
    }
}

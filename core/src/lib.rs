//! Read, search and build the static documentation search index
//! (`searchindex.js`) consumed by the documentation search page.

pub mod builder;
pub mod error;
pub mod index;
pub mod jsdump;
pub mod persist;
pub mod search;
pub mod stemmer;
pub mod tokenizer;

pub use builder::{IndexBuilder, SourceDoc, SourceObject};
pub use error::IndexError;
pub use index::{DocId, ObjName, ObjectEntry, PostingSet, SearchIndex};
pub use search::{ParsedQuery, Scorer, SearchResult, Searcher};
pub use stemmer::{Language, Stemmer};

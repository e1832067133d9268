use crate::DocId;
use thiserror::Error;

/// Errors raised while parsing, validating or building a search index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("parse error at byte {pos}: {msg}")]
    Parse { pos: usize, msg: String },

    #[error("missing `Search.setIndex(...)` wrapper")]
    MissingWrapper,

    #[error("malformed index object: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("{table} entry {term:?} references document {doc}, but the index has {num_docs} documents")]
    DanglingPosting { table: &'static str, term: String, doc: DocId, num_docs: usize },

    #[error("object {name:?} references document {doc}, but the index has {num_docs} documents")]
    DanglingObject { name: String, doc: DocId, num_docs: usize },

    #[error("object {name:?} has unknown object type {objtype}")]
    UnknownObjectType { name: String, objtype: u32 },

    #[error("{field} has {len} entries, expected {expected} (one per document)")]
    LengthMismatch { field: &'static str, len: usize, expected: usize },

    #[error("document {0:?} was fed more than once")]
    DuplicateDocument(String),

    #[error("unsupported search language {0:?}")]
    UnknownLanguage(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

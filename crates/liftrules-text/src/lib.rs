//! liftrules-text
//!
//! BM25 lexical index over the rule chunks, backed by an in-RAM tantivy index.
//! Exact keyword matches (rule numbers, equipment names) are this index's job.

pub mod index;
pub mod tantivy_utils;

pub use index::LexicalIndex;
pub use tantivy_utils::tokenize;

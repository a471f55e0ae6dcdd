//! Domain types shared by the lexical and embedding indexes.

use serde::{Deserialize, Deserializer, Serialize};

/// Position of a chunk in the corpus. Assigned at load time, never reused.
pub type ChunkId = usize;

/// One item handed over by the ingestion step: rule text plus the optional
/// identifier the rulebook formatter attached to it.
///
/// The identifier may be a string (`"3.2(a)"`) or an integer in the source
/// JSON; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    #[serde(default, deserialize_with = "deserialize_label")]
    pub id: Option<String>,
    pub text: String,
}

impl CorpusEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self { id: None, text: text.into() }
    }

    pub fn labelled(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: Some(id.into()), text: text.into() }
    }
}

impl From<&str> for CorpusEntry {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for CorpusEntry {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Text(String),
    Number(i64),
}

fn deserialize_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawLabel>::deserialize(deserializer)?.map(|label| match label {
        RawLabel::Text(s) => s,
        RawLabel::Number(n) => n.to_string(),
    }))
}

/// An immutable unit of retrievable rule text.
///
/// - `id`: 0-based position in the corpus, unique within a generation
/// - `label`: the external identifier supplied by ingestion, if any
/// - `text`: the raw rule text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub label: Option<String>,
    pub text: String,
}

impl From<&Chunk> for CorpusEntry {
    fn from(chunk: &Chunk) -> Self {
        Self { id: chunk.label.clone(), text: chunk.text.clone() }
    }
}

/// Indicates which index produced a hit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Lexical,
    Semantic,
}

/// The raw output of a single index.
///
/// `score` is index-specific (BM25 or cosine similarity) but higher is always
/// better. Scores from different sources are not comparable until normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// Orders hits by descending score, lower chunk id first on ties.
/// `0.0` and `-0.0` compare equal so the id tie-break still applies.
pub fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

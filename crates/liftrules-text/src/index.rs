use std::collections::HashSet;
use std::time::Instant;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use liftrules_core::error::{Error, Result};
use liftrules_core::traits::RankedIndex;
use liftrules_core::types::{sort_hits, Chunk, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer, rule_analyzer, tokenize_with, RuleFields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

fn lexical(err: impl std::fmt::Display) -> Error {
	Error::Lexical(err.to_string())
}

/// Read-only BM25 index over every chunk of a generation.
///
/// Built by a single indexing thread so identical corpora always produce the
/// same segment layout. Queries never touch the writer.
pub struct LexicalIndex {
	reader: IndexReader,
	fields: RuleFields,
	analyzer: TextAnalyzer,
	num_docs: usize,
}

impl LexicalIndex {
	pub fn build(chunks: &[Chunk]) -> Result<Self> {
		let started = Instant::now();
		let (schema, fields) = build_schema();
		let index = Index::create_in_ram(schema);
		register_tokenizer(&index);

		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(lexical)?;
		for chunk in chunks {
			writer
				.add_document(doc!(
					fields.chunk_id => chunk.id as u64,
					fields.text => chunk.text.clone(),
				))
				.map_err(lexical)?;
		}
		writer.commit().map_err(lexical)?;

		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(lexical)?;
		info!(chunks = chunks.len(), elapsed_ms = started.elapsed().as_millis() as u64, "lexical index built");
		Ok(Self { reader, fields, analyzer: rule_analyzer(), num_docs: chunks.len() })
	}

	/// Query terms after analysis, first occurrence order, duplicates dropped.
	pub fn query_terms(&self, text: &str) -> Vec<String> {
		let mut analyzer = self.analyzer.clone();
		let mut seen = HashSet::new();
		tokenize_with(&mut analyzer, text).into_iter().filter(|t| seen.insert(t.clone())).collect()
	}

	pub fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 || self.num_docs == 0 {
			return Ok(Vec::new());
		}
		let terms = self.query_terms(text);
		if terms.is_empty() {
			debug!(query = text, "query has no indexable terms");
			return Ok(Vec::new());
		}

		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.fields.text, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		// Every matching doc is collected so the id tie-break is applied before truncation.
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(self.num_docs)).map_err(lexical)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(lexical)?;
			let id = doc
				.get_first(self.fields.chunk_id)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| Error::Lexical(format!("stored chunk id missing for {addr:?}")))?;
			hits.push(SearchHit { id: id as usize, score, source: SourceKind::Lexical });
		}
		sort_hits(&mut hits);
		hits.truncate(k);
		debug!(query = text, terms = terms.len(), hits = hits.len(), "lexical query");
		Ok(hits)
	}

	pub fn len(&self) -> usize { self.num_docs }

	pub fn is_empty(&self) -> bool { self.num_docs == 0 }
}

impl RankedIndex for LexicalIndex {
	fn source(&self) -> SourceKind { SourceKind::Lexical }
	fn len(&self) -> usize { self.num_docs }
	fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> { Self::query(self, text, k) }
}

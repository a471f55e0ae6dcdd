use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, INDEXED, STORED};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer, Token, TokenStream};
use tantivy::Index;

pub const RULE_TOKENIZER: &str = "rule_text";

const MAX_TOKEN_BYTES: usize = 40;

pub struct RuleFields {
	pub chunk_id: Field,
	pub text: Field,
}

pub fn build_schema() -> (Schema, RuleFields) {
	let mut schema_builder = Schema::builder();
	let chunk_id = schema_builder.add_u64_field("chunk_id", INDEXED | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(RULE_TOKENIZER).set_index_option(IndexRecordOption::WithFreqs);
	let text = schema_builder.add_text_field("text", TextOptions::default().set_indexing_options(text_field_indexing));
	(schema_builder.build(), RuleFields { chunk_id, text })
}

/// Lowercased and split on whitespace and punctuation; every word is kept.
pub fn rule_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
		.filter(LowerCaser)
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(RULE_TOKENIZER, rule_analyzer());
}

/// Runs `text` through `analyzer`, keeping every emitted term in order.
pub fn tokenize_with(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let mut terms = Vec::new();
	let mut stream = analyzer.token_stream(text);
	stream.process(&mut |token: &Token| terms.push(token.text.clone()));
	terms
}

/// Tokenizes exactly the way chunk text is indexed.
pub fn tokenize(text: &str) -> Vec<String> {
	tokenize_with(&mut rule_analyzer(), text)
}

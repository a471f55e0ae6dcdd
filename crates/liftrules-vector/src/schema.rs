use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// Rows of the embedding cache, keyed by `(content_hash, embedder_id)`.
///
/// Vectors are variable-length lists so one table can hold entries from
/// embedders of different dimensions.
pub fn build_cache_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("content_hash", DataType::Utf8, false),
		Field::new("embedder_id", DataType::Utf8, false),
		Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
		Field::new("vector", DataType::List(Arc::new(Field::new("item", DataType::Float32, true))), false),
	]))
}

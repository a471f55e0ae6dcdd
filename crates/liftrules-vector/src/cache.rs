//! Lance-backed embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! The cache is consulted before the embedder runs and written through on
//! misses, so restarting over an unchanged rulebook embeds nothing.
use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{ListArray, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use liftrules_core::traits::Embedder;
use liftrules_core::types::Chunk;

use crate::index::EMBED_BATCH_SIZE;
use crate::schema::build_cache_schema;

pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub content_hash: String,
    pub embedder_id: String,
    pub vector: Vec<f32>,
}

pub struct EmbeddingCache {
    conn: Connection,
    table: String,
}

impl EmbeddingCache {
    pub async fn open(uri: &str, table: &str) -> Result<Self> {
        let conn = connect(uri).execute().await?;
        Ok(Self { conn, table: table.to_string() })
    }

    async fn has_table(&self) -> Result<bool> {
        Ok(self.conn.table_names().execute().await?.iter().any(|name| name == &self.table))
    }

    /// Cached vectors for whichever of `hashes` were stored under `embedder_id`.
    pub async fn get_many(&self, embedder_id: &str, hashes: &[String]) -> Result<HashMap<String, Vec<f32>>> {
        if hashes.is_empty() || !self.has_table().await? {
            return Ok(HashMap::new());
        }
        let wanted: HashSet<&str> = hashes.iter().map(String::as_str).collect();
        let table = self.conn.open_table(&self.table).execute().await?;
        let filter = format!("embedder_id = '{}'", embedder_id.replace('\'', "''"));
        let mut stream = table.query().only_if(filter).execute().await?;

        let mut out = HashMap::new();
        while let Some(batch) = stream.try_next().await? {
            let hash_col = batch
                .column_by_name("content_hash")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow!("cache table is missing content_hash"))?;
            let vec_col = batch
                .column_by_name("vector")
                .and_then(|c| c.as_list_opt::<i32>())
                .ok_or_else(|| anyhow!("cache table is missing vector"))?;
            for i in 0..batch.num_rows() {
                let hash = hash_col.value(i);
                if !wanted.contains(hash) { continue; }
                let list = vec_col.value(i);
                let values = list
                    .as_primitive_opt::<Float32Type>()
                    .ok_or_else(|| anyhow!("cache vector is not f32"))?
                    .values()
                    .to_vec();
                out.insert(hash.to_string(), values);
            }
        }
        Ok(out)
    }

    pub async fn put_many(&self, entries: &[CacheEntry]) -> Result<()> {
        if entries.is_empty() { return Ok(()); }
        let schema = build_cache_schema();
        let now = Utc::now().timestamp_millis();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.content_hash.as_str()))),
                Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.embedder_id.as_str()))),
                Arc::new(TimestampMillisecondArray::from(vec![now; entries.len()])),
                Arc::new(ListArray::from_iter_primitive::<Float32Type, _, _>(
                    entries.iter().map(|e| Some(e.vector.iter().copied().map(Some))),
                )),
            ],
        )?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if self.has_table().await? {
            self.conn.open_table(&self.table).execute().await?.add(reader).execute().await?;
        } else {
            self.conn.create_table(&self.table, reader).execute().await?;
        }
        debug!(rows = entries.len(), table = %self.table, "cache write");
        Ok(())
    }
}

/// Serves chunk embeddings from a warmed map and falls through to the wrapped
/// embedder for anything else (queries, new text). Reports the inner
/// embedder's id so cached and fresh vectors are interchangeable.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    vectors: HashMap<String, Vec<f32>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, vectors: HashMap<String, Vec<f32>>) -> Self {
        Self { inner, vectors }
    }

    pub fn cached(&self) -> usize { self.vectors.len() }
}

impl Embedder for CachedEmbedder {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        match self.vectors.get(&content_hash(text)) {
            Some(v) => Ok(v.clone()),
            None => self.inner.embed(text),
        }
    }

    /// Misses go to the wrapped embedder as one batch, in input order.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.vectors.get(&content_hash(t)).cloned()).collect();
        let missing: Vec<usize> = out.iter().enumerate().filter(|(_, v)| v.is_none()).map(|(i, _)| i).collect();
        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&batch)?;
            anyhow::ensure!(
                fresh.len() == batch.len(),
                "embedder returned {} vectors for {} texts",
                fresh.len(),
                batch.len()
            );
            for (i, vector) in missing.into_iter().zip(fresh) {
                out[i] = Some(vector);
            }
        }
        Ok(out.into_iter().flatten().collect())
    }
}

/// Loads every chunk's embedding from the cache, embeds and stores the misses,
/// and returns an embedder that answers chunk texts without recomputation.
pub async fn warm_cache(cache: &EmbeddingCache, inner: Arc<dyn Embedder>, chunks: &[Chunk]) -> Result<CachedEmbedder> {
    let embedder_id = inner.embedder_id().to_string();
    let hashes: Vec<String> = chunks.iter().map(|c| content_hash(&c.text)).collect();
    let mut vectors = cache.get_many(&embedder_id, &hashes).await?;

    let mut seen = HashSet::new();
    let misses: Vec<(&String, &str)> = hashes
        .iter()
        .zip(chunks)
        .filter(|(h, _)| !vectors.contains_key(*h) && seen.insert(h.as_str()))
        .map(|(h, c)| (h, c.text.as_str()))
        .collect();
    info!(embedder = %embedder_id, cached = vectors.len(), missing = misses.len(), "warming embedding cache");

    let pb = ProgressBar::new(misses.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?
            .progress_chars("#>-"),
    );
    for batch in misses.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.to_string()).collect();
        let embedded = inner.embed_batch(&texts)?;
        if embedded.len() != texts.len() {
            return Err(anyhow!("embedder returned {} vectors for {} texts", embedded.len(), texts.len()));
        }
        let entries: Vec<CacheEntry> = batch
            .iter()
            .zip(embedded)
            .map(|((hash, _), vector)| CacheEntry { content_hash: (*hash).clone(), embedder_id: embedder_id.clone(), vector })
            .collect();
        cache.put_many(&entries).await?;
        for entry in entries {
            vectors.insert(entry.content_hash, entry.vector);
        }
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    Ok(CachedEmbedder::new(inner, vectors))
}

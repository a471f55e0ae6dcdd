use std::collections::BTreeMap;
use std::thread;

use serde::Serialize;
use tracing::{debug, warn};

use liftrules_core::config::{FusionKind, RetrievalConfig};
use liftrules_core::error::{Error, Result};
use liftrules_core::traits::RankedIndex;
use liftrules_core::types::{ChunkId, SearchHit};

use crate::normalize::min_max_normalize;

/// Which signals produced a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchMode {
    Hybrid,
    /// The query embedding failed; only the lexical pool was ranked.
    LexicalOnly,
}

/// One fused candidate. `lexical` and `semantic` are the min-max normalized
/// per-pool scores, `None` when the chunk was absent from that pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub lexical: Option<f32>,
    pub semantic: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub hits: Vec<ScoredChunk>,
    pub mode: SearchMode,
    pub degraded_reason: Option<String>,
}

impl RankedResult {
    pub fn is_degraded(&self) -> bool { self.mode == SearchMode::LexicalOnly }
}

/// Queries two ranked indexes and fuses their candidate pools.
pub struct HybridMerger {
    config: RetrievalConfig,
}

impl HybridMerger {
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RetrievalConfig { &self.config }

    /// Runs the semantic query on a scoped thread while the lexical query runs
    /// on the caller's, then fuses both pools into at most `k` hits.
    pub fn search<L, S>(&self, lexical: &L, semantic: &S, query: &str, k: usize) -> Result<RankedResult>
    where
        L: RankedIndex + ?Sized,
        S: RankedIndex + ?Sized,
    {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be a positive integer".to_string()));
        }
        if lexical.is_empty() {
            return Ok(RankedResult { hits: Vec::new(), mode: SearchMode::Hybrid, degraded_reason: None });
        }
        let pool = self.config.pool_size(k);
        let (lex, sem) = thread::scope(|scope| {
            let handle = scope.spawn(|| semantic.query(query, pool));
            let lex = lexical.query(query, pool);
            let sem = match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            (lex, sem)
        });
        let lex = lex?;

        match sem {
            Ok(sem) => {
                debug!(pool, sources = ?(lexical.source(), semantic.source()), lexical = lex.len(), semantic = sem.len(), "candidate pools");
                Ok(RankedResult { hits: combine(&lex, Some(sem.as_slice()), k, &self.config), mode: SearchMode::Hybrid, degraded_reason: None })
            }
            Err(Error::EmbeddingUnavailable(reason)) if self.config.degrade_on_embedding_failure => {
                warn!(%reason, "query embedding failed; serving lexical-only results");
                Ok(RankedResult {
                    hits: combine_lexical_only(&lex, lexical.len(), k, &self.config),
                    mode: SearchMode::LexicalOnly,
                    degraded_reason: Some(reason),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Fuses the two pools into a single ranking of at most `k` chunks.
///
/// `semantic = None` means the semantic signal is unavailable: the lexical
/// pool is then ranked on its own at full weight.
pub fn combine(lexical: &[SearchHit], semantic: Option<&[SearchHit]>, k: usize, config: &RetrievalConfig) -> Vec<ScoredChunk> {
    let mut candidates: BTreeMap<ChunkId, Candidate> = BTreeMap::new();
    collect(&mut candidates, lexical, |c| &mut c.lexical);
    if let Some(semantic) = semantic {
        collect(&mut candidates, semantic, |c| &mut c.semantic);
    }
    rank(candidates, semantic.is_some(), k, config)
}

/// Lexical-only ranking over a corpus of `corpus_len` chunks. Chunks the
/// lexical pool missed follow at score 0, lowest id first, so the result
/// holds `min(k, corpus_len)` hits.
pub fn combine_lexical_only(lexical: &[SearchHit], corpus_len: usize, k: usize, config: &RetrievalConfig) -> Vec<ScoredChunk> {
    let mut candidates: BTreeMap<ChunkId, Candidate> = BTreeMap::new();
    collect(&mut candidates, lexical, |c| &mut c.lexical);
    let mut padded = 0;
    for id in 0..corpus_len {
        if padded == k {
            break;
        }
        if !candidates.contains_key(&id) {
            candidates.insert(id, Candidate::default());
            padded += 1;
        }
    }
    rank(candidates, false, k, config)
}

fn rank(candidates: BTreeMap<ChunkId, Candidate>, hybrid: bool, k: usize, config: &RetrievalConfig) -> Vec<ScoredChunk> {
    let mut fused: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|(chunk_id, c)| {
            let score = match config.fusion {
                FusionKind::Weighted if hybrid => {
                    let lex = c.lexical.map_or(0.0, |s| s.normalized);
                    let sem = c.semantic.map_or(0.0, |s| s.normalized);
                    (config.alpha * lex + (1.0 - config.alpha) * sem).clamp(0.0, 1.0)
                }
                FusionKind::Weighted => c.lexical.map_or(0.0, |s| s.normalized),
                FusionKind::Rrf => [c.lexical, c.semantic]
                    .iter()
                    .flatten()
                    .map(|s| 1.0 / (config.rrf_k as f32 + s.rank as f32))
                    .sum::<f32>(),
            };
            ScoredChunk {
                chunk_id,
                score,
                lexical: c.lexical.map(|s| s.normalized),
                semantic: c.semantic.map(|s| s.normalized),
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    fused.truncate(k);
    fused
}

#[derive(Clone, Copy)]
struct PoolScore {
    normalized: f32,
    /// 1-based position within the pool.
    rank: usize,
}

#[derive(Default)]
struct Candidate {
    lexical: Option<PoolScore>,
    semantic: Option<PoolScore>,
}

fn collect(candidates: &mut BTreeMap<ChunkId, Candidate>, pool: &[SearchHit], slot: impl Fn(&mut Candidate) -> &mut Option<PoolScore>) {
    let scores: Vec<f32> = pool.iter().map(|h| h.score).collect();
    for (rank, (hit, normalized)) in pool.iter().zip(min_max_normalize(&scores)).enumerate() {
        let entry = slot(candidates.entry(hit.id).or_default());
        if entry.is_none() {
            *entry = Some(PoolScore { normalized, rank: rank + 1 });
        }
    }
}

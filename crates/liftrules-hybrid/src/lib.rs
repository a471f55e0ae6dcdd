//! Hybrid retrieval over the rulebook: both indexes are queried per question,
//! their scores normalized independently and fused into one ranking.

pub mod format;
pub mod merge;
pub mod normalize;
pub mod retriever;

pub use format::{answer_rules_query, render_for_agent};
pub use merge::{combine, HybridMerger, RankedResult, ScoredChunk, SearchMode};
pub use normalize::min_max_normalize;
pub use retriever::{IndexGeneration, RuleHit, RuleSearch, RulesRetriever};

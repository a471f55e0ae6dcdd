use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use liftrules_core::config::{FusionKind, RetrievalConfig};
use liftrules_core::traits::Embedder;
use liftrules_core::{CorpusEntry, Error, FnEmbedder};
use liftrules_embed::FakeEmbedder;
use liftrules_hybrid::{answer_rules_query, render_for_agent, RulesRetriever, SearchMode};

const RULEBOOK: [&str; 3] = [
    "Athletes must wear a singlet",
    "Bar must be loaded evenly",
    "Singlet color restrictions apply at IPF events",
];

const FIVE_RULES: [&str; 5] = [
    "The lifter must face the front of the platform",
    "Knee sleeves may be worn in the squat",
    "The bar must be held motionless at the chest",
    "Three referees judge every attempt",
    "Weigh-in begins two hours before the session",
];

fn fake() -> Arc<dyn Embedder> {
    Arc::new(FakeEmbedder::new(384))
}

fn retriever() -> RulesRetriever {
    RulesRetriever::new(RetrievalConfig::default()).expect("default config is valid")
}

/// Embeds onto fixed keyword axes so semantic scores are predictable.
fn keyword_axes(offline: Arc<AtomicBool>) -> Arc<dyn Embedder> {
    Arc::new(FnEmbedder::new("axes:4", move |text: &str| {
        if offline.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service offline");
        }
        let t = text.to_lowercase();
        Ok(vec![
            f32::from(u8::from(t.contains("singlet"))),
            f32::from(u8::from(t.contains("bar"))),
            f32::from(u8::from(t.contains("ipf"))),
            0.1,
        ])
    }))
}

#[test]
fn singlet_query_ranks_singlet_rules_first() {
    let r = retriever();
    assert_eq!(r.initialize(RULEBOOK, fake()).expect("init"), 1);
    let result = r.search("singlet rules", 2).expect("search");
    assert_eq!(result.mode, SearchMode::Hybrid);
    assert_eq!(result.hits.len(), 2);
    assert_eq!(result.hits[0].chunk_id, 0);
    assert_eq!(result.hits[0].lexical_score, Some(1.0));
    assert_eq!(result.hits[0].text, RULEBOOK[0]);
}

#[test]
fn singlet_query_with_keyword_embedder() {
    let r = retriever();
    r.initialize(RULEBOOK, keyword_axes(Arc::new(AtomicBool::new(false)))).expect("init");
    let result = r.search("singlet rules", 2).expect("search");
    let ids: Vec<usize> = result.hits.iter().map(|h| h.chunk_id).collect();
    assert_eq!(ids, vec![0, 2]);
    assert!(result.hits[0].score > result.hits[1].score);
}

#[test]
fn empty_query_returns_top_embedding_match() {
    let r = retriever();
    r.initialize(RULEBOOK, fake()).expect("init");
    let result = r.search("", 1).expect("empty query must not fail");
    assert_eq!(result.mode, SearchMode::Hybrid);
    assert_eq!(result.hits.len(), 1);
    let hit = &result.hits[0];
    assert_eq!(hit.chunk_id, 0);
    assert_eq!(hit.lexical_score, None);
    assert_eq!(hit.semantic_score, Some(1.0));
}

#[test]
fn keyword_only_weighting_finds_modal_words() {
    let config = RetrievalConfig { alpha: 1.0, ..RetrievalConfig::default() };
    let r = RulesRetriever::new(config).expect("config");
    r.initialize(["Bar loaded evenly", "Bar must be loaded evenly"], fake()).expect("init");
    let result = r.search("must", 1).expect("search");
    assert_eq!(result.hits[0].chunk_id, 1);
    assert_eq!(result.hits[0].lexical_score, Some(1.0));
    assert_eq!(result.hits[0].score, 1.0);
}

#[test]
fn k_beyond_corpus_returns_every_chunk() {
    let r = retriever();
    r.initialize(FIVE_RULES, fake()).expect("init");
    let result = r.search("bar", 1000).expect("search");
    assert_eq!(result.hits.len(), 5);
    let mut ids: Vec<usize> = result.hits.iter().map(|h| h.chunk_id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
}

#[test]
fn zero_k_is_rejected_before_index_access() {
    let r = retriever();
    assert!(matches!(r.search("bar", 0), Err(Error::InvalidArgument(_))));
    r.initialize(RULEBOOK, fake()).expect("init");
    assert!(matches!(r.search("bar", 0), Err(Error::InvalidArgument(_))));
}

#[test]
fn search_before_initialize_fails() {
    let r = retriever();
    assert!(!r.is_ready());
    assert!(matches!(r.search("bar", 3), Err(Error::NotInitialized)));
    assert_eq!(r.generation(), None);
}

#[test]
fn empty_corpus_keeps_previous_generation() {
    let r = retriever();
    r.initialize(RULEBOOK, fake()).expect("init");
    let before = r.search("singlet", 3).expect("search");

    let err = r.initialize(Vec::<CorpusEntry>::new(), fake()).expect_err("empty corpus");
    assert!(matches!(err, Error::CorpusEmpty));
    assert_eq!(r.generation(), Some(1));
    assert_eq!(r.search("singlet", 3).expect("search"), before);
}

#[test]
fn failed_embedding_build_keeps_previous_generation() {
    let r = retriever();
    r.initialize(RULEBOOK, fake()).expect("init");
    let offline = Arc::new(AtomicBool::new(true));
    let err = r.initialize(FIVE_RULES, keyword_axes(offline)).expect_err("build must fail");
    assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    let snapshot = r.snapshot().expect("still serving");
    assert_eq!(snapshot.generation(), 1);
    assert_eq!(snapshot.store().len(), 3);
}

#[test]
fn rebuild_publishes_new_generation() {
    let r = retriever();
    assert_eq!(r.initialize(RULEBOOK, fake()).expect("first"), 1);
    let old = r.snapshot().expect("snapshot");
    assert_eq!(r.initialize(FIVE_RULES, fake()).expect("second"), 2);

    // A snapshot taken before the swap keeps answering from its own state.
    assert_eq!(old.store().len(), 3);
    let result = r.search("referees", 5).expect("search");
    assert_eq!(result.generation, 2);
    assert_eq!(result.hits[0].chunk_id, 3);
}

#[test]
fn query_embedding_failure_degrades_to_lexical() {
    let offline = Arc::new(AtomicBool::new(false));
    let r = retriever();
    r.initialize(RULEBOOK, keyword_axes(offline.clone())).expect("init");

    offline.store(true, Ordering::SeqCst);
    let degraded = r.search("singlet rules", 3).expect("degraded search");
    assert_eq!(degraded.mode, SearchMode::LexicalOnly);
    assert!(degraded.degraded_reason.as_deref().unwrap_or_default().contains("offline"));
    let ids: Vec<usize> = degraded.hits.iter().map(|h| h.chunk_id).collect();
    // Chunk 2 is the lexical pool minimum and ties with unmatched chunk 1 at 0.0.
    assert_eq!(ids, vec![0, 1, 2]);
    assert!(degraded.hits.iter().all(|h| h.semantic_score.is_none()));
    assert_eq!(degraded.hits[0].score, 1.0);
    assert_eq!(degraded.hits[1].score, 0.0);
    assert_eq!(degraded.hits[1].lexical_score, None);
    assert_eq!(degraded.hits[2].lexical_score, Some(0.0));

    let blank = r.search("", 1).expect("degraded empty query");
    assert_eq!(blank.mode, SearchMode::LexicalOnly);
    assert_eq!(blank.hits.len(), 1);
    assert_eq!(blank.hits[0].chunk_id, 0);
    assert_eq!(blank.hits[0].score, 0.0);

    offline.store(false, Ordering::SeqCst);
    let recovered = r.search("singlet rules", 3).expect("search");
    assert_eq!(recovered.mode, SearchMode::Hybrid);
    assert_eq!(recovered.degraded_reason, None);
}

#[test]
fn query_embedding_failure_propagates_when_degradation_disabled() {
    let offline = Arc::new(AtomicBool::new(false));
    let config = RetrievalConfig { degrade_on_embedding_failure: false, ..RetrievalConfig::default() };
    let r = RulesRetriever::new(config).expect("config");
    r.initialize(RULEBOOK, keyword_axes(offline.clone())).expect("init");

    offline.store(true, Ordering::SeqCst);
    assert!(matches!(r.search("singlet", 2), Err(Error::EmbeddingUnavailable(_))));
    offline.store(false, Ordering::SeqCst);
    assert_eq!(r.search("singlet", 2).expect("search").hits.len(), 2);
}

#[test]
fn invalid_alpha_is_rejected() {
    let config = RetrievalConfig { alpha: 1.5, ..RetrievalConfig::default() };
    assert!(matches!(RulesRetriever::new(config), Err(Error::InvalidConfig(_))));
}

#[test]
fn rrf_fusion_orders_and_ties_by_id() {
    let config = RetrievalConfig { fusion: FusionKind::Rrf, ..RetrievalConfig::default() };
    let r = RulesRetriever::new(config).expect("config");
    r.initialize(FIVE_RULES, fake()).expect("init");
    let result = r.search("the bar must be held", 5).expect("search");
    assert_eq!(result.hits.len(), 5);
    assert_eq!(result.hits[0].chunk_id, 2);
    for pair in result.hits.windows(2) {
        assert!(pair[0].score > pair[1].score || (pair[0].score == pair[1].score && pair[0].chunk_id < pair[1].chunk_id));
    }
}

#[test]
fn search_default_uses_configured_k() {
    let r = retriever();
    r.initialize(FIVE_RULES, fake()).expect("init");
    assert_eq!(r.search_default("squat").expect("search").hits.len(), 3);
}

#[test]
fn labels_are_carried_into_hits() {
    let r = retriever();
    let corpus = vec![CorpusEntry::labelled("3.1", "Squat depth below parallel"), CorpusEntry::labelled("4.2", "Bench press pause")];
    r.initialize(corpus, fake()).expect("init");
    let result = r.search("squat depth", 1).expect("search");
    assert_eq!(result.hits[0].label.as_deref(), Some("3.1"));
}

#[test]
fn concurrent_searches_during_rebuild_see_whole_generations() {
    let r = retriever();
    r.initialize(RULEBOOK, fake()).expect("init");
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..20 {
                    let result = r.search("singlet bar", 10).expect("search");
                    let expected = if result.generation == 1 { RULEBOOK.len() } else { FIVE_RULES.len() };
                    assert_eq!(result.hits.len(), expected);
                }
            });
        }
        s.spawn(|| r.initialize(FIVE_RULES, fake()).expect("rebuild"));
    });
    assert_eq!(r.generation(), Some(2));
}

#[test]
fn agent_answer_lists_rules_with_scores() {
    let r = retriever();
    assert_eq!(answer_rules_query(&r, "singlet"), "Error searching rules: retriever has not been initialized");

    r.initialize(RULEBOOK, fake()).expect("init");
    let answer = answer_rules_query(&r, "singlet rules");
    assert!(answer.starts_with("Here are the most relevant rules:\n\n1. Athletes must wear a singlet\n   (Score: "), "{answer}");
    assert!(answer.contains("\n3. "));
    assert!(!answer.contains("\n4. "));
}

#[test]
fn degraded_answer_says_so() {
    let offline = Arc::new(AtomicBool::new(false));
    let r = retriever();
    r.initialize(RULEBOOK, keyword_axes(offline.clone())).expect("init");
    offline.store(true, Ordering::SeqCst);
    let search = r.search("ipf", 3).expect("search");
    let rendered = render_for_agent(&search);
    assert!(rendered.contains("keyword matches only"), "{rendered}");
    assert!(rendered.contains("1. Singlet color restrictions apply at IPF events\n   (Score: 1.000)"), "{rendered}");
    assert!(rendered.contains("\n3. Bar must be loaded evenly\n   (Score: 0.000)"), "{rendered}");
}

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use liftrules_core::config::{FusionKind, RetrievalConfig};
use liftrules_embed::FakeEmbedder;
use liftrules_hybrid::{min_max_normalize, RuleSearch, RulesRetriever};

const VOCAB: &[&str] = &[
    "squat", "bench", "deadlift", "bar", "singlet", "belt", "knee", "sleeves", "referee", "platform", "attempt",
    "weigh-in", "depth", "lockout", "pause", "the", "must", "ipf", "3.2(a)", "collars",
];

fn sentence(max_words: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(VOCAB), 0..max_words).prop_map(|words| words.join(" "))
}

fn corpus() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(sentence(8).prop_filter("chunks carry text", |s| !s.is_empty()), 1..8)
}

fn assert_well_ordered(result: &RuleSearch) {
    for pair in result.hits.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.score > b.score || (a.score == b.score && a.chunk_id < b.chunk_id), "{a:?} before {b:?}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn normalized_scores_stay_in_unit_interval(scores in prop::collection::vec(-50.0f32..50.0, 0..40)) {
        let normalized = min_max_normalize(&scores);
        prop_assert_eq!(normalized.len(), scores.len());
        prop_assert!(normalized.iter().all(|s| (0.0..=1.0).contains(s)));
        if !scores.is_empty() {
            prop_assert!(normalized.iter().any(|&s| s == 1.0));
        }
    }

    #[test]
    fn search_returns_exactly_k_distinct_ordered_hits(
        texts in corpus(),
        query in sentence(5),
        alpha in 0.0f32..=1.0,
        k_seed in 1usize..16,
    ) {
        let config = RetrievalConfig { alpha, ..RetrievalConfig::default() };
        let retriever = RulesRetriever::new(config).expect("valid config");
        retriever.initialize(texts.clone(), Arc::new(FakeEmbedder::new(64))).expect("init");
        let k = 1 + (k_seed - 1) % texts.len();

        let result = retriever.search(&query, k).expect("search");
        prop_assert_eq!(result.hits.len(), k);
        let ids: HashSet<usize> = result.hits.iter().map(|h| h.chunk_id).collect();
        prop_assert_eq!(ids.len(), k);
        prop_assert!(ids.iter().all(|&id| id < texts.len()));
        for hit in &result.hits {
            prop_assert!((0.0..=1.0).contains(&hit.score));
            prop_assert!(hit.lexical_score.map_or(true, |s| (0.0..=1.0).contains(&s)));
            prop_assert!(hit.semantic_score.map_or(true, |s| (0.0..=1.0).contains(&s)));
            prop_assert_eq!(&hit.text, &texts[hit.chunk_id]);
        }
        assert_well_ordered(&result);

        prop_assert_eq!(retriever.search(&query, k).expect("repeat"), result);
    }

    #[test]
    fn rrf_rankings_are_deterministic(texts in corpus(), query in sentence(4)) {
        let config = RetrievalConfig { fusion: FusionKind::Rrf, ..RetrievalConfig::default() };
        let first = RulesRetriever::new(config.clone()).expect("valid config");
        let second = RulesRetriever::new(config).expect("valid config");
        first.initialize(texts.clone(), Arc::new(FakeEmbedder::new(64))).expect("init");
        second.initialize(texts.clone(), Arc::new(FakeEmbedder::new(64))).expect("init");

        let k = texts.len();
        let a = first.search(&query, k).expect("search");
        let b = second.search(&query, k).expect("search");
        prop_assert_eq!(a.hits.len(), k);
        assert_well_ordered(&a);
        prop_assert_eq!(a.hits, b.hits);
    }
}

use chronos_core::knowledge::{Category, KnowledgeCorpus, KnowledgeEntry};
use chronos_core::retrieval::{ActivationRetriever, LexicalScorer, QueryTokens};
use proptest::prelude::*;

const VOCABULARY: &[&str] = &[
    "growth", "sleep", "peptide", "healing", "collagen", "bone", "jaw", "safety", "purity",
    "insulin", "recovery", "vessels", "ethics", "copper", "muscle", "density",
];

fn word() -> impl Strategy<Value = String> {
    prop::sample::select(VOCABULARY).prop_map(str::to_string)
}

fn sentence(max_words: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(word(), 0..max_words).prop_map(|words| words.join(" "))
}

/// Corpora of up to 24 entries; links may point at ids that do not exist
fn corpus() -> impl Strategy<Value = KnowledgeCorpus> {
    (1usize..24).prop_flat_map(|size| {
        prop::collection::vec(
            (
                sentence(4),
                sentence(12),
                prop::collection::vec(word(), 0..5),
                prop::collection::vec(0usize..size + 3, 0..4),
            ),
            size,
        )
        .prop_map(|raw| {
            let entries = raw
                .into_iter()
                .enumerate()
                .map(|(i, (title, content, keywords, links))| {
                    KnowledgeEntry::new(format!("k{}", i), title, Category::Biology, content)
                        .with_keywords(keywords)
                        .with_related(links.into_iter().map(|l| format!("k{}", l)))
                })
                .collect();
            KnowledgeCorpus::new(entries).unwrap()
        })
    })
}

fn query() -> impl Strategy<Value = String> {
    prop_oneof![sentence(6), ".{0,40}"]
}

proptest! {
    #[test]
    fn scores_are_non_negative(query in query(), entry_words in sentence(10)) {
        let entry = KnowledgeEntry::new("k1", "Title", Category::Safety, entry_words.clone())
            .with_keywords(entry_words.split_whitespace());
        let score = LexicalScorer::default().score(&QueryTokens::new(&query), &entry);
        prop_assert!(score >= 0.0 && score.is_finite());
    }

    #[test]
    fn results_are_bounded_and_descending(corpus in corpus(), query in query()) {
        let result = ActivationRetriever::new(&corpus).retrieve(&query);
        prop_assert!(result.len() <= 10);

        let scores: Vec<f64> = result.hits().iter().map(|hit| hit.score).collect();
        prop_assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]), "not descending: {:?}", scores);
        prop_assert!(scores.iter().all(|score| *score > 0.5));

        let mut ids: Vec<&str> = result.hits().iter().map(|hit| hit.entry.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), result.len());
    }

    #[test]
    fn retrieval_is_deterministic(corpus in corpus(), query in query()) {
        let retriever = ActivationRetriever::new(&corpus);
        let first: Vec<(String, f64)> = retriever
            .retrieve(&query)
            .hits()
            .iter()
            .map(|hit| (hit.entry.id.clone(), hit.score))
            .collect();
        let second: Vec<(String, f64)> = retriever
            .retrieve(&query)
            .hits()
            .iter()
            .map(|hit| (hit.entry.id.clone(), hit.score))
            .collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn spreading_is_one_hop(corpus in corpus(), query in query()) {
        let scorer = LexicalScorer::default();
        let tokens = QueryTokens::new(&query);
        let result = ActivationRetriever::new(&corpus).retrieve(&query);

        for hit in result.hits() {
            prop_assert_eq!(hit.direct_score, scorer.score(&tokens, hit.entry));
            if hit.is_spread_only() {
                let linked_from_direct_hit = corpus
                    .entries()
                    .iter()
                    .any(|source| scorer.score(&tokens, source) > 0.0 && source.links_to(&hit.entry.id));
                prop_assert!(linked_from_direct_hit, "{} reached without a direct neighbour", hit.entry.id);
            }
        }
    }
}

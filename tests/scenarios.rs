// tests/scenarios.rs
//
// End-to-end behaviour on the real local backends:
// lexicon classification, toxicity, batch aggregation, determinism,
// distribution invariants and cross-request rate limiting.

mod common;

use std::time::Duration;

use common::{engine_with, label_scores, local_set_with, uncached_config, Behavior, Stub};
use sentiment_engine::backends::BackendId;
use sentiment_engine::signals::ToxicityLevel;
use sentiment_engine::{Label, Method};
use tokio::time::Instant;

const SAMPLES: [&str; 8] = [
    "I absolutely love this amazing product!",
    "This is the worst purchase I have ever made.",
    "The package arrived on Tuesday.",
    "Not bad, but the support was AWFUL!!",
    "It isn't very good at all",
    "good",
    "great great great terrible",
    "I am so happy and excited about the trip",
];

fn local_engine() -> sentiment_engine::SentimentEngine {
    let mut cfg = uncached_config();
    cfg.set_enabled(BackendId::Remote, false);
    let (remote, _) = Stub::new(BackendId::Remote, Behavior::Hang);
    engine_with(cfg, local_set_with(remote))
}

#[tokio::test]
async fn lexicon_positive_sentence() {
    let r = local_engine()
        .analyze("I absolutely love this amazing product!", Method::Lexicon)
        .await
        .unwrap();
    assert_eq!(r.label, Label::Positive);
    assert!(r.confidence > 0.5, "confidence = {}", r.confidence);
    assert_eq!(r.model_identifier, "valence-lexicon");
    assert_eq!(r.word_count, 6);
}

#[tokio::test]
async fn shouting_hate_is_toxic() {
    let r = local_engine()
        .analyze("I HATE THIS!!! worst thing ever", Method::Auto)
        .await
        .unwrap();
    assert!(
        matches!(r.toxicity.level, ToxicityLevel::Medium | ToxicityLevel::High),
        "{:?}",
        r.toxicity
    );
    assert_eq!(r.label, Label::Negative);
}

#[tokio::test]
async fn batch_of_three_positive_one_negative() {
    let stats = local_engine()
        .analyze_many(
            [
                "I love this",
                "What a great experience",
                "Amazing service, thank you",
                "This is terrible",
            ],
            Method::Lexicon,
        )
        .await;
    assert_eq!(stats.analyzed_texts, 4);
    assert_eq!(stats.sentiment_percentages[&Label::Positive], 75.0);
    assert_eq!(stats.sentiment_percentages[&Label::Negative], 25.0);
    assert_eq!(stats.sentiment_distribution[&Label::Positive], 3);
    assert_eq!(stats.dominant_sentiment, Some(Label::Positive));
    assert!(stats.average_confidence > 0.0 && stats.average_confidence <= 1.0);
}

#[tokio::test]
async fn deterministic_backends_are_bit_identical() {
    let engine = local_engine();
    for method in [Method::Lexicon, Method::Statistical, Method::Keyword] {
        for text in SAMPLES {
            let a = engine.analyze(text, method).await.unwrap();
            let b = engine.analyze(text, method).await.unwrap();
            assert_eq!(a.label, b.label, "{method} {text}");
            for l in Label::ALL {
                assert_eq!(
                    a.distribution.get(l).to_bits(),
                    b.distribution.get(l).to_bits(),
                    "{method} {text}"
                );
            }
        }
    }
}

#[tokio::test]
async fn every_result_is_a_normalised_argmax() {
    let engine = local_engine();
    for method in [
        Method::Auto,
        Method::Lexicon,
        Method::Statistical,
        Method::Keyword,
        Method::Ensemble,
    ] {
        for text in SAMPLES {
            let r = engine.analyze(text, method).await.unwrap();
            assert!(r.distribution.is_normalized(), "{method} {text}");
            assert!((0.0..=1.0).contains(&r.confidence));
            assert!((r.confidence - r.distribution.get(r.label)).abs() < 1e-12);
            assert!(
                r.distribution.top_labels(1e-9).contains(&r.label),
                "{method} {text}: {:?} vs {:?}",
                r.label,
                r.distribution
            );
        }
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_the_remote_interval() {
    let mut cfg = uncached_config();
    cfg.backends.remote.min_interval_ms = Some(100);
    let (remote, _) = Stub::new(BackendId::Remote, Behavior::Fixed(label_scores(0.7, 0.2, 0.1)));
    let engine = engine_with(cfg, local_set_with(remote));

    let start = Instant::now();
    let (a, b) = tokio::join!(
        engine.analyze("first request", Method::Remote),
        engine.analyze("second request", Method::Remote)
    );
    assert!(!a.unwrap().degraded);
    assert!(!b.unwrap().degraded);

    let last = engine
        .rate_limiter()
        .last_invocation(BackendId::Remote)
        .expect("remote invoked");
    assert!(last - start >= Duration::from_millis(100));
}

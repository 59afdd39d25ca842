// tests/ensemble.rs
//
// Ensemble mode end to end: concurrent invocation, fusion over survivors,
// deadline handling and the single-member degenerate case.

mod common;

use std::sync::Arc;

use common::{engine_with, label_scores, local_set_with, uncached_config, Behavior, Stub};
use sentiment_engine::backends::{BackendId, BackendSet, KeywordFallbackBackend};
use sentiment_engine::{BackendError, ErrorKind, Label, Method, MethodUsed};

fn weighted_stubs() -> BackendSet {
    BackendSet::new()
        .with(Stub::new(BackendId::Remote, Behavior::Fixed(label_scores(0.8, 0.1, 0.1))).0)
        .with(Stub::new(BackendId::Lexicon, Behavior::Fixed(label_scores(0.6, 0.2, 0.2))).0)
        .with(Stub::new(BackendId::Statistical, Behavior::Fixed(label_scores(0.4, 0.3, 0.3))).0)
}

#[tokio::test]
async fn fuses_literal_weighted_sum() {
    let mut cfg = uncached_config();
    cfg.set_enabled(BackendId::Keyword, false);
    let engine = engine_with(cfg, weighted_stubs());

    let r = engine.analyze("some text", Method::Ensemble).await.unwrap();
    assert_eq!(r.method_used, MethodUsed::Ensemble);
    assert!(!r.degraded);
    assert_eq!(r.label, Label::Positive);
    assert!((r.confidence - 0.66).abs() < 1e-9, "confidence = {}", r.confidence);
    assert!((r.distribution.positive() - 0.66).abs() < 1e-9);
    assert_eq!(
        r.contributing_backends,
        vec![BackendId::Remote, BackendId::Lexicon, BackendId::Statistical]
    );
    assert_eq!(r.model_identifier, "ensemble(remote, lexicon, statistical)");
}

#[tokio::test]
async fn failed_member_is_excluded_and_weights_renormalised() {
    let mut cfg = uncached_config();
    cfg.set_enabled(BackendId::Keyword, false);
    let set = weighted_stubs().with(
        Stub::new(
            BackendId::Remote,
            Behavior::Fail(BackendError::Unavailable("HTTP 502".into())),
        )
        .0,
    );
    let engine = engine_with(cfg, set);

    let r = engine.analyze("some text", Method::Ensemble).await.unwrap();
    // lexicon 0.3 and statistical 0.2 become 0.6 and 0.4
    assert!((r.distribution.positive() - (0.6 * 0.6 + 0.4 * 0.4)).abs() < 1e-9);
    assert!(r.distribution.is_normalized());
    assert!(!r.degraded);
    assert_eq!(r.failures.len(), 1);
    assert_eq!(r.failures[0].backend, BackendId::Remote);
}

#[tokio::test(start_paused = true)]
async fn member_past_deadline_times_out_and_is_excluded() {
    let mut cfg = uncached_config();
    cfg.request_timeout_ms = 200;
    let (remote, _) = Stub::new(BackendId::Remote, Behavior::Hang);
    let engine = engine_with(cfg, local_set_with(remote));

    let r = engine
        .analyze("I love this, it is great", Method::Ensemble)
        .await
        .unwrap();
    assert_eq!(r.method_used, MethodUsed::Ensemble);
    assert!(!r.contributing_backends.contains(&BackendId::Remote));
    assert_eq!(r.contributing_backends.len(), 3);
    let remote_failure = r
        .failures
        .iter()
        .find(|f| f.backend == BackendId::Remote)
        .expect("remote listed as failed");
    assert_eq!(remote_failure.kind, ErrorKind::BackendTimeout);
    assert_eq!(r.label, Label::Positive);
    // Fused from a partial set of members.
    assert!(r.degraded);
    assert_eq!(r.error_kind, Some(ErrorKind::BackendTimeout));
}

#[tokio::test]
async fn keyword_only_ensemble_is_keywords_own_distribution() {
    let mut cfg = uncached_config();
    for id in [BackendId::Remote, BackendId::Lexicon, BackendId::Statistical] {
        cfg.set_enabled(id, false);
    }
    let set = BackendSet::new().with(Arc::new(KeywordFallbackBackend::new()));
    let engine = engine_with(cfg, set);

    let text = "good food, great view, bad parking";
    let fused = engine.analyze(text, Method::Ensemble).await.unwrap();
    let alone = engine.analyze(text, Method::Keyword).await.unwrap();

    assert!(!fused.degraded);
    assert_eq!(fused.method_used, MethodUsed::Ensemble);
    assert_eq!(fused.contributing_backends, vec![BackendId::Keyword]);
    assert_eq!(fused.label, alone.label);
    assert!((fused.distribution.positive() - alone.distribution.positive()).abs() < 1e-12);
    assert!((fused.distribution.negative() - alone.distribution.negative()).abs() < 1e-12);
    assert!((fused.distribution.neutral() - alone.distribution.neutral()).abs() < 1e-12);
}

#[tokio::test]
async fn zero_successes_fall_back_to_default_when_keyword_disabled() {
    let mut cfg = uncached_config();
    cfg.set_enabled(BackendId::Statistical, false);
    cfg.set_enabled(BackendId::Keyword, false);
    let fail = || Behavior::Fail(BackendError::Unavailable("down".into()));
    let set = BackendSet::new()
        .with(Stub::new(BackendId::Remote, fail()).0)
        .with(Stub::new(BackendId::Lexicon, fail()).0);
    let engine = engine_with(cfg, set);

    let r = engine.analyze("text", Method::Ensemble).await.unwrap();
    assert!(r.degraded);
    assert_eq!(r.method_used, MethodUsed::Default);
    assert_eq!(r.error_kind, Some(ErrorKind::AllBackendsExhausted));
    assert_eq!(r.failures.len(), 2);
}

#[tokio::test]
async fn unregistered_keyword_member_skips_rescue() {
    // Keyword enabled but not registered: the ensemble member fails, and the
    // rescue is skipped because keyword was already attempted.
    let mut cfg = uncached_config();
    cfg.set_enabled(BackendId::Statistical, false);
    cfg.set_enabled(BackendId::Lexicon, false);
    let set = BackendSet::new().with(
        Stub::new(
            BackendId::Remote,
            Behavior::Fail(BackendError::Timeout { after_ms: 1 }),
        )
        .0,
    );
    let engine = engine_with(cfg, set);

    let r = engine.analyze("great", Method::Ensemble).await.unwrap();
    assert!(r.degraded);
    assert_eq!(r.method_used, MethodUsed::Default);
}

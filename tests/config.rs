// tests/config.rs
use sentiment_engine::backends::{BackendId, RemoteModelBackend, SentimentBackend};
use sentiment_engine::config::{EngineConfig, ENV_ENGINE_CONFIG_PATH};
use std::{env, fs};

const KEY_VARS: [&str; 3] = ["HUGGINGFACE_API_KEY", "HUGGING_FACE_API_KEY", "HF_API_KEY"];

#[test]
fn load_from_file_merges_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("engine.toml");
    fs::write(
        &p,
        r#"
request_timeout_ms = 2500

[backends.remote]
enabled = false

[cache]
capacity = 5
"#,
    )
    .unwrap();

    let cfg = EngineConfig::load_from_file(&p).unwrap();
    assert_eq!(cfg.request_timeout_ms, 2500);
    assert_eq!(cfg.max_text_length, 5000);
    assert!(!cfg.backend(BackendId::Remote).enabled);
    assert_eq!(cfg.cache.capacity, 5);
    assert_eq!(cfg.cache.ttl_secs, 3600);
    assert_eq!(cfg.remote.retry_backoff_ms, 10_000);
}

#[test]
fn broken_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("broken.toml");
    fs::write(&p, "max_text_length = [").unwrap();
    let err = EngineConfig::load_from_file(&p).unwrap_err();
    assert!(format!("{err:#}").contains("broken.toml"), "{err:#}");
}

#[serial_test::serial]
#[test]
fn load_uses_env_then_default_path_then_builtins() {
    // Isolate CWD so the test never reads the repo's config/
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_ENGINE_CONFIG_PATH);

    // 1) Nothing on disk → built-in defaults
    let cfg = EngineConfig::load().unwrap();
    assert_eq!(cfg.request_timeout_ms, 15_000);

    // 2) ./config/engine.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/engine.toml"), "request_timeout_ms = 900").unwrap();
    assert_eq!(EngineConfig::load().unwrap().request_timeout_ms, 900);

    // 3) env path wins
    let p_env = tmp.path().join("other.toml");
    fs::write(&p_env, "request_timeout_ms = 700").unwrap();
    env::set_var(ENV_ENGINE_CONFIG_PATH, p_env.display().to_string());
    assert_eq!(EngineConfig::load().unwrap().request_timeout_ms, 700);

    // 4) env path pointing nowhere is an error, not a silent default
    env::set_var(ENV_ENGINE_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(EngineConfig::load().is_err());

    env::remove_var(ENV_ENGINE_CONFIG_PATH);
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn remote_backend_is_configured_only_with_a_real_key() {
    for v in KEY_VARS {
        env::remove_var(v);
    }
    let cfg = EngineConfig::default();
    let b = RemoteModelBackend::from_config(&cfg.remote).unwrap();
    assert!(!b.is_configured());

    env::set_var("HUGGING_FACE_API_KEY", "short");
    let b = RemoteModelBackend::from_config(&cfg.remote).unwrap();
    assert!(!b.is_configured(), "keys of 10 chars or fewer are placeholders");

    env::set_var("HUGGING_FACE_API_KEY", "hf_abcdefghijklmnop");
    let b = RemoteModelBackend::from_config(&cfg.remote).unwrap();
    assert!(b.is_configured());

    for v in KEY_VARS {
        env::remove_var(v);
    }
}

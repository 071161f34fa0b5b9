//! Configuration persistence tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use voicecmd::config::LanguageHint;
use voicecmd::nlu::FunctionCatalog;
use voicecmd::{VoiceConfig, VoiceError};

#[test]
fn customized_config_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = VoiceConfig::default();
    config.audio.sample_rate = 8_000;
    config.asr.parameters.language_hints = vec![LanguageHint::Yue, LanguageHint::En];
    config.asr.parameters.vocabulary_id = Some("vocab-123".into());
    config.asr.parameters.max_sentence_silence = 1200;
    config.nlu.command_limit = 3;
    config.nlu.catalog_path = Some(dir.path().join("catalog.json"));
    config.llm.parallel_tool_calls = false;
    config.conversation.empty_utterance_message = "Say that again?".into();

    config.save_to_file(&path).unwrap();
    let loaded = VoiceConfig::from_file(&path).unwrap();

    assert_eq!(loaded.audio.sample_rate, 8_000);
    assert_eq!(
        loaded.asr.parameters.language_hints,
        vec![LanguageHint::Yue, LanguageHint::En]
    );
    assert_eq!(loaded.asr.parameters.vocabulary_id.as_deref(), Some("vocab-123"));
    assert_eq!(loaded.asr.parameters.max_sentence_silence, 1200);
    assert_eq!(loaded.nlu.command_limit, 3);
    assert_eq!(loaded.nlu.catalog_path, config.nlu.catalog_path);
    assert!(!loaded.llm.parallel_tool_calls);
    assert_eq!(loaded.conversation.empty_utterance_message, "Say that again?");
    assert!(loaded.validate().is_ok());

    // Saving the loaded config again is byte-identical.
    let first = std::fs::read_to_string(&path).unwrap();
    loaded.save_to_file(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
}

#[test]
fn out_of_range_silence_in_file_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[asr.parameters]\nmax_sentence_silence = 7000\n",
    )
    .unwrap();

    let config = VoiceConfig::from_file(&path).unwrap();
    match config.validate() {
        Err(VoiceError::Config(msg)) => assert!(msg.contains("200..=6000"), "{msg}"),
        other => unreachable!("expected config error, got {other:?}"),
    }
}

#[test]
fn malformed_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[audio\nsample_rate = ").unwrap();

    assert!(matches!(
        VoiceConfig::from_file(&path),
        Err(VoiceError::Config(_))
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        VoiceConfig::from_file(&dir.path().join("absent.toml")),
        Err(VoiceError::Io(_))
    ));
}

#[test]
fn catalog_fixture_loads_from_file() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/catalog.json");
    let catalog = FunctionCatalog::from_file(&path).unwrap();
    assert_eq!(catalog.len(), 3);
    let transform = catalog.function("ModifyTransform").unwrap();
    assert_eq!(transform.parameters.len(), 3);
    assert!(catalog.vocabulary().contains(&"向右".to_owned()));
}

// パス: tests/persistence.rs
// 役割: 設定ファイルと履歴ファイルの読み書きを確認する統合テスト
// 意図: 起動をまたいで履歴が引き継がれ、壊れた設定が型付きエラーになることを保証する
// 関連ファイル: src/repl/config.rs, src/repl/history.rs
use cubiml::compiler::Session;
use cubiml::repl::{ConfigError, HistoryLog, ReplConfig, ReplDriver, Transcript};
use cubiml::runtime::Interpreter;
use std::fs;
use std::path::Path;

#[test]
fn config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repl.json");
    fs::write(
        &path,
        r#"{"prompt": "ml> ", "history_file": "h.txt", "max_eval_depth": 50}"#,
    )
    .unwrap();
    let config = ReplConfig::load(&path).unwrap();
    assert_eq!(config.prompt, "ml> ");
    assert_eq!(config.history_file.as_deref(), Some(Path::new("h.txt")));
    assert_eq!(config.max_eval_depth, 50);
    assert!(config.persist_history);
}

#[test]
/// 存在しないファイルと不正な JSON は別のエラーになる。
fn config_errors_are_typed() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(
        ReplConfig::load(&missing),
        Err(ConfigError::Io { .. })
    ));
    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ prompt: ").unwrap();
    let err = ReplConfig::load(&broken).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("broken.json"));
}

#[test]
/// 保存した履歴を次のドライバで読み込み、↑ で直前の入力を呼び出せる。
fn history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("history");

    let history = HistoryLog::load(&path, 10).unwrap();
    let mut first = ReplDriver::with_history(
        Session::new(),
        Interpreter::new(),
        Transcript::new(),
        history,
    );
    first.submit("let x = 1");
    first.submit("\"multi\nline\"");
    first.history().save().unwrap();

    let history = HistoryLog::load(&path, 10).unwrap();
    let mut second = ReplDriver::with_history(
        Session::new(),
        Interpreter::new(),
        Transcript::new(),
        history,
    );
    assert_eq!(second.older(), Some("\"multi\nline\""));
    assert_eq!(second.older(), Some("let x = 1"));
}

#[test]
/// 上限を超えた履歴は読み込み時に古いものから捨てる。
fn history_limit_applies_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history");
    fs::write(&path, "\"a\"\n\"b\"\nc\n").unwrap();
    let log = HistoryLog::load(&path, 2).unwrap();
    assert_eq!(log.entries(), &["b", "c"]);
}

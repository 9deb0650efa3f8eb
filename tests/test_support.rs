// パス: tests/test_support.rs
// 役割: 統合テスト共通の補助関数を提供する
// 意図: ドライバの組み立てや 1 サイクル実行を一元化しテストを簡潔に保つ
// 関連ファイル: tests/repl_cycle.rs, tests/language.rs, tests/printer.rs, tests/persistence.rs
#![allow(dead_code)]
use cubiml::compiler::Session;
use cubiml::repl::{CompilerSession, EvalHost, ExecutionResult, ReplDriver, Transcript};
use cubiml::runtime::{Interpreter, Value};

pub type Driver = ReplDriver<Session, Interpreter, Transcript>;

pub const FIB_ML: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/fib.ml"));

pub fn driver() -> Driver {
    ReplDriver::new(Session::new(), Interpreter::new(), Transcript::new())
}

/// 新しいドライバで 1 サイクル実行する。
pub fn run(src: &str) -> ExecutionResult {
    driver().execute_cycle(src)
}

/// 成功を期待して表示文字列を返す。
pub fn print_ok(src: &str) -> String {
    let result = run(src);
    assert!(result.success, "{}: {}", src, result.message);
    result.message
}

/// 失敗を期待してメッセージを返す。
pub fn fail_message(src: &str) -> String {
    let result = run(src);
    assert!(!result.success, "{} は失敗するはず: {}", src, result.message);
    result.message
}

/// 診断文の先頭 `[CODE]` からコードを取り出す。
pub fn diagnostic_code(message: &str) -> &str {
    let start = message.find('[').map_or(0, |i| i + 1);
    let end = message[start..].find(']').map_or(message.len(), |i| start + i);
    &message[start..end]
}

/// コンパイルだけを行い、生成コードを返す。
pub fn compile_ok(src: &str) -> String {
    let mut session = Session::new();
    assert!(session.process(src).expect("process"), "{}", session.error());
    session.output().expect("output").to_string()
}

/// ターゲットコードを直接評価する。
pub fn eval_target(code: &str) -> (Interpreter, Value) {
    let mut host = Interpreter::new();
    let value = host.evaluate(code).expect("evaluate target");
    (host, value)
}

// パス: src/repl/session.rs
// 役割: REPL コアが依存する外部協調者 (コンパイラセッションと評価ホスト) の境界トレイト
// 意図: 駆動ロジックを具体的なコンパイラや実行機構から切り離す
// 関連ファイル: src/repl/driver.rs, src/compiler/mod.rs, src/runtime/interp.rs
//! 外部協調者との境界。
//!
//! コンパイルの成否は `bool` で返し、想定外の内部故障だけを `Err` で表す。
//! 評価は失敗しうる操作として常に `Result` を返す。

use crate::errors::EvalError;
use crate::runtime::{Heap, Value};
use thiserror::Error;

/// コンパイル段階そのものの想定外の故障。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InternalCompilerError {
    pub message: String,
}

impl InternalCompilerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 累積状態を持つコンパイラセッション。
pub trait CompilerSession {
    /// ソースを累積状態に対してコンパイルする。成功時のみ新しい定義が以後の呼び出しで見える。
    fn process(&mut self, source: &str) -> Result<bool, InternalCompilerError>;

    /// 直前の `process` が成功した場合のターゲットコード。
    fn output(&self) -> Result<&str, InternalCompilerError>;

    /// 直前の `process` が失敗した場合の診断メッセージ。
    fn error(&self) -> &str;

    /// 累積状態を破棄して初期状態へ戻す。
    fn reset(&mut self);
}

impl<T: CompilerSession + ?Sized> CompilerSession for &mut T {
    fn process(&mut self, source: &str) -> Result<bool, InternalCompilerError> {
        (**self).process(source)
    }

    fn output(&self) -> Result<&str, InternalCompilerError> {
        (**self).output()
    }

    fn error(&self) -> &str {
        (**self).error()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// ターゲットコードを評価して値を返すホスト。
pub trait EvalHost {
    fn evaluate(&mut self, code: &str) -> Result<Value, EvalError>;

    /// 返した値が指す複合値を収めたヒープ。
    fn heap(&self) -> &Heap;
}

impl<T: EvalHost + ?Sized> EvalHost for &mut T {
    fn evaluate(&mut self, code: &str) -> Result<Value, EvalError> {
        (**self).evaluate(code)
    }

    fn heap(&self) -> &Heap {
        (**self).heap()
    }
}

// パス: src/lib.rs
// 役割: クレートのルート。各モジュールの配線と再エクスポート
// 意図: REPL コアと参照実装 (コンパイラ・評価ホスト) を一つのライブラリとして提供する
// 関連ファイル: src/repl/mod.rs, src/compiler/mod.rs, src/runtime/mod.rs
//! cubiml REPL (Rust)
//!
//! 目的:
//! - 入力をコンパイルし、生成コードを評価して値を表示する対話サイクルを提供する。
//! - サイクルの中核 (`repl`) はコンパイラと評価ホストをトレイト越しにのみ扱う。
//!
//! 方針:
//! - コメント/ドキュメントは日本語、識別子は英語。
//! - `compiler` と `runtime` は手元で動かすための参照実装。

pub mod ast;
pub mod compiler;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod runtime;

pub use crate::compiler::Session;
pub use crate::errors::*;
pub use crate::parser::{parse_expr, parse_script};
pub use crate::repl::{CompilerSession, EvalHost, ExecutionResult, ReplDriver};
pub use crate::runtime::{Heap, Interpreter, Value};

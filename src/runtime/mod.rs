// パス: src/runtime/mod.rs
// 役割: 値モデルと参照実装の評価ホストをまとめる
// 意図: REPL コアからは `Value`/`Heap` と `EvalHost` 実装だけを見せる
// 関連ファイル: src/runtime/value.rs, src/runtime/interp.rs, src/repl/session.rs

mod interp;
pub mod reader;
mod value;

pub use interp::{Interpreter, DEFAULT_MAX_DEPTH};
pub use value::{FuncId, Heap, ObjId, Object, SymbolId, Value};

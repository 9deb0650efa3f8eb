// パス: src/compiler/mod.rs
// 役割: REPL から使うコンパイラセッション (字句解析 → 構文解析 → スコープ解決 → コード生成)
// 意図: 入力ごとにトップレベル定義を積み上げ、失敗時はセッションの状態を変えない
// 関連ファイル: src/compiler/resolve.rs, src/compiler/codegen.rs, src/repl/session.rs
//! cubiml のコンパイラセッション。
//!
//! 通常のコンパイル失敗 (字句・構文・スコープ) は `process` が `Ok(false)` を返し、
//! 診断文は `error()` で取得する。`Err` はコード生成器自身の故障に限られる。

mod codegen;
mod resolve;

use std::collections::HashMap;

use crate::errors::CompileError;
use crate::lexer::LineMap;
use crate::parser::parse_script;
use crate::repl::session::{CompilerSession, InternalCompilerError};
use codegen::Emitter;

#[derive(Debug, Default)]
pub struct Session {
    /// トップレベル名から現在のグローバルスロットへの対応。
    globals: HashMap<String, String>,
    next_slot: usize,
    output: Option<String>,
    error: String,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// トップレベル名に現在割り当てられているスロット。
    pub fn slot_of(&self, name: &str) -> Option<&str> {
        self.globals.get(name).map(String::as_str)
    }

    fn compile(&self, source: &str) -> Result<Result<Compiled, CompileError>, InternalCompilerError> {
        let script = match parse_script(source) {
            Ok(script) => script,
            Err(e) => return Ok(Err(e.into())),
        };
        if let Err(e) = resolve::check_script(&script, &self.globals) {
            return Ok(Err(e));
        }
        let mut emitter = Emitter::new(self.globals.clone(), self.next_slot);
        let text = emitter.emit_script(&script)?;
        log::debug!("生成コード: {}", text);
        let (globals, next_slot) = emitter.into_scope();
        Ok(Ok(Compiled {
            output: text,
            globals,
            next_slot,
        }))
    }
}

/// 成功したコンパイルの結果。`process` が確定させるまでセッションには反映しない。
struct Compiled {
    output: String,
    globals: HashMap<String, String>,
    next_slot: usize,
}

/// 行番号を持つ診断にソース行のスニペットを付ける。
fn with_source_line(source: &str, err: CompileError) -> CompileError {
    match (err.0.snippet.is_some(), err.0.line) {
        (false, Some(line)) => {
            let text = LineMap::new(source).line_text(source, line).to_string();
            err.with_snippet(text)
        }
        _ => err,
    }
}

impl CompilerSession for Session {
    fn process(&mut self, source: &str) -> Result<bool, InternalCompilerError> {
        self.output = None;
        self.error.clear();
        match self.compile(source)? {
            Ok(compiled) => {
                self.globals = compiled.globals;
                self.next_slot = compiled.next_slot;
                self.output = Some(compiled.output);
                Ok(true)
            }
            Err(e) => {
                log::debug!("コンパイル失敗: {}", e.code());
                self.error = with_source_line(source, e).to_string();
                Ok(false)
            }
        }
    }

    fn output(&self) -> Result<&str, InternalCompilerError> {
        self.output
            .as_deref()
            .ok_or_else(|| InternalCompilerError::new("コンパイル済みの出力がありません"))
    }

    fn error(&self) -> &str {
        &self.error
    }

    fn reset(&mut self) {
        log::info!(
            "コンパイラセッションを初期化します ({} 個の定義を破棄)",
            self.globals.len()
        );
        *self = Self::default();
    }
}

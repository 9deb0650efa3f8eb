// パス: src/repl/driver.rs
// 役割: コンパイル・評価・表示の 1 サイクルを駆動し、履歴と出力を更新する
// 意図: 失敗をすべて `ExecutionResult` に変換し、REPL が止まらないようにする
// 関連ファイル: src/repl/session.rs, src/repl/printer.rs, src/repl/history.rs, src/repl/sink.rs
//! REPL ドライバ
//!
//! - `submit`: 1 行入力。セッションの状態を積み上げる。
//! - `recompile_all`: 出力とセッションを初期化してからバッファ全体を実行する。
//! - `older`/`newer`: 履歴の閲覧。履歴そのものは変更しない。

use super::history::HistoryLog;
use super::printer::ValuePrinter;
use super::session::{CompilerSession, EvalHost};
use super::sink::{LineStyle, OutputSink};
use thiserror::Error;

/// 入力行のエコーに付ける接頭辞 (`>>` と改行しない空白)。
pub const INPUT_PREFIX: &str = ">>\u{a0}";

/// 1 回のサイクルの結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
}

impl ExecutionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn style(&self) -> LineStyle {
        if self.success {
            LineStyle::Success
        } else {
            LineStyle::Error
        }
    }
}

/// サイクル中に起こりうる失敗の分類。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    /// コンパイラが通常の失敗を報告した。メッセージは診断そのもの。
    #[error("{0}")]
    Compile(String),
    #[error("Internal compiler error: {0}")]
    InternalCompiler(String),
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl From<CycleError> for ExecutionResult {
    fn from(err: CycleError) -> Self {
        ExecutionResult::failed(err.to_string())
    }
}

pub struct ReplDriver<C, H, S> {
    session: C,
    host: H,
    sink: S,
    history: HistoryLog,
}

impl<C, H, S> ReplDriver<C, H, S>
where
    C: CompilerSession,
    H: EvalHost,
    S: OutputSink,
{
    pub fn new(session: C, host: H, sink: S) -> Self {
        Self::with_history(session, host, sink, HistoryLog::new())
    }

    pub fn with_history(session: C, host: H, sink: S, history: HistoryLog) -> Self {
        Self {
            session,
            host,
            sink,
            history,
        }
    }

    /// 1 行の入力を処理する。空白だけの入力は何もせず `None`。
    pub fn submit(&mut self, raw: &str) -> Option<ExecutionResult> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        self.history.record(text);
        self.sink
            .append(&format!("{}{}", INPUT_PREFIX, text), LineStyle::Input);
        let result = self.execute_cycle(text);
        self.sink.append(&result.message, result.style());
        Some(result)
    }

    /// セッションを初期化してバッファ全体を実行する。空のバッファは何もしない。
    pub fn recompile_all(&mut self, buffer: &str) -> Option<ExecutionResult> {
        let text = buffer.trim();
        if text.is_empty() {
            return None;
        }
        log::info!("セッションを初期化して全体を再コンパイルします");
        self.sink.clear();
        self.session.reset();
        let result = self.execute_cycle(text);
        self.sink.append(&result.message, result.style());
        Some(result)
    }

    /// コンパイル・評価・表示を行う。失敗はすべて結果へ変換し、呼び出し元へ伝播しない。
    pub fn execute_cycle(&mut self, code: &str) -> ExecutionResult {
        match self.run_cycle(code) {
            Ok(printed) => ExecutionResult::ok(printed),
            Err(err) => {
                log::debug!("サイクル失敗: {:?}", err);
                err.into()
            }
        }
    }

    fn run_cycle(&mut self, code: &str) -> Result<String, CycleError> {
        log::debug!("コンパイル開始 ({} バイト)", code.len());
        let compiled = self
            .session
            .process(code)
            .map_err(|e| CycleError::InternalCompiler(e.to_string()))?;
        if !compiled {
            return Err(CycleError::Compile(self.session.error().to_string()));
        }
        let wrapped = format!(
            "({})",
            self.session
                .output()
                .map_err(|e| CycleError::InternalCompiler(e.to_string()))?
        );
        log::debug!("評価開始");
        let value = self
            .host
            .evaluate(&wrapped)
            .map_err(|e| CycleError::Evaluation(e.to_string()))?;
        Ok(ValuePrinter::new(self.host.heap()).print(&value))
    }

    /// 1 つ古い履歴エントリ。
    pub fn older(&mut self) -> Option<&str> {
        self.history.older()
    }

    /// 1 つ新しい履歴エントリ。
    pub fn newer(&mut self) -> Option<&str> {
        self.history.newer()
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryLog {
        &mut self.history
    }

    pub fn session(&self) -> &C {
        &self.session
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_parts(self) -> (C, H, S, HistoryLog) {
        (self.session, self.host, self.sink, self.history)
    }
}

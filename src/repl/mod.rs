// パス: src/repl/mod.rs
// 役割: REPL を構成するモジュール群のファサード
// 意図: 駆動コアと端末フロントエンドを分け、外部へは必要な型だけを公開する
// 関連ファイル: src/repl/driver.rs, src/repl/cmd.rs, src/bin/cubiml.rs
//! cubiml の対話環境。
//!
//! - `session`: コンパイラと評価ホストの境界トレイト
//! - `driver`: コンパイル・評価・表示の 1 サイクル
//! - `printer`: 値の文字列化
//! - `history`: 入力履歴と閲覧カーソル
//! - `sink`: 出力先
//! - `cmd` / `line_editor`: 端末フロントエンド

pub mod cmd;
pub mod config;
pub mod driver;
pub mod history;
mod line_editor;
pub mod printer;
pub mod session;
pub mod sink;

pub use cmd::{run_repl, StartupOptions};
pub use config::{ConfigError, ReplConfig};
pub use driver::{CycleError, ExecutionResult, ReplDriver, INPUT_PREFIX};
pub use history::HistoryLog;
pub use line_editor::{HistoryBrowser, LineEditor, ReadResult};
pub use printer::{print_value, ValuePrinter};
pub use session::{CompilerSession, EvalHost, InternalCompilerError};
pub use sink::{LineStyle, OutputLine, OutputSink, TerminalSink, Transcript};

// パス: src/repl/cmd.rs
// 役割: REPL のメインループ、コマンド解釈、起動時のファイル実行
// 意図: 行入力を `ReplDriver` のイベント (1 行投入・全体再コンパイル・履歴閲覧) へ振り分ける
// 関連ファイル: src/repl/driver.rs, src/repl/line_editor.rs, src/repl/config.rs, src/bin/cubiml.rs
//! cubiml REPL におけるコマンド処理と入力ループ。
//! `:` で始まる行はコマンド、それ以外は 1 行投入としてドライバへ渡す。

use std::io::{self, Write};
use std::path::Path;

use super::config::ReplConfig;
use super::driver::ReplDriver;
use super::history::{resolve_history_path, HistoryLog};
use super::line_editor::{HistoryBrowser, LineEditor, ReadResult};
use super::printer::render_help;
use super::session::{CompilerSession, EvalHost};
use super::sink::{LineStyle, OutputSink, TerminalSink};
use crate::compiler::Session;
use crate::runtime::Interpreter;

/// 起動時の動作指定。
#[derive(Debug, Clone, Default)]
pub struct StartupOptions<'a> {
    /// 対話開始前に全体実行するファイル。
    pub run: Option<&'a Path>,
    /// `run` の実行後、対話に入らず終了する。
    pub batch: bool,
}

/// 端末で REPL を起動する。起動時実行が失敗した場合は `Ok(false)` を返す。
pub fn run_repl(config: &ReplConfig, startup: StartupOptions<'_>) -> io::Result<bool> {
    let sink = TerminalSink::new(io::stdout(), io::stderr())
        .echo_input(config.echo_input)
        .color(config.color);
    let host = Interpreter::with_max_depth(config.max_eval_depth);
    let mut driver = ReplDriver::with_history(Session::new(), host, sink, open_history(config));
    let mut state = LoopState::default();

    let mut ok = true;
    if let Some(path) = startup.run {
        ok = exec_run(&mut driver, &mut state, &FsIo, &path.to_string_lossy());
    }
    if !startup.batch {
        let mut editor = LineEditor::new();
        let mut stdout = io::stdout();
        run_repl_with(&mut editor, &FsIo, &mut driver, &mut state, config, &mut stdout)?;
    }

    if config.persist_history {
        if let Err(e) = driver.history().save() {
            log::warn!("履歴の保存に失敗しました: {}", e);
        }
    }
    Ok(ok)
}

/// 設定に従って履歴を開く。読めないファイルは警告だけ出して空の履歴にする。
fn open_history(config: &ReplConfig) -> HistoryLog {
    let fresh = || HistoryLog::with_max_entries(config.max_history);
    if !config.persist_history {
        return fresh();
    }
    let Some(path) = resolve_history_path(config.history_file.as_deref()) else {
        return fresh();
    };
    match HistoryLog::load(&path, config.max_history) {
        Ok(log) => {
            log::debug!("履歴を読み込みました: {} ({} 件)", path.display(), log.len());
            log
        }
        Err(e) => {
            log::warn!("履歴を読み込めません: {}: {}", path.display(), e);
            fresh()
        }
    }
}

pub(crate) trait ReplLineSource {
    fn read_line(
        &mut self,
        prompt: &str,
        history: &mut dyn HistoryBrowser,
    ) -> io::Result<ReadResult>;
}

impl ReplLineSource for LineEditor {
    fn read_line(
        &mut self,
        prompt: &str,
        history: &mut dyn HistoryBrowser,
    ) -> io::Result<ReadResult> {
        LineEditor::read_line(self, prompt, history)
    }
}

/// REPL に必要な最小限のファイル読み込み抽象。
pub(crate) trait ReplIo {
    fn read_to_string(&self, path: &str) -> Result<String, String>;
}

/// 実際のファイルシステムにアクセスする標準実装。
pub(crate) struct FsIo;

impl ReplIo for FsIo {
    fn read_to_string(&self, path: &str) -> Result<String, String> {
        std::fs::read_to_string(path)
            .map_err(|e| format!("エラー: ファイルを開けません: {}: {}", path, e))
    }
}

/// ループをまたいで保持する状態。
#[derive(Debug, Default)]
pub(crate) struct LoopState {
    last_run: Option<String>,
}

fn run_repl_with<L, I, C, H, S, W>(
    editor: &mut L,
    file_io: &I,
    driver: &mut ReplDriver<C, H, S>,
    state: &mut LoopState,
    config: &ReplConfig,
    out: &mut W,
) -> io::Result<()>
where
    L: ReplLineSource,
    I: ReplIo,
    C: CompilerSession,
    H: EvalHost,
    S: OutputSink,
    W: Write,
{
    writeln!(out, "cubiml REPL (Rust) :: :help でヘルプ")?;
    let mut buffer = String::new();

    'repl: loop {
        buffer.clear();
        let mut prompt = config.prompt.as_str();
        let input = loop {
            match editor.read_line(prompt, driver) {
                Ok(ReadResult::Line(line)) => {
                    buffer.push_str(&line);
                    buffer.push('\n');
                    if needs_more_input(&buffer) {
                        prompt = config.continuation_prompt.as_str();
                        continue;
                    }
                    break buffer.trim().to_string();
                }
                Ok(ReadResult::Eof) => {
                    if buffer.trim().is_empty() {
                        writeln!(out)?;
                        break 'repl;
                    }
                    break buffer.trim().to_string();
                }
                Ok(ReadResult::Interrupted) => continue 'repl,
                Err(e) => {
                    driver
                        .sink_mut()
                        .append(&format!("入力エラー: {}", e), LineStyle::Error);
                    break 'repl;
                }
            }
        };

        if input.is_empty() {
            continue;
        }

        match parse_repl_command(&input) {
            ReplCommand::Help => render_help(out)?,
            ReplCommand::Quit => break,
            ReplCommand::History => {
                for (i, entry) in driver.history().entries().iter().enumerate() {
                    writeln!(out, "{:>4}  {}", i + 1, entry)?;
                }
            }
            ReplCommand::Run(path) => {
                exec_run(driver, state, file_io, &path);
            }
            ReplCommand::Rerun => match state.last_run.clone() {
                Some(path) => {
                    exec_run(driver, state, file_io, &path);
                }
                None => driver
                    .sink_mut()
                    .append("エラー: 直近の :run がありません", LineStyle::Error),
            },
            ReplCommand::Submit(src) => {
                driver.submit(&src);
            }
            ReplCommand::Invalid(s) => driver.sink_mut().append(
                &format!("エラー: コマンド形式が不正です: {}", s),
                LineStyle::Error,
            ),
        }
    }
    Ok(())
}

/// ファイル全体をセッションを初期化して実行する。成功したかどうかを返す。
fn exec_run<I, C, H, S>(
    driver: &mut ReplDriver<C, H, S>,
    state: &mut LoopState,
    file_io: &I,
    path: &str,
) -> bool
where
    I: ReplIo,
    C: CompilerSession,
    H: EvalHost,
    S: OutputSink,
{
    let src = match file_io.read_to_string(path) {
        Ok(src) => src,
        Err(msg) => {
            driver.sink_mut().append(&msg, LineStyle::Error);
            return false;
        }
    };
    state.last_run = Some(path.to_string());
    log::info!("{} を実行します", path);
    driver.recompile_all(&src).map_or(true, |r| r.success)
}

/// 括弧・文字列・コメントの開き放しを検知して、続きの行が必要かを判定する。
fn needs_more_input(src: &str) -> bool {
    // コマンド行は常に単行扱い。
    if src.trim_start().starts_with(':') {
        return false;
    }
    let mut depth = 0i32;
    let mut comment = 0usize;
    let mut in_str = false;
    let mut esc = false;
    let mut chars = src.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_str {
            if esc {
                esc = false;
                continue;
            }
            match ch {
                '\\' => esc = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        let opens_comment = ch == '(' && chars.peek() == Some(&'*');
        if comment > 0 {
            if opens_comment {
                chars.next();
                comment += 1;
            } else if ch == '*' && chars.peek() == Some(&')') {
                chars.next();
                comment -= 1;
            }
            continue;
        }
        match ch {
            '(' if opens_comment => {
                chars.next();
                comment += 1;
            }
            '(' | '{' => depth += 1,
            ')' | '}' => depth -= 1,
            '"' => in_str = true,
            _ => {}
        }
    }
    depth > 0 || in_str || comment > 0
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// REPL が解釈できるトップレベルコマンドの集合。
pub(crate) enum ReplCommand {
    /// `:help` / `:h`
    Help,
    /// `:quit` / `:q`
    Quit,
    /// `:history` で履歴を一覧する。
    History,
    /// `:run PATH` でファイル全体を実行する。
    Run(String),
    /// `:rerun` で直近の `:run` を繰り返す。
    Rerun,
    /// コマンド以外の入力。1 行投入として扱う。
    Submit(String),
    /// 認識できなかったコマンド入力。
    Invalid(String),
}

/// 生の入力文字列を `ReplCommand` 列挙に解析する。
pub(crate) fn parse_repl_command(input: &str) -> ReplCommand {
    let s = input.trim();
    if !s.starts_with(':') {
        return ReplCommand::Submit(s.to_string());
    }
    match s {
        ":help" | ":h" => return ReplCommand::Help,
        ":quit" | ":q" => return ReplCommand::Quit,
        ":history" => return ReplCommand::History,
        ":rerun" => return ReplCommand::Rerun,
        _ => {}
    }
    if let Some(rest) = s.strip_prefix(":run ") {
        let path = rest.trim();
        if !path.is_empty() {
            return ReplCommand::Run(path.to_string());
        }
    }
    ReplCommand::Invalid(s.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::io;

    use super::{
        exec_run, needs_more_input, parse_repl_command, run_repl_with, LoopState, ReplCommand,
        ReplIo, ReplLineSource,
    };
    use crate::compiler::Session;
    use crate::repl::config::ReplConfig;
    use crate::repl::driver::ReplDriver;
    use crate::repl::line_editor::{HistoryBrowser, ReadResult};
    use crate::repl::sink::{LineStyle, Transcript};
    use crate::runtime::Interpreter;

    /// 事前に登録した行を順に返す入力源。`None` は ↑ キーで履歴を呼び出す。
    struct ScriptedLineSource {
        lines: VecDeque<Option<&'static str>>,
        prompts: Vec<String>,
    }

    impl ScriptedLineSource {
        fn new(lines: Vec<Option<&'static str>>) -> Self {
            Self {
                lines: lines.into(),
                prompts: Vec::new(),
            }
        }
    }

    impl ReplLineSource for ScriptedLineSource {
        fn read_line(
            &mut self,
            prompt: &str,
            history: &mut dyn HistoryBrowser,
        ) -> io::Result<ReadResult> {
            self.prompts.push(prompt.to_string());
            match self.lines.pop_front() {
                Some(Some(line)) => Ok(ReadResult::Line(line.to_string())),
                Some(None) => Ok(ReadResult::Line(history.older().unwrap_or_default())),
                None => Ok(ReadResult::Eof),
            }
        }
    }

    /// 事前に登録したレスポンスを返すテスト用モック I/O。
    struct MapIo(HashMap<&'static str, &'static str>);

    impl ReplIo for MapIo {
        fn read_to_string(&self, path: &str) -> Result<String, String> {
            self.0
                .get(path)
                .map(|s| s.to_string())
                .ok_or_else(|| format!("エラー: ファイルを開けません: {}", path))
        }
    }

    type TestDriver = ReplDriver<Session, Interpreter, Transcript>;

    fn mk_driver() -> TestDriver {
        ReplDriver::new(Session::new(), Interpreter::new(), Transcript::new())
    }

    fn run_script(
        lines: Vec<Option<&'static str>>,
        files: &[(&'static str, &'static str)],
    ) -> (TestDriver, ScriptedLineSource, String) {
        let mut driver = mk_driver();
        let mut source = ScriptedLineSource::new(lines);
        let io = MapIo(files.iter().copied().collect());
        let mut out = Vec::new();
        let mut state = LoopState::default();
        run_repl_with(
            &mut source,
            &io,
            &mut driver,
            &mut state,
            &ReplConfig::default(),
            &mut out,
        )
        .unwrap();
        (driver, source, String::from_utf8(out).unwrap())
    }

    fn results(driver: &TestDriver) -> Vec<(&str, LineStyle)> {
        driver
            .sink()
            .lines()
            .iter()
            .filter(|l| l.style != LineStyle::Input)
            .map(|l| (l.text.as_str(), l.style))
            .collect()
    }

    #[test]
    /// 未閉じの括弧や波括弧で継続入力が必要かを確認する。
    fn needs_more_input_balancing() {
        assert!(needs_more_input("(1 + 2"));
        assert!(!needs_more_input("(1 + 2)"));
        assert!(needs_more_input("{a = 1;"));
        assert!(!needs_more_input("{a = 1}"));
    }

    #[test]
    /// 文字列とコメントの閉じ忘れを検知する。コメント・文字列中の括弧は数えない。
    fn needs_more_input_strings_and_comments() {
        assert!(needs_more_input("\"abc"));
        assert!(!needs_more_input("\"a\\\"b\""));
        assert!(!needs_more_input("\"(\""));
        assert!(needs_more_input("(* open"));
        assert!(needs_more_input("(* (* nested *)"));
        assert!(!needs_more_input("(* ( *) 1"));
    }

    #[test]
    /// コマンド行が常に単独で確定することを確かめる。
    fn needs_more_input_commands_do_not_continue() {
        assert!(!needs_more_input(":run (weird"));
    }

    #[test]
    /// 代表的なコマンドが想定した `ReplCommand` に分類されるかを確認する。
    fn parse_repl_command_variants() {
        assert_eq!(parse_repl_command(":help"), ReplCommand::Help);
        assert_eq!(parse_repl_command(":q"), ReplCommand::Quit);
        assert_eq!(parse_repl_command(":history"), ReplCommand::History);
        assert_eq!(parse_repl_command(":rerun"), ReplCommand::Rerun);
        assert_eq!(
            parse_repl_command(":run demos/fib.ml"),
            ReplCommand::Run("demos/fib.ml".into())
        );
        assert_eq!(
            parse_repl_command(" 1 + 2 "),
            ReplCommand::Submit("1 + 2".into())
        );
        assert_eq!(
            parse_repl_command(":run"),
            ReplCommand::Invalid(":run".into())
        );
        assert_eq!(
            parse_repl_command(":bogus"),
            ReplCommand::Invalid(":bogus".into())
        );
    }

    #[test]
    /// 1 行投入が定義を積み上げ、表示済みの値を出力する。
    fn loop_submits_lines_and_accumulates_definitions() {
        let (driver, _, out) = run_script(vec![Some("let x = 20"), Some("x + 22")], &[]);
        assert!(out.starts_with("cubiml REPL"));
        assert_eq!(
            results(&driver),
            vec![("20.0", LineStyle::Success), ("42.0", LineStyle::Success)]
        );
        assert_eq!(driver.history().entries(), &["let x = 20", "x + 22"]);
    }

    #[test]
    /// 括弧が閉じるまで継続プロンプトで読み続け、1 回の投入にまとめる。
    fn loop_joins_continuation_lines() {
        let (driver, source, _) = run_script(vec![Some("(1 +"), Some("2)")], &[]);
        assert_eq!(source.prompts[..2], [">> ".to_string(), ".. ".to_string()]);
        assert_eq!(results(&driver), vec![("3.0", LineStyle::Success)]);
        assert_eq!(driver.history().entries(), &["(1 +\n2)"]);
    }

    #[test]
    /// ↑ キー相当の入力で直前の投入を再実行できる。
    fn loop_recalls_history_entries() {
        let (driver, _, _) = run_script(vec![Some("1 + 1"), None], &[]);
        assert_eq!(
            results(&driver),
            vec![("2.0", LineStyle::Success), ("2.0", LineStyle::Success)]
        );
        assert_eq!(driver.history().len(), 1);
    }

    #[test]
    /// :run は出力とセッションを初期化し、:rerun で同じファイルを再実行する。
    fn run_and_rerun_recompile_whole_file() {
        let (driver, _, _) = run_script(
            vec![
                Some("let y = 1"),
                Some(":run prog.ml"),
                Some("y"),
                Some(":rerun"),
            ],
            &[("prog.ml", "let z = 5;\nz * 2")],
        );
        let texts: Vec<_> = driver.sink().lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["10.0"]);
    }

    #[test]
    /// 全体実行の後は以前の定義が見えない。
    fn run_discards_previous_definitions() {
        let (driver, _, _) = run_script(
            vec![Some("let y = 1"), Some(":run prog.ml"), Some("y")],
            &[("prog.ml", "2")],
        );
        let lines = driver.sink().lines();
        assert_eq!(lines[0].text, "2.0");
        assert_eq!(lines.last().map(|l| l.style), Some(LineStyle::Error));
        assert!(lines.last().unwrap().text.contains("CMP001"));
    }

    #[test]
    /// 読めないファイルや不正なコマンドはエラー行になるがループは続く。
    fn errors_do_not_stop_the_loop() {
        let (driver, _, _) = run_script(
            vec![
                Some(":run missing.ml"),
                Some(":rerun"),
                Some(":nope"),
                Some("1"),
            ],
            &[],
        );
        let styles: Vec<_> = results(&driver).into_iter().map(|(_, s)| s).collect();
        assert_eq!(
            styles,
            vec![
                LineStyle::Error,
                LineStyle::Error,
                LineStyle::Error,
                LineStyle::Success
            ]
        );
    }

    #[test]
    /// :history は古い順に番号付きで一覧し、:help はヘルプを出す。
    fn history_and_help_commands_write_to_out() {
        let (_, _, out) = run_script(
            vec![Some("1"), Some("2"), Some(":history"), Some(":help")],
            &[],
        );
        assert!(out.contains("   1  1\n   2  2\n"));
        assert!(out.contains("利用可能なコマンド"));
    }

    #[test]
    /// :quit 以降の入力は読まれない。
    fn quit_stops_reading() {
        let (driver, source, _) = run_script(vec![Some(":q"), Some("1")], &[]);
        assert!(driver.sink().is_empty());
        assert_eq!(source.lines.len(), 1);
    }

    #[test]
    /// exec_run は結果の成否を返す。
    fn exec_run_reports_success() {
        let mut driver = mk_driver();
        let mut state = LoopState::default();
        let io = MapIo([("ok.ml", "1"), ("bad.ml", "1 +")].into_iter().collect());
        assert!(exec_run(&mut driver, &mut state, &io, "ok.ml"));
        assert!(!exec_run(&mut driver, &mut state, &io, "bad.ml"));
        assert_eq!(state.last_run.as_deref(), Some("bad.ml"));
    }
}

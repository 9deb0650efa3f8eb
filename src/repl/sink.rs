// パス: src/repl/sink.rs
// 役割: REPL の出力行を受け取る出力先 (シンク) を定義する
// 意図: 駆動ロジックを端末やテスト用の記録先から独立させる
// 関連ファイル: src/repl/driver.rs, src/repl/cmd.rs
//! 出力シンク
//!
//! 出力はスタイル付きの行の列で、`clear` で蓄積分を消去できる。

use std::io::{self, Write};

/// 出力行のスタイル。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineStyle {
    Input,
    Success,
    Error,
}

impl LineStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            LineStyle::Input => "input",
            LineStyle::Success => "success",
            LineStyle::Error => "error",
        }
    }
}

pub trait OutputSink {
    fn append(&mut self, text: &str, style: LineStyle);
    fn clear(&mut self);
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn append(&mut self, text: &str, style: LineStyle) {
        (**self).append(text, style)
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub text: String,
    pub style: LineStyle,
}

/// メモリ上に行を蓄積するシンク。
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    lines: Vec<OutputLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last(&self) -> Option<&OutputLine> {
        self.lines.last()
    }
}

impl OutputSink for Transcript {
    fn append(&mut self, text: &str, style: LineStyle) {
        self.lines.push(OutputLine {
            text: text.to_string(),
            style,
        });
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// ライターへ書き出すシンク。エラー行は `err` 側へ送る。
pub struct TerminalSink<W: Write, E: Write> {
    out: W,
    err: E,
    echo_input: bool,
    color: bool,
}

impl<W: Write, E: Write> TerminalSink<W, E> {
    pub fn new(out: W, err: E) -> Self {
        Self {
            out,
            err,
            echo_input: false,
            color: false,
        }
    }

    /// 入力行のエコーを切り替える。端末では入力済みの行が既に見えている。
    pub fn echo_input(mut self, on: bool) -> Self {
        self.echo_input = on;
        self
    }

    pub fn color(mut self, on: bool) -> Self {
        self.color = on;
        self
    }

    pub fn into_inner(self) -> (W, E) {
        (self.out, self.err)
    }

    fn write_line(&mut self, text: &str, style: LineStyle) -> io::Result<()> {
        match style {
            LineStyle::Input if !self.echo_input => Ok(()),
            LineStyle::Input | LineStyle::Success => {
                writeln!(self.out, "{}", text)?;
                self.out.flush()
            }
            LineStyle::Error if self.color => {
                writeln!(self.err, "{}{}{}", RED, text, RESET)?;
                self.err.flush()
            }
            LineStyle::Error => {
                writeln!(self.err, "{}", text)?;
                self.err.flush()
            }
        }
    }
}

impl<W: Write, E: Write> OutputSink for TerminalSink<W, E> {
    fn append(&mut self, text: &str, style: LineStyle) {
        if let Err(e) = self.write_line(text, style) {
            log::warn!("出力の書き込みに失敗しました: {}", e);
        }
    }

    fn clear(&mut self) {
        if !self.color {
            return;
        }
        if let Err(e) = write!(self.out, "{}", CLEAR_SCREEN).and_then(|_| self.out.flush()) {
            log::warn!("画面の消去に失敗しました: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LineStyle, OutputSink, TerminalSink, Transcript};

    fn render(echo: bool, color: bool, f: impl FnOnce(&mut dyn OutputSink)) -> (String, String) {
        let mut sink = TerminalSink::new(Vec::new(), Vec::new())
            .echo_input(echo)
            .color(color);
        f(&mut sink);
        let (out, err) = sink.into_inner();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    /// 記録用シンクは行とスタイルを順に保持し、clear で空になる。
    fn transcript_records_and_clears() {
        let mut t = Transcript::new();
        t.append("a", LineStyle::Input);
        t.append("b", LineStyle::Error);
        assert_eq!(t.len(), 2);
        assert_eq!(t.last().map(|l| l.style), Some(LineStyle::Error));
        t.clear();
        assert!(t.is_empty());
    }

    #[test]
    /// エコー無効時は入力行を書き出さず、エラー行は err 側へ送る。
    fn terminal_sink_routes_lines() {
        let (out, err) = render(false, false, |s| {
            s.append(">>\u{a0}1", LineStyle::Input);
            s.append("2.0", LineStyle::Success);
            s.append("boom", LineStyle::Error);
        });
        assert_eq!(out, "2.0\n");
        assert_eq!(err, "boom\n");
    }

    #[test]
    /// 色付き出力ではエラー行が着色され、clear で画面消去が送られる。
    fn terminal_sink_color_and_clear() {
        let (out, err) = render(true, true, |s| {
            s.append("x", LineStyle::Input);
            s.clear();
            s.append("bad", LineStyle::Error);
        });
        assert_eq!(out, "x\n\x1b[2J\x1b[H");
        assert_eq!(err, "\x1b[31mbad\x1b[0m\n");
    }

    #[test]
    /// 色無しでは clear は何も出力しない。
    fn terminal_sink_clear_without_color_is_silent() {
        let (out, _) = render(false, false, |s| s.clear());
        assert!(out.is_empty());
    }

    #[test]
    fn style_names() {
        assert_eq!(LineStyle::Input.as_str(), "input");
        assert_eq!(LineStyle::Success.as_str(), "success");
        assert_eq!(LineStyle::Error.as_str(), "error");
    }
}

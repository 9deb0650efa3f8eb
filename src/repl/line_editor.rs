// パス: src/repl/line_editor.rs
// 役割: 端末の Raw モードで 1 行を編集し、矢印キーを履歴閲覧へ結び付ける
// 意図: 外部クレートに頼らず最低限の行編集を提供し、非端末入力では素直に行読みへ戻る
// 関連ファイル: src/repl/cmd.rs, src/repl/driver.rs, src/repl/history.rs
use std::io::{self, BufRead, IsTerminal, Read, Write};

use super::driver::ReplDriver;
use super::session::{CompilerSession, EvalHost};
use super::sink::OutputSink;

/// 行入力が返す 3 種類の結果を表す列挙体。
pub enum ReadResult {
    Line(String),
    Eof,
    Interrupted,
}

/// ↑/↓ キーで辿る履歴の提供元。
pub trait HistoryBrowser {
    fn older(&mut self) -> Option<String>;
    fn newer(&mut self) -> Option<String>;
}

impl<C, H, S> HistoryBrowser for ReplDriver<C, H, S>
where
    C: CompilerSession,
    H: EvalHost,
    S: OutputSink,
{
    fn older(&mut self) -> Option<String> {
        ReplDriver::older(self).map(str::to_string)
    }

    fn newer(&mut self) -> Option<String> {
        ReplDriver::newer(self).map(str::to_string)
    }
}

/// 簡易ラインエディタ。標準入力が端末でなければ通常の行読みを行う。
pub struct LineEditor {
    #[cfg_attr(not(unix), allow(dead_code))]
    interactive: bool,
}

impl LineEditor {
    pub fn new() -> Self {
        Self {
            interactive: io::stdin().is_terminal(),
        }
    }

    /// プロンプトを出力し、1 行分の入力または制御シグナルを取得する。
    #[cfg(unix)]
    pub fn read_line(
        &mut self,
        prompt: &str,
        history: &mut dyn HistoryBrowser,
    ) -> io::Result<ReadResult> {
        if self.interactive {
            match RawMode::new() {
                Ok(raw) => return self.read_line_raw(raw, prompt, history),
                Err(e) => {
                    log::debug!("Raw モードに切り替えられません: {}", e);
                    self.interactive = false;
                }
            }
        }
        self.read_line_fallback(prompt)
    }

    /// Raw モードを持たない環境では常に行単位で読む。
    #[cfg(not(unix))]
    pub fn read_line(
        &mut self,
        prompt: &str,
        _history: &mut dyn HistoryBrowser,
    ) -> io::Result<ReadResult> {
        self.read_line_fallback(prompt)
    }

    fn read_line_fallback(&mut self, prompt: &str) -> io::Result<ReadResult> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;
        read_plain_line(&mut io::stdin().lock())
    }
}

/// 改行までを 1 行として読み、末尾の `\n` / `\r\n` を取り除く。
fn read_plain_line<R: BufRead>(reader: &mut R) -> io::Result<ReadResult> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(ReadResult::Eof);
    }
    let trimmed = line.strip_suffix('\n').unwrap_or(&line);
    let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
    Ok(ReadResult::Line(trimmed.to_string()))
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl LineEditor {
    fn read_line_raw(
        &mut self,
        _raw: RawMode,
        prompt: &str,
        history: &mut dyn HistoryBrowser,
    ) -> io::Result<ReadResult> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let mut stdin = io::stdin().lock();
        let mut line = LineBuffer::default();
        loop {
            let mut lead = [0u8; 1];
            if stdin.read(&mut lead)? == 0 {
                return Ok(ReadResult::Eof);
            }
            let redraw = match decode_key(lead[0], &mut stdin)? {
                Key::Enter => {
                    write!(stdout, "\r\n")?;
                    stdout.flush()?;
                    return Ok(ReadResult::Line(line.text));
                }
                Key::CtrlC => {
                    write!(stdout, "^C\r\n")?;
                    stdout.flush()?;
                    return Ok(ReadResult::Interrupted);
                }
                Key::CtrlD if line.text.is_empty() => {
                    write!(stdout, "\r\n")?;
                    stdout.flush()?;
                    return Ok(ReadResult::Eof);
                }
                Key::CtrlD | Key::Other => false,
                Key::Backspace => line.backspace(),
                Key::Left => line.left(),
                Key::Right => line.right(),
                Key::Up => line.load(history.older()),
                Key::Down => line.load(history.newer()),
                Key::Char(ch) => {
                    line.insert(ch);
                    true
                }
            };
            if redraw {
                redraw_line(&mut stdout, prompt, &line)?;
            }
        }
    }
}

/// 先頭バイトの上位ビットから UTF-8 の 1 文字分を読み足して復元する。
fn read_utf8_char<R: Read>(lead: u8, reader: &mut R) -> io::Result<Option<char>> {
    let width = match lead.leading_ones() {
        0 => 1,
        n @ 2..=4 => n as usize,
        _ => return Ok(None),
    };
    let mut bytes = [lead, 0, 0, 0];
    reader.read_exact(&mut bytes[1..width])?;
    let decoded = std::str::from_utf8(&bytes[..width]).ok();
    Ok(decoded.and_then(|s| s.chars().next()))
}

/// 1 回のキー入力 (エスケープシーケンスを含む) を解釈する。
fn decode_key<R: Read>(lead: u8, reader: &mut R) -> io::Result<Key> {
    let key = match lead {
        b'\r' | b'\n' => Key::Enter,
        0x03 => Key::CtrlC,
        0x04 => Key::CtrlD,
        0x08 | 0x7f => Key::Backspace,
        0x1b => {
            let mut csi = [0u8; 2];
            match reader.read_exact(&mut csi) {
                Ok(()) if csi[0] == b'[' => match csi[1] {
                    b'A' => Key::Up,
                    b'B' => Key::Down,
                    b'C' => Key::Right,
                    b'D' => Key::Left,
                    _ => Key::Other,
                },
                _ => Key::Other,
            }
        }
        _ => match read_utf8_char(lead, reader)? {
            Some(ch) if !ch.is_control() => Key::Char(ch),
            _ => Key::Other,
        },
    };
    Ok(key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Enter,
    CtrlC,
    CtrlD,
    Backspace,
    Left,
    Right,
    Up,
    Down,
    Char(char),
    Other,
}

/// 編集中の行。`cursor` は `text` 内の文字境界を指すバイト位置。
#[derive(Debug, Default)]
struct LineBuffer {
    text: String,
    cursor: usize,
}

impl LineBuffer {
    fn insert(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.text[..self.cursor].char_indices().next_back().map(|(i, _)| i)
    }

    fn backspace(&mut self) -> bool {
        let Some(prev) = self.prev_boundary() else {
            return false;
        };
        self.text.remove(prev);
        self.cursor = prev;
        true
    }

    fn left(&mut self) -> bool {
        match self.prev_boundary() {
            Some(prev) => {
                self.cursor = prev;
                true
            }
            None => false,
        }
    }

    fn right(&mut self) -> bool {
        match self.text[self.cursor..].chars().next() {
            Some(ch) => {
                self.cursor += ch.len_utf8();
                true
            }
            None => false,
        }
    }

    /// 履歴の選択結果で行を置き換え、カーソルを末尾へ置く。
    fn load(&mut self, entry: Option<String>) -> bool {
        let Some(entry) = entry else {
            return false;
        };
        self.cursor = entry.len();
        self.text = entry;
        true
    }

    /// カーソルより右にある文字数。
    fn chars_after_cursor(&self) -> usize {
        self.text[self.cursor..].chars().count()
    }
}

/// 行頭へ戻って行全体を書き直し、カーソルを編集位置へ戻す。
fn redraw_line<W: Write>(out: &mut W, prompt: &str, line: &LineBuffer) -> io::Result<()> {
    write!(out, "\r{}{}\x1b[K", prompt, line.text)?;
    match line.chars_after_cursor() {
        0 => {}
        n => write!(out, "\x1b[{}D", n)?,
    }
    out.flush()
}

/// 標準入力を Raw モードにし、破棄時に元の端末属性へ戻すガード。
#[cfg(unix)]
struct RawMode {
    saved: termios::Attrs,
}

#[cfg(unix)]
impl RawMode {
    fn new() -> io::Result<Self> {
        let saved = termios::get(termios::STDIN)?;
        let mut raw = saved;
        termios::make_raw(&mut raw);
        termios::set(termios::STDIN, &raw)?;
        Ok(Self { saved })
    }
}

#[cfg(unix)]
impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = termios::set(termios::STDIN, &self.saved) {
            log::warn!("端末属性を復元できません: {}", e);
        }
    }
}

/// libc の termios 関数への最小限のバインディング。
#[cfg(unix)]
mod termios {
    use std::io;

    pub(super) const STDIN: i32 = 0;
    const TCSANOW: i32 = 0;

    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "netbsd",
        target_os = "openbsd",
    ))]
    const NCCS: usize = 20;
    #[cfg(not(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "netbsd",
        target_os = "openbsd",
    )))]
    const NCCS: usize = 32;

    /// `struct termios` の C レイアウト。
    #[repr(C)]
    #[derive(Clone, Copy)]
    pub(super) struct Attrs {
        iflag: u32,
        oflag: u32,
        cflag: u32,
        lflag: u32,
        line: u8,
        cc: [u8; NCCS],
        ispeed: u32,
        ospeed: u32,
    }

    extern "C" {
        fn tcgetattr(fd: i32, termios: *mut Attrs) -> i32;
        fn tcsetattr(fd: i32, optional_actions: i32, termios: *const Attrs) -> i32;
        fn cfmakeraw(termios: *mut Attrs);
    }

    pub(super) fn get(fd: i32) -> io::Result<Attrs> {
        let mut attrs = Attrs {
            iflag: 0,
            oflag: 0,
            cflag: 0,
            lflag: 0,
            line: 0,
            cc: [0; NCCS],
            ispeed: 0,
            ospeed: 0,
        };
        // SAFETY: `attrs` は書き込み可能な termios 相当の領域。
        if unsafe { tcgetattr(fd, &mut attrs) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(attrs)
    }

    pub(super) fn set(fd: i32, attrs: &Attrs) -> io::Result<()> {
        // SAFETY: `attrs` は tcgetattr で得た値から作った有効な termios。
        if unsafe { tcsetattr(fd, TCSANOW, attrs) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(super) fn make_raw(attrs: &mut Attrs) {
        // SAFETY: cfmakeraw は渡された構造体のフラグを書き換えるだけ。
        unsafe { cfmakeraw(attrs) }
    }
}

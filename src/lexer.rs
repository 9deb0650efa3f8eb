// パス: src/lexer.rs
// 役割: ML 風ソースの字句解析器とトークン定義を提供する
// 意図: 構文解析に必要な位置付きトークンを生成する
// 関連ファイル: src/parser/mod.rs, src/errors.rs, tests/compiler.rs
//! 字句解析モジュール
//!
//! - ソースをトークン列へ変換する。コメントは `(* ... *)` で入れ子可能。
//! - タグは `` `Name `` の形で 1 トークンにまとめ、値にはバッククォートを含めない。
//! - すべてのトークンに行・列・バイト位置を記録し、診断情報と連携させる。

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::errors::LexerError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// 生成されたトークンとその位置情報を保持するレコード。
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub pos: usize,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// 字句解析で識別されるトークンの分類。
pub enum TokenKind {
    EOF,
    // 演算子・記号トークン
    ARROW,  // `->`
    ASSIGN, // `:=`
    LE,
    GE,
    EQ, // `==`
    NE, // `!=`
    LT,
    GT,
    PLUS,
    MINUS,
    STAR,
    SLASH,
    PERCENT,
    CARET,
    LPAREN,
    RPAREN,
    LBRACE,
    RBRACE,
    SEMI,
    EQUAL,
    BAR,
    DOT,
    BANG,
    UNDERSCORE,
    // リテラル・識別子
    TAG,
    STRING,
    NUMBER,
    IDENT,
    // キーワード
    LET,
    REC,
    AND,
    IN,
    FUN,
    IF,
    THEN,
    ELSE,
    MATCH,
    WITH,
    REF,
    TRUE,
    FALSE,
}

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    HashMap::from([
        ("let", TokenKind::LET),
        ("rec", TokenKind::REC),
        ("and", TokenKind::AND),
        ("in", TokenKind::IN),
        ("fun", TokenKind::FUN),
        ("if", TokenKind::IF),
        ("then", TokenKind::THEN),
        ("else", TokenKind::ELSE),
        ("match", TokenKind::MATCH),
        ("with", TokenKind::WITH),
        ("ref", TokenKind::REF),
        ("true", TokenKind::TRUE),
        ("false", TokenKind::FALSE),
    ])
});

/// 行頭オフセットを事前計算し、行・列情報を素早く算出するヘルパ。
pub(crate) struct LineMap {
    starts: Vec<usize>,
}

impl LineMap {
    pub(crate) fn new(src: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            src.char_indices()
                .filter(|(_, ch)| *ch == '\n')
                .map(|(idx, _)| idx + 1),
        );
        Self { starts }
    }

    /// 指定バイト位置の行番号と桁位置を返す。
    pub(crate) fn locate(&self, src: &str, pos: usize) -> (usize, usize) {
        let idx = match self.starts.binary_search(&pos) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        let start = self.starts[idx];
        let end = pos.min(src.len()).max(start);
        (idx + 1, src[start..end].chars().count() + 1)
    }

    /// 指定行に対応するテキスト断片を返す（改行は除去する）。
    pub(crate) fn line_text<'a>(&self, src: &'a str, line: usize) -> &'a str {
        let Some(&start) = line.checked_sub(1).and_then(|idx| self.starts.get(idx)) else {
            return "";
        };
        let end = self.starts.get(line).copied().unwrap_or(src.len());
        let slice = &src[start..end];
        slice.strip_suffix('\n').unwrap_or(slice)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_rest(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '\''
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Lexer<'a> {
    src: &'a str,
    cursor: usize,
    line_map: LineMap,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            cursor: 0,
            line_map: LineMap::new(src),
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexerError> {
        loop {
            self.consume_trivia()?;
            let Some(ch) = self.peek_char() else {
                break;
            };
            self.lex_token(ch)?;
        }
        self.push(TokenKind::EOF, self.src.len(), self.src.len());
        Ok(self.tokens)
    }

    fn consume_trivia(&mut self) -> Result<(), LexerError> {
        loop {
            while self.peek_char().is_some_and(char::is_whitespace) {
                self.advance_char();
            }
            if !self.starts_with("(*") {
                return Ok(());
            }
            self.consume_block_comment()?;
        }
    }

    fn consume_block_comment(&mut self) -> Result<(), LexerError> {
        let start = self.cursor;
        self.cursor += 2;
        let mut depth = 1usize;
        while self.cursor < self.src.len() {
            if self.starts_with("*)") {
                self.cursor += 2;
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            } else if self.starts_with("(*") {
                self.cursor += 2;
                depth += 1;
            } else {
                self.advance_char();
            }
        }
        Err(self.err("LEX001", "コメントが閉じていません", start))
    }

    fn lex_token(&mut self, ch: char) -> Result<(), LexerError> {
        let start = self.cursor;
        if self.lex_symbol(ch) {
            return Ok(());
        }
        match ch {
            '"' => self.lex_string(),
            '`' => self.lex_tag(),
            c if c.is_ascii_digit() => {
                self.lex_number();
                Ok(())
            }
            c if is_ident_start(c) => {
                self.lex_word();
                Ok(())
            }
            _ => Err(self.err("LEX090", format!("字句解析に失敗: {:?}", ch), start)),
        }
    }

    /// 記号トークンであれば消費して `true` を返す。
    fn lex_symbol(&mut self, first: char) -> bool {
        let second = self.src[self.cursor + first.len_utf8()..].chars().next();
        let double = match (first, second) {
            ('-', Some('>')) => Some(TokenKind::ARROW),
            (':', Some('=')) => Some(TokenKind::ASSIGN),
            ('<', Some('=')) => Some(TokenKind::LE),
            ('>', Some('=')) => Some(TokenKind::GE),
            ('=', Some('=')) => Some(TokenKind::EQ),
            ('!', Some('=')) => Some(TokenKind::NE),
            _ => None,
        };
        let start = self.cursor;
        if let Some(kind) = double {
            self.cursor += 2;
            self.push(kind, start, self.cursor);
            return true;
        }
        let single = match first {
            '<' => TokenKind::LT,
            '>' => TokenKind::GT,
            '+' => TokenKind::PLUS,
            '-' => TokenKind::MINUS,
            '*' => TokenKind::STAR,
            '/' => TokenKind::SLASH,
            '%' => TokenKind::PERCENT,
            '^' => TokenKind::CARET,
            '(' => TokenKind::LPAREN,
            ')' => TokenKind::RPAREN,
            '{' => TokenKind::LBRACE,
            '}' => TokenKind::RBRACE,
            ';' => TokenKind::SEMI,
            '=' => TokenKind::EQUAL,
            '|' => TokenKind::BAR,
            '.' => TokenKind::DOT,
            '!' => TokenKind::BANG,
            _ => return false,
        };
        self.cursor += 1;
        self.push(single, start, self.cursor);
        true
    }

    fn lex_string(&mut self) -> Result<(), LexerError> {
        let start = self.cursor;
        self.cursor += 1;
        let mut escaped = false;
        while let Some(ch) = self.advance_char() {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    self.push(TokenKind::STRING, start, self.cursor);
                    return Ok(());
                }
                '\n' => break,
                _ => {}
            }
        }
        Err(self.err("LEX003", "文字列リテラルが閉じていません", start))
    }

    fn lex_tag(&mut self) -> Result<(), LexerError> {
        let start = self.cursor;
        self.cursor += 1;
        let name_start = self.cursor;
        while self.peek_char().is_some_and(is_tag_char) {
            self.advance_char();
        }
        if self.cursor == name_start {
            return Err(self.err("LEX004", "タグ名がありません", start));
        }
        self.push_value(TokenKind::TAG, start, name_start, self.cursor);
        Ok(())
    }

    fn lex_number(&mut self) {
        let start = self.cursor;
        self.skip_digits();
        let mut rest = self.src[self.cursor..].chars();
        if rest.next() == Some('.') && rest.next().is_some_and(|c| c.is_ascii_digit()) {
            self.cursor += 1;
            self.skip_digits();
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let mut idx = self.cursor + 1;
            if matches!(self.src[idx..].chars().next(), Some('+' | '-')) {
                idx += 1;
            }
            if self.src[idx..].starts_with(|c: char| c.is_ascii_digit()) {
                self.cursor = idx;
                self.skip_digits();
            }
        }
        self.push(TokenKind::NUMBER, start, self.cursor);
    }

    fn lex_word(&mut self) {
        let start = self.cursor;
        while self.peek_char().is_some_and(is_ident_rest) {
            self.advance_char();
        }
        let word = &self.src[start..self.cursor];
        let kind = match KEYWORDS.get(word) {
            Some(kind) => *kind,
            None if word == "_" => TokenKind::UNDERSCORE,
            None => TokenKind::IDENT,
        };
        self.push(kind, start, self.cursor);
    }

    fn skip_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.cursor += 1;
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.push_value(kind, start, start, end);
    }

    fn push_value(&mut self, kind: TokenKind, start: usize, value_start: usize, end: usize) {
        let (line, col) = self.line_map.locate(self.src, start);
        self.tokens.push(Token {
            kind,
            value: self.src[value_start..end].to_string(),
            pos: start,
            line,
            col,
        });
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.cursor..].chars().next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.cursor += ch.len_utf8();
        Some(ch)
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.src[self.cursor..].starts_with(pattern)
    }

    fn err(&self, code: &'static str, message: impl Into<String>, pos: usize) -> LexerError {
        let (line, col) = self.line_map.locate(self.src, pos);
        LexerError::at(code, message, Some(pos), Some(line), Some(col))
            .with_snippet(self.line_map.line_text(self.src, line))
    }
}

pub fn lex(src: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::new(src).run()
}

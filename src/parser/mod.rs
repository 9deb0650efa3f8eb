// パス: src/parser/mod.rs
// 役割: トークン列から AST を生成する再帰下降パーサのエントリポイント
// 意図: 字句解析結果をコンパイラへ渡すためのモジュール構成を整理する
// 関連ファイル: src/parser/program.rs, src/parser/expr.rs, src/lexer.rs
//! 構文解析モジュール
//!
//! - 優先順位は `assign < cmp < add < mul < unary < app < postfix` の順でハンドコードする。
//! - `match` のアーム本体や `fun` の本体は可能な限り右へ伸ばす。
//! - 入れ子の深さに上限を設け、極端な入力でもスタックを使い切らない。

use crate::ast::{Expr, Script, Span};
use crate::errors::ParseError;
use crate::lexer::{lex, LineMap, Token, TokenKind};

mod expr;
mod program;

/// 式の入れ子の上限。
pub const MAX_NESTING: usize = 128;

pub struct Parser {
    ts: Vec<Token>,
    i: usize,
    depth: usize,
}

impl Parser {
    /// トークン列から新しいパーサインスタンスを構築する。末尾は EOF である必要がある。
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            ts: tokens,
            i: 0,
            depth: 0,
        }
    }

    pub(super) fn peek(&self) -> &Token {
        &self.ts[self.i.min(self.ts.len() - 1)]
    }

    pub(super) fn peek_kind(&self, offset: usize) -> TokenKind {
        self.ts
            .get(self.i + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::EOF)
    }

    pub(super) fn pop_any(&mut self) -> Token {
        let t = self.peek().clone();
        if self.i < self.ts.len() - 1 {
            self.i += 1;
        }
        t
    }

    pub(super) fn pop(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.peek().kind != kind {
            let t = self.peek();
            return Err(self.error_at(
                "PAR001",
                format!("{:?} を期待しましたが {:?} ({})", kind, t.kind, t.value),
            ));
        }
        Ok(self.pop_any())
    }

    pub(super) fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        (self.peek().kind == kind).then(|| self.pop_any())
    }

    /// 現在のトークン位置を指すエラーを生成する。
    pub(super) fn error_at(&self, code: &'static str, msg: impl Into<String>) -> ParseError {
        let t = self.peek();
        ParseError::at(code, msg, Some(t.pos), Some(t.line), Some(t.col))
    }

    pub(super) fn span(&self) -> Span {
        let t = self.peek();
        Span::new(t.pos, t.line, t.col)
    }

    /// 入れ子上限を監視しながら `f` を実行する。
    pub(super) fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_at("PAR400", "式の入れ子が深すぎます"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

/// 文字列リテラル（引用符付き）のエスケープを解除する。
pub(super) fn decode_string(quoted: &str) -> Result<String, ParseError> {
    let Some(body) = quoted
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return Err(ParseError::new("PAR201", "文字列リテラルが不正", None));
    };
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => return Err(ParseError::new("PAR202", "末尾のバックスラッシュ", None)),
        }
    }
    Ok(out)
}

/// エラー行のスニペットを付与する。
fn attach_snippet(src: &str, err: ParseError) -> ParseError {
    match (err.0.snippet.is_some(), err.0.line) {
        (false, Some(line)) => {
            let text = LineMap::new(src).line_text(src, line).to_string();
            err.with_snippet(text)
        }
        _ => err,
    }
}

/// `;` 区切りのスクリプト全体を解析する。
pub fn parse_script(src: &str) -> Result<Script, ParseError> {
    let ts = lex(src)?;
    Parser::new(ts)
        .parse_script()
        .map_err(|e| attach_snippet(src, e))
}

/// 単一の式を解析する。余分なトークンが残ればエラー。
pub fn parse_expr(src: &str) -> Result<Expr, ParseError> {
    let ts = lex(src)?;
    let mut p = Parser::new(ts);
    let run = |p: &mut Parser| {
        let e = p.parse_expr()?;
        if p.peek().kind != TokenKind::EOF {
            return Err(p.error_at("PAR090", "余分なトークンが残っています"));
        }
        Ok(e)
    };
    run(&mut p).map_err(|e| attach_snippet(src, e))
}

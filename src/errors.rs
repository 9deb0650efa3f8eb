// パス: src/errors.rs
// 役割: 位置情報付き診断 (ErrorInfo) と各フェーズのエラー型を定義する
// 意図: 字句・構文・コンパイル・評価のエラーを同一フォーマットで表示する
// 関連ファイル: src/lexer.rs, src/compiler/mod.rs, src/runtime/interp.rs
//! エラー型の定義（共通フォーマット: \[CODE\] メッセージ @line=L,col=C @pos=P）。

use std::fmt::{self, Display, Formatter, Write as _};

/// 1 件の診断。位置は分かる範囲で埋め、行と列はどちらも 1 始まり。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub msg: String,
    /// ソース先頭からのバイト位置。
    pub pos: Option<usize>,
    pub line: Option<usize>,
    pub col: Option<usize>,
    /// 診断箇所を含むソース行。列があればキャレットを添えて表示する。
    pub snippet: Option<String>,
}

impl ErrorInfo {
    pub fn new(code: &'static str, msg: impl Into<String>, pos: Option<usize>) -> Self {
        Self::at(code, msg, pos, None, None)
    }

    pub fn at(
        code: &'static str,
        msg: impl Into<String>,
        pos: Option<usize>,
        line: Option<usize>,
        col: Option<usize>,
    ) -> Self {
        ErrorInfo {
            code,
            msg: msg.into(),
            pos,
            line,
            col,
            snippet: None,
        }
    }

    pub fn with_snippet(self, snippet: impl Into<String>) -> Self {
        ErrorInfo {
            snippet: Some(snippet.into()),
            ..self
        }
    }

    /// ` @line=L,col=C` と ` @pos=P` の位置表記。行列は両方揃ったときだけ出す。
    fn location(&self) -> String {
        let mut out = String::new();
        if let (Some(line), Some(col)) = (self.line, self.col) {
            let _ = write!(out, " @line={},col={}", line, col);
        }
        if let Some(pos) = self.pos {
            let _ = write!(out, " @pos={}", pos);
        }
        out
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}{}", self.code, self.msg, self.location())?;
        match (&self.snippet, self.col) {
            (Some(text), Some(col)) => {
                write!(f, "\n{}\n{:>width$}", text, "^", width = col)
            }
            _ => Ok(()),
        }
    }
}

/// `ErrorInfo` を包むフェーズ別エラー型を生成する。
macro_rules! phase_error {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub ErrorInfo);

        impl $name {
            pub fn new(code: &'static str, msg: impl Into<String>, pos: Option<usize>) -> Self {
                Self(ErrorInfo::new(code, msg, pos))
            }

            pub fn at(
                code: &'static str,
                msg: impl Into<String>,
                pos: Option<usize>,
                line: Option<usize>,
                col: Option<usize>,
            ) -> Self {
                Self(ErrorInfo::at(code, msg, pos, line, col))
            }

            pub fn with_snippet(self, snippet: impl Into<String>) -> Self {
                Self(self.0.with_snippet(snippet))
            }

            /// 診断コード（例: `PAR001`）を返す。
            pub fn code(&self) -> &'static str {
                self.0.code
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl std::error::Error for $name {}
    };
}

phase_error!(
    /// 字句解析で発生したエラー。
    LexerError
);
phase_error!(
    /// 構文解析で発生したエラー。
    ParseError
);
phase_error!(
    /// スコープ解決などコンパイル段階で発生したエラー。
    CompileError
);
phase_error!(
    /// ターゲットコードの読込・実行中に発生したエラー。
    EvalError
);

impl From<LexerError> for ParseError {
    fn from(err: LexerError) -> Self {
        ParseError(err.0)
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorInfo, ParseError};

    #[test]
    /// 位置と行列が揃っている場合のヘッダ書式を確認する。
    fn display_with_line_col_and_pos() {
        let info = ErrorInfo::at("PAR001", "msg", Some(3), Some(1), Some(4));
        assert_eq!(info.to_string(), "[PAR001] msg @line=1,col=4 @pos=3");
    }

    #[test]
    /// スニペットが付くとキャレット行が追加されることを確かめる。
    fn display_with_snippet_draws_caret() {
        let err = ParseError::at("PAR001", "msg", None, Some(1), Some(3)).with_snippet("let x");
        assert_eq!(err.to_string(), "[PAR001] msg @line=1,col=3\nlet x\n  ^");
        assert_eq!(err.code(), "PAR001");
    }

    #[test]
    /// 位置情報が無いときはコードとメッセージのみになる。
    fn display_without_position() {
        assert_eq!(ErrorInfo::new("X", "y", None).to_string(), "[X] y");
    }
}

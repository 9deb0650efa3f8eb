// パス: src/runtime/reader.rs
// 役割: コンパイラが出力したターゲットコード (S 式テキスト) をデータへ読み込む
// 意図: 評価器が文字列操作ではなく構造化されたフォームを相手にできるようにする
// 関連ファイル: src/runtime/interp.rs, src/compiler/codegen.rs
//! S 式リーダー
//!
//! - 文字列リテラルは JSON 形式で、`serde_json` でデコードする。
//! - 入れ子はヒープ上のスタックで数え、`MAX_READ_DEPTH` を超える入力は拒否する。

use crate::errors::EvalError;

/// 読み込めるリストの入れ子の上限。
pub const MAX_READ_DEPTH: usize = 1024;

#[derive(Clone, Debug, PartialEq)]
pub enum Sexp {
    Atom(String),
    Str(String),
    List(Vec<Sexp>),
}

impl Sexp {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Sexp::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexp]> {
        match self {
            Sexp::List(items) => Some(items),
            _ => None,
        }
    }
}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '(' | ')' | '"')
}

/// テキスト全体をちょうど 1 つのデータとして読み込む。
pub fn read(src: &str) -> Result<Sexp, EvalError> {
    let mut stack: Vec<(usize, Vec<Sexp>)> = Vec::new();
    let mut result: Option<Sexp> = None;
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        if result.is_some() && stack.is_empty() {
            return Err(EvalError::new(
                "EVAL003",
                "ターゲットコードの末尾に余分なデータがあります",
                Some(pos),
            ));
        }
        let datum = match ch {
            '(' => {
                chars.next();
                if stack.len() >= MAX_READ_DEPTH {
                    return Err(EvalError::new(
                        "EVAL004",
                        "ターゲットコードの入れ子が深すぎます",
                        Some(pos),
                    ));
                }
                stack.push((pos, Vec::new()));
                continue;
            }
            ')' => {
                chars.next();
                let Some((_, items)) = stack.pop() else {
                    return Err(EvalError::new("EVAL001", "対応しない ')' があります", Some(pos)));
                };
                Sexp::List(items)
            }
            '"' => {
                let end = scan_string(src, pos)?;
                while matches!(chars.peek(), Some(&(i, _)) if i < end) {
                    chars.next();
                }
                let text: String = serde_json::from_str(&src[pos..end]).map_err(|e| {
                    EvalError::new("EVAL002", format!("文字列リテラルが不正: {}", e), Some(pos))
                })?;
                Sexp::Str(text)
            }
            _ => {
                let mut end = src.len();
                while let Some(&(i, c)) = chars.peek() {
                    if is_delimiter(c) {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                Sexp::Atom(src[pos..end].to_string())
            }
        };
        match stack.last_mut() {
            Some((_, items)) => items.push(datum),
            None => result = Some(datum),
        }
    }

    if let Some((open, _)) = stack.last() {
        return Err(EvalError::new("EVAL001", "リストが閉じられていません", Some(*open)));
    }
    result.ok_or_else(|| EvalError::new("EVAL001", "ターゲットコードが空です", Some(0)))
}

/// `start` の `"` に対応する閉じ引用符の直後のオフセットを返す。
fn scan_string(src: &str, start: usize) -> Result<usize, EvalError> {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(EvalError::new(
        "EVAL002",
        "文字列リテラルが閉じられていません",
        Some(start),
    ))
}

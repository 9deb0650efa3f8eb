// パス: src/ast.rs
// 役割: 構文解析結果を表す抽象構文木を定義する
// 意図: パーサとコンパイラ (スコープ解決・コード生成) の間で共有する中立表現を提供する
// 関連ファイル: src/parser/mod.rs, src/compiler/mod.rs, src/compiler/codegen.rs
//! 抽象構文木（AST）
//!
//! 設計ノート:
//! - 数値リテラルはすべて浮動小数として保持する。
//! - 単項マイナス・参照・デリファレンスは専用ノードとして残し、コード生成側で展開する。

/// ソース上の位置 (バイトオフセットと 1-origin の行列)。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
    pub pos: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(pos: usize, line: usize, col: usize) -> Self {
        Self { pos, line, col }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    /// ターゲットコード上の演算子表記。
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Concat => "^",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Self> {
        Some(match s {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Rem,
            "^" => BinOp::Concat,
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            _ => return None,
        })
    }
}

/// `let` / `let rec` の 1 束縛。
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

/// `match` の 1 アーム。`tag` が `None` のときはワイルドカード。
#[derive(Clone, Debug, PartialEq)]
pub struct MatchArm {
    pub tag: Option<String>,
    /// `None` は `_` による束縛なし。
    pub binder: Option<String>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Var {
        name: String,
        span: Span,
    },
    Number {
        value: f64,
    },
    Str {
        value: String,
    },
    Bool {
        value: bool,
    },
    Fun {
        param: String,
        body: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        arg: Box<Expr>,
    },
    Let {
        recursive: bool,
        bindings: Vec<Binding>,
        body: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Neg {
        expr: Box<Expr>,
    },
    Record {
        base: Option<Box<Expr>>,
        fields: Vec<(String, Expr)>,
        span: Span,
    },
    Field {
        expr: Box<Expr>,
        name: String,
    },
    Tag {
        tag: String,
        payload: Box<Expr>,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
        span: Span,
    },
    Ref {
        expr: Box<Expr>,
    },
    Deref {
        expr: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

/// スクリプトのトップレベル要素。
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    /// トップレベル定義。`recursive` なら束縛名が右辺から見える。
    Define {
        recursive: bool,
        bindings: Vec<Binding>,
    },
    Expr(Expr),
}

/// `;` で区切られたトップレベル要素の列。
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Script {
    pub items: Vec<Item>,
}

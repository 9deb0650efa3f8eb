// パス: src/parser/expr.rs
// 役割: 式解析に関する `Parser` 実装をまとめる
// 意図: 中置演算・タグ・レコード・match など式の文法を専用モジュールに切り分ける
// 関連ファイル: src/parser/program.rs, src/parser/mod.rs, src/ast.rs

use super::*;
use crate::ast::{BinOp, Binding, MatchArm};

impl Parser {
    pub(super) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.nested(|p| match p.peek().kind {
            TokenKind::FUN => p.parse_fun(),
            TokenKind::IF => p.parse_if(),
            TokenKind::LET => p.parse_let_in(),
            TokenKind::MATCH => p.parse_match(),
            _ => p.parse_assign(),
        })
    }

    /// `let [rec] x = e (and y = e)*` までを読み取る。
    pub(super) fn parse_let_head(&mut self) -> Result<(bool, Vec<Binding>), ParseError> {
        self.pop(TokenKind::LET)?;
        let recursive = self.accept(TokenKind::REC).is_some();
        let mut bindings = vec![self.parse_binding()?];
        while self.peek().kind == TokenKind::AND {
            if !recursive {
                return Err(self.error_at("PAR310", "and は let rec でのみ使用できます"));
            }
            self.pop_any();
            bindings.push(self.parse_binding()?);
        }
        Ok((recursive, bindings))
    }

    fn parse_binding(&mut self) -> Result<Binding, ParseError> {
        let span = self.span();
        let name = self.pop(TokenKind::IDENT)?.value;
        self.pop(TokenKind::EQUAL)?;
        let value = self.parse_expr()?;
        Ok(Binding { name, value, span })
    }

    fn parse_let_in(&mut self) -> Result<Expr, ParseError> {
        let (recursive, bindings) = self.parse_let_head()?;
        self.pop(TokenKind::IN)?;
        let body = self.parse_expr()?;
        Ok(Expr::Let {
            recursive,
            bindings,
            body: Box::new(body),
        })
    }

    /// `fun x y -> e` は `fun x -> fun y -> e` に展開する。
    fn parse_fun(&mut self) -> Result<Expr, ParseError> {
        self.pop(TokenKind::FUN)?;
        let mut params = Vec::new();
        while matches!(self.peek().kind, TokenKind::IDENT | TokenKind::UNDERSCORE) {
            params.push(self.pop_any().value);
        }
        if params.is_empty() {
            return Err(self.error_at("PAR320", "fun に引数がありません"));
        }
        self.pop(TokenKind::ARROW)?;
        let body = self.parse_expr()?;
        Ok(params
            .into_iter()
            .rev()
            .fold(body, |body, param| Expr::Fun {
                param,
                body: Box::new(body),
            }))
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        self.pop(TokenKind::IF)?;
        let cond = self.parse_expr()?;
        self.pop(TokenKind::THEN)?;
        let then_branch = self.parse_expr()?;
        self.pop(TokenKind::ELSE)?;
        let else_branch = self.parse_expr()?;
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_match(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        self.pop(TokenKind::MATCH)?;
        let scrutinee = self.parse_expr()?;
        self.pop(TokenKind::WITH)?;
        if self.peek().kind != TokenKind::BAR {
            return Err(self.error_at("PAR300", "match 式にアームが必要です"));
        }
        let mut arms = Vec::new();
        while self.accept(TokenKind::BAR).is_some() {
            arms.push(self.parse_arm()?);
        }
        Ok(Expr::Match {
            scrutinee: Box::new(scrutinee),
            arms,
            span,
        })
    }

    fn parse_arm(&mut self) -> Result<MatchArm, ParseError> {
        let span = self.span();
        let tag = self.accept(TokenKind::TAG).map(|t| t.value);
        let binder = match self.peek().kind {
            TokenKind::IDENT => Some(self.pop_any().value),
            TokenKind::UNDERSCORE => {
                self.pop_any();
                None
            }
            _ => return Err(self.error_at("PAR301", "パターンの束縛名が必要です")),
        };
        self.pop(TokenKind::ARROW)?;
        let body = self.parse_expr()?;
        Ok(MatchArm {
            tag,
            binder,
            body,
            span,
        })
    }

    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_cmp()?;
        if self.accept(TokenKind::ASSIGN).is_none() {
            return Ok(target);
        }
        let value = self.nested(Self::parse_assign)?;
        Ok(Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_cmp(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_add()?;
        let op = match self.peek().kind {
            TokenKind::LT => BinOp::Lt,
            TokenKind::LE => BinOp::Le,
            TokenKind::GT => BinOp::Gt,
            TokenKind::GE => BinOp::Ge,
            TokenKind::EQ => BinOp::Eq,
            TokenKind::NE => BinOp::Ne,
            _ => return Ok(left),
        };
        self.pop_any();
        let right = self.parse_add()?;
        Ok(binop(op, left, right))
    }

    fn parse_add(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::PLUS => BinOp::Add,
                TokenKind::MINUS => BinOp::Sub,
                TokenKind::CARET => BinOp::Concat,
                _ => return Ok(left),
            };
            self.pop_any();
            let right = self.parse_mul()?;
            left = binop(op, left, right);
        }
    }

    fn parse_mul(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::STAR => BinOp::Mul,
                TokenKind::SLASH => BinOp::Div,
                TokenKind::PERCENT => BinOp::Rem,
                _ => return Ok(left),
            };
            self.pop_any();
            let right = self.parse_unary()?;
            left = binop(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let wrap: fn(Box<Expr>) -> Expr = match self.peek().kind {
            TokenKind::MINUS => |expr| match *expr {
                Expr::Number { value } => Expr::Number { value: -value },
                other => Expr::Neg {
                    expr: Box::new(other),
                },
            },
            TokenKind::BANG => |expr| Expr::Deref { expr },
            TokenKind::REF => |expr| Expr::Ref { expr },
            _ => return self.parse_app(),
        };
        self.pop_any();
        let operand = self.nested(Self::parse_unary)?;
        Ok(wrap(Box::new(operand)))
    }

    /// 関数適用。先頭がタグ式の場合は適用を続けない。
    fn parse_app(&mut self) -> Result<Expr, ParseError> {
        if self.peek().kind == TokenKind::TAG {
            return self.parse_tagged();
        }
        let mut func = self.parse_postfix()?;
        while Self::starts_operand(self.peek().kind) {
            let arg = self.parse_operand()?;
            func = Expr::Call {
                func: Box::new(func),
                arg: Box::new(arg),
            };
        }
        Ok(func)
    }

    fn starts_operand(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::NUMBER
                | TokenKind::STRING
                | TokenKind::TRUE
                | TokenKind::FALSE
                | TokenKind::IDENT
                | TokenKind::LPAREN
                | TokenKind::LBRACE
                | TokenKind::TAG
        )
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        if self.peek().kind == TokenKind::TAG {
            self.parse_tagged()
        } else {
            self.parse_postfix()
        }
    }

    /// `` `Tag payload ``。ペイロードは別のタグ式か後置式。
    fn parse_tagged(&mut self) -> Result<Expr, ParseError> {
        let tag = self.pop(TokenKind::TAG)?.value;
        if !Self::starts_operand(self.peek().kind) {
            return Err(self.error_at("PAR330", format!("タグ `{} にペイロードが必要です", tag)));
        }
        let payload = self.nested(Self::parse_operand)?;
        Ok(Expr::Tag {
            tag,
            payload: Box::new(payload),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;
        while self.accept(TokenKind::DOT).is_some() {
            let name = self.pop(TokenKind::IDENT)?.value;
            expr = Expr::Field {
                expr: Box::new(expr),
                name,
            };
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::NUMBER => {
                self.pop_any();
                let value = t.value.parse::<f64>().map_err(|_| {
                    ParseError::at(
                        "PAR210",
                        format!("数値リテラルが不正: {}", t.value),
                        Some(t.pos),
                        Some(t.line),
                        Some(t.col),
                    )
                })?;
                Ok(Expr::Number { value })
            }
            TokenKind::STRING => {
                self.pop_any();
                Ok(Expr::Str {
                    value: decode_string(&t.value)?,
                })
            }
            TokenKind::TRUE | TokenKind::FALSE => {
                self.pop_any();
                Ok(Expr::Bool {
                    value: t.kind == TokenKind::TRUE,
                })
            }
            TokenKind::IDENT => {
                self.pop_any();
                Ok(Expr::Var {
                    name: t.value,
                    span: Span::new(t.pos, t.line, t.col),
                })
            }
            TokenKind::LPAREN => {
                self.pop_any();
                let inner = self.parse_expr()?;
                self.pop(TokenKind::RPAREN)?;
                Ok(inner)
            }
            TokenKind::LBRACE => self.nested(Self::parse_record),
            _ => Err(self.error_at(
                "PAR002",
                format!("式を期待しましたが {:?} ({})", t.kind, t.value),
            )),
        }
    }

    /// `{}` / `{a=e; b=e}` / `{base | a=e}`。
    fn parse_record(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        self.pop(TokenKind::LBRACE)?;
        let starts_field =
            |p: &Self| p.peek().kind == TokenKind::IDENT && p.peek_kind(1) == TokenKind::EQUAL;
        let base = if self.peek().kind != TokenKind::RBRACE && !starts_field(self) {
            let base = self.parse_expr()?;
            self.pop(TokenKind::BAR)?;
            Some(Box::new(base))
        } else {
            None
        };
        let mut fields = Vec::new();
        while self.peek().kind != TokenKind::RBRACE {
            let name = self.pop(TokenKind::IDENT)?.value;
            self.pop(TokenKind::EQUAL)?;
            let value = self.parse_expr()?;
            fields.push((name, value));
            if self.accept(TokenKind::SEMI).is_none() {
                break;
            }
        }
        self.pop(TokenKind::RBRACE)?;
        Ok(Expr::Record { base, fields, span })
    }
}

fn binop(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::BinOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// パス: src/parser/program.rs
// 役割: `;` 区切りのトップレベル要素 (定義と式) を解析する
// 意図: REPL 1 行分とエディタ全体のどちらも同じスクリプト文法で扱えるようにする
// 関連ファイル: src/parser/expr.rs, src/parser/mod.rs, src/compiler/mod.rs

use super::*;
use crate::ast::Item;

impl Parser {
    pub fn parse_script(&mut self) -> Result<Script, ParseError> {
        let mut items = Vec::new();
        loop {
            while self.accept(TokenKind::SEMI).is_some() {}
            if self.peek().kind == TokenKind::EOF {
                break;
            }
            items.push(self.parse_item()?);
            if self.accept(TokenKind::SEMI).is_none() {
                if self.peek().kind != TokenKind::EOF {
                    let t = self.peek();
                    return Err(self.error_at(
                        "PAR090",
                        format!("; か入力終端を期待しましたが {:?} ({})", t.kind, t.value),
                    ));
                }
                break;
            }
        }
        Ok(Script { items })
    }

    /// トップレベルの `let` は `in` が続けば式、続かなければ定義として扱う。
    fn parse_item(&mut self) -> Result<Item, ParseError> {
        if self.peek().kind != TokenKind::LET {
            return Ok(Item::Expr(self.parse_expr()?));
        }
        let (recursive, bindings) = self.nested(Self::parse_let_head)?;
        if self.accept(TokenKind::IN).is_none() {
            return Ok(Item::Define {
                recursive,
                bindings,
            });
        }
        let body = self.parse_expr()?;
        Ok(Item::Expr(Expr::Let {
            recursive,
            bindings,
            body: Box::new(body),
        }))
    }
}

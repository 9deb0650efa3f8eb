// パス: src/compiler/resolve.rs
// 役割: 変数のスコープ解決とレコード・match の静的検査
// 意図: コード生成の前に名前の未定義や重複を位置付き診断として報告する
// 関連ファイル: src/compiler/mod.rs, src/compiler/codegen.rs, src/ast.rs

use std::collections::{HashMap, HashSet};

use crate::ast::{Expr, Item, MatchArm, Script, Span};
use crate::errors::CompileError;

fn error_at(code: &'static str, msg: String, span: Span) -> CompileError {
    CompileError::at(code, msg, Some(span.pos), Some(span.line), Some(span.col))
}

/// スクリプトを検査する。`committed` はセッションで確定済みのトップレベル名。
pub(super) fn check_script(
    script: &Script,
    committed: &HashMap<String, String>,
) -> Result<(), CompileError> {
    let mut r = Resolver {
        committed,
        defined: HashSet::new(),
        locals: Vec::new(),
    };
    for item in &script.items {
        match item {
            Item::Define {
                recursive: true,
                bindings,
            } => {
                r.defined
                    .extend(bindings.iter().map(|b| b.name.clone()));
                for b in bindings {
                    r.expr(&b.value)?;
                }
            }
            Item::Define { bindings, .. } => {
                for b in bindings {
                    r.expr(&b.value)?;
                    r.defined.insert(b.name.clone());
                }
            }
            Item::Expr(e) => r.expr(e)?,
        }
    }
    Ok(())
}

struct Resolver<'a> {
    committed: &'a HashMap<String, String>,
    /// このスクリプト内で新たに定義されたトップレベル名。
    defined: HashSet<String>,
    locals: Vec<String>,
}

impl Resolver<'_> {
    fn is_bound(&self, name: &str) -> bool {
        self.locals.iter().any(|l| l == name)
            || self.defined.contains(name)
            || self.committed.contains_key(name)
    }

    /// `names` をローカルに積んだ状態で `f` を実行する。
    fn scoped<'n>(
        &mut self,
        names: impl IntoIterator<Item = &'n str>,
        f: impl FnOnce(&mut Self) -> Result<(), CompileError>,
    ) -> Result<(), CompileError> {
        let depth = self.locals.len();
        self.locals.extend(names.into_iter().map(str::to_string));
        let result = f(self);
        self.locals.truncate(depth);
        result
    }

    fn expr(&mut self, e: &Expr) -> Result<(), CompileError> {
        match e {
            Expr::Var { name, span } => {
                if self.is_bound(name) {
                    Ok(())
                } else {
                    Err(error_at(
                        "CMP001",
                        format!("未定義の変数です: {}", name),
                        *span,
                    ))
                }
            }
            Expr::Number { .. } | Expr::Str { .. } | Expr::Bool { .. } => Ok(()),
            Expr::Fun { param, body } => self.scoped([param.as_str()], |r| r.expr(body)),
            Expr::Call { func, arg } => {
                self.expr(func)?;
                self.expr(arg)
            }
            Expr::Let {
                recursive,
                bindings,
                body,
            } => {
                let names: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();
                if *recursive {
                    self.scoped(names, |r| {
                        for b in bindings {
                            r.expr(&b.value)?;
                        }
                        r.expr(body)
                    })
                } else {
                    for b in bindings {
                        self.expr(&b.value)?;
                    }
                    self.scoped(names, |r| r.expr(body))
                }
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond)?;
                self.expr(then_branch)?;
                self.expr(else_branch)
            }
            Expr::BinOp { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            Expr::Neg { expr }
            | Expr::Ref { expr }
            | Expr::Deref { expr }
            | Expr::Field { expr, .. }
            | Expr::Tag { payload: expr, .. } => self.expr(expr),
            Expr::Record { base, fields, span } => {
                if let Some(base) = base {
                    self.expr(base)?;
                }
                let mut seen = HashSet::new();
                for (name, value) in fields {
                    if !seen.insert(name.as_str()) {
                        return Err(error_at(
                            "CMP002",
                            format!("レコードのフィールドが重複しています: {}", name),
                            *span,
                        ));
                    }
                    self.expr(value)?;
                }
                Ok(())
            }
            Expr::Match {
                scrutinee, arms, ..
            } => {
                self.expr(scrutinee)?;
                check_arms(arms)?;
                for arm in arms {
                    self.scoped(arm.binder.as_deref(), |r| r.expr(&arm.body))?;
                }
                Ok(())
            }
            Expr::Assign { target, value } => {
                self.expr(target)?;
                self.expr(value)
            }
        }
    }
}

/// タグの重複とワイルドカードの位置を検査する。
fn check_arms(arms: &[MatchArm]) -> Result<(), CompileError> {
    let mut tags = HashSet::new();
    let mut wildcard = false;
    for arm in arms {
        if wildcard {
            return Err(error_at(
                "CMP004",
                "ワイルドカードのアームは最後に 1 つだけ置けます".to_string(),
                arm.span,
            ));
        }
        match &arm.tag {
            Some(tag) if !tags.insert(tag.as_str()) => {
                return Err(error_at(
                    "CMP003",
                    format!("match のタグが重複しています: `{}", tag),
                    arm.span,
                ))
            }
            Some(_) => {}
            None => wildcard = true,
        }
    }
    Ok(())
}

// パス: src/compiler/codegen.rs
// 役割: 検査済みの AST をターゲットの S 式テキストへ変換する
// 意図: トップレベル名へ一意なグローバルスロットを割り当て、評価ホストが読める形で出力する
// 関連ファイル: src/compiler/mod.rs, src/compiler/resolve.rs, src/runtime/interp.rs
//! コード生成
//!
//! - 出力は `seq item1 item2 ...` で、外側の括弧は呼び出し側が付ける。
//! - トップレベルの束縛は `name$N` 形式のスロットへ割り当て、後からの再定義は別スロットになる。

use std::collections::HashMap;

use crate::ast::{Binding, Expr, Item, Script};
use crate::repl::session::InternalCompilerError;

pub(super) struct Emitter {
    globals: HashMap<String, String>,
    next_slot: usize,
    locals: Vec<String>,
    out: String,
}

impl Emitter {
    pub(super) fn new(globals: HashMap<String, String>, next_slot: usize) -> Self {
        Self {
            globals,
            next_slot,
            locals: Vec::new(),
            out: String::new(),
        }
    }

    /// 生成後のトップレベルスコープとスロット番号を返す。
    pub(super) fn into_scope(self) -> (HashMap<String, String>, usize) {
        (self.globals, self.next_slot)
    }

    pub(super) fn emit_script(&mut self, script: &Script) -> Result<String, InternalCompilerError> {
        self.out.clear();
        self.out.push_str("seq");
        for item in &script.items {
            match item {
                Item::Define {
                    recursive: true,
                    bindings,
                } => {
                    let slots: Vec<String> = bindings.iter().map(|b| self.bind_global(b)).collect();
                    for (b, slot) in bindings.iter().zip(&slots) {
                        self.define(slot, &b.value)?;
                    }
                }
                Item::Define { bindings, .. } => {
                    for b in bindings {
                        let slot = self.alloc_slot(&b.name);
                        self.define(&slot, &b.value)?;
                        self.globals.insert(b.name.clone(), slot);
                    }
                }
                Item::Expr(e) => {
                    self.out.push(' ');
                    self.expr(e)?;
                }
            }
        }
        Ok(std::mem::take(&mut self.out))
    }

    fn alloc_slot(&mut self, name: &str) -> String {
        let slot = format!("{}${}", name, self.next_slot);
        self.next_slot += 1;
        slot
    }

    fn bind_global(&mut self, b: &Binding) -> String {
        let slot = self.alloc_slot(&b.name);
        self.globals.insert(b.name.clone(), slot.clone());
        slot
    }

    fn define(&mut self, slot: &str, value: &Expr) -> Result<(), InternalCompilerError> {
        self.out.push_str(" (define ");
        self.out.push_str(slot);
        self.out.push(' ');
        self.expr(value)?;
        self.out.push(')');
        Ok(())
    }

    fn var(&mut self, name: &str) -> Result<(), InternalCompilerError> {
        if self.locals.iter().any(|l| l == name) {
            self.out.push_str(&format!("(local {})", name));
            return Ok(());
        }
        let slot = self.globals.get(name).ok_or_else(|| {
            InternalCompilerError::new(format!("解決されていない名前です: {}", name))
        })?;
        self.out.push_str(&format!("(global {})", slot));
        Ok(())
    }

    /// `(head a b ...)` を出力する。各要素は `parts` の順に生成する。
    fn form(&mut self, head: &str, parts: &[&Expr]) -> Result<(), InternalCompilerError> {
        self.out.push('(');
        self.out.push_str(head);
        for p in parts {
            self.out.push(' ');
            self.expr(p)?;
        }
        self.out.push(')');
        Ok(())
    }

    fn with_locals<'n>(
        &mut self,
        names: impl IntoIterator<Item = &'n str>,
        f: impl FnOnce(&mut Self) -> Result<(), InternalCompilerError>,
    ) -> Result<(), InternalCompilerError> {
        let depth = self.locals.len();
        self.locals.extend(names.into_iter().map(str::to_string));
        let result = f(self);
        self.locals.truncate(depth);
        result
    }

    fn fields(&mut self, fields: &[(String, Expr)]) -> Result<(), InternalCompilerError> {
        for (name, value) in fields {
            self.out.push_str(" (");
            self.out.push_str(name);
            self.out.push(' ');
            self.expr(value)?;
            self.out.push(')');
        }
        Ok(())
    }

    fn expr(&mut self, e: &Expr) -> Result<(), InternalCompilerError> {
        match e {
            Expr::Var { name, .. } => self.var(name)?,
            Expr::Number { value } => self.out.push_str(&format!("{:?}", value)),
            Expr::Str { value } => {
                let quoted = serde_json::to_string(value)
                    .map_err(|e| InternalCompilerError::new(e.to_string()))?;
                self.out.push_str(&quoted);
            }
            Expr::Bool { value } => self.out.push_str(if *value { "true" } else { "false" }),
            Expr::Fun { param, body } => {
                self.out.push_str(&format!("(fun {} ", param));
                self.with_locals([param.as_str()], |g| g.expr(body))?;
                self.out.push(')');
            }
            Expr::Call { func, arg } => self.form("call", &[func, arg])?,
            Expr::Let {
                recursive: false,
                bindings,
                body,
            } => {
                for b in bindings {
                    self.out.push_str(&format!("(let {} ", b.name));
                    self.expr(&b.value)?;
                    self.out.push(' ');
                }
                let names = bindings.iter().map(|b| b.name.as_str());
                self.with_locals(names, |g| g.expr(body))?;
                for _ in bindings {
                    self.out.push(')');
                }
            }
            Expr::Let { bindings, body, .. } => {
                let names = bindings.iter().map(|b| b.name.as_str());
                self.with_locals(names, |g| {
                    g.out.push_str("(letrec (");
                    for (i, b) in bindings.iter().enumerate() {
                        if i > 0 {
                            g.out.push(' ');
                        }
                        g.out.push_str(&format!("({} ", b.name));
                        g.expr(&b.value)?;
                        g.out.push(')');
                    }
                    g.out.push_str(") ");
                    g.expr(body)?;
                    g.out.push(')');
                    Ok(())
                })?;
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => self.form("if", &[cond, then_branch, else_branch])?,
            Expr::BinOp { op, left, right } => {
                self.form(&format!("op {}", op.symbol()), &[left, right])?
            }
            Expr::Neg { expr } => self.form("neg", &[expr])?,
            Expr::Record { base: None, fields, .. } => {
                self.out.push_str("(record");
                self.fields(fields)?;
                self.out.push(')');
            }
            Expr::Record {
                base: Some(base),
                fields,
                ..
            } => {
                self.out.push_str("(extend ");
                self.expr(base)?;
                self.fields(fields)?;
                self.out.push(')');
            }
            Expr::Field { expr, name } => {
                self.out.push_str("(field ");
                self.expr(expr)?;
                self.out.push_str(&format!(" {})", name));
            }
            Expr::Tag { tag, payload } => self.form(&format!("tag {}", tag), &[payload])?,
            Expr::Match {
                scrutinee, arms, ..
            } => {
                self.out.push_str("(match ");
                self.expr(scrutinee)?;
                for arm in arms {
                    let binder = arm.binder.as_deref().unwrap_or("_");
                    match &arm.tag {
                        Some(tag) => self.out.push_str(&format!(" (case {} {} ", tag, binder)),
                        None => self.out.push_str(&format!(" (else {} ", binder)),
                    }
                    self.with_locals(arm.binder.as_deref(), |g| g.expr(&arm.body))?;
                    self.out.push(')');
                }
                self.out.push(')');
            }
            Expr::Ref { expr } => self.form("ref", &[expr])?,
            Expr::Deref { expr } => self.form("deref", &[expr])?,
            Expr::Assign { target, value } => self.form("assign", &[target, value])?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::Emitter;
    use crate::ast::{Expr, Item, Script, Span};
    use crate::parser::parse_script;

    fn emit(src: &str) -> String {
        let script = parse_script(src).unwrap();
        Emitter::new(HashMap::new(), 0)
            .emit_script(&script)
            .unwrap()
    }

    #[test]
    fn literals_and_operators() {
        assert_eq!(emit("1 + 2 * 3"), "seq (op + 1.0 (op * 2.0 3.0))");
        assert_eq!(emit("\"a\\\"b\" ^ \"c\""), r#"seq (op ^ "a\"b" "c")"#);
        assert_eq!(emit("-(1.5)"), "seq (neg 1.5)");
        assert_eq!(emit("true"), "seq true");
    }

    #[test]
    /// 再定義は新しいスロットを得て、右辺は以前のスロットを参照する。
    fn redefinition_gets_a_fresh_slot() {
        assert_eq!(
            emit("let x = 1; let x = x + 1; x"),
            "seq (define x$0 1.0) (define x$1 (op + (global x$0) 1.0)) (global x$1)"
        );
    }

    #[test]
    /// 再帰定義は本体を生成する前にスロットが見える。
    fn recursive_definitions_see_their_slots() {
        assert_eq!(
            emit("let rec f = fun n -> f n and g = fun m -> f m"),
            "seq (define f$0 (fun n (call (global f$0) (local n)))) \
             (define g$1 (fun m (call (global f$0) (local m))))"
        );
    }

    #[test]
    /// ローカル束縛がグローバルを隠す。
    fn locals_shadow_globals() {
        assert_eq!(
            emit("let x = 1; let y = fun x -> x in y x"),
            "seq (define x$0 1.0) (let y (fun x (local x)) (call (local y) (global x$0)))"
        );
    }

    #[test]
    fn records_variants_and_refs() {
        assert_eq!(
            emit("let r = {a = 1} in {r | b = r.a}"),
            "seq (let r (record (a 1.0)) (extend (local r) (b (field (local r) a))))"
        );
        assert_eq!(emit("{}"), "seq (record)");
        assert_eq!(
            emit("let c = ref 0 in c := !c + 1"),
            "seq (let c (ref 0.0) (assign (local c) (op + (deref (local c)) 1.0)))"
        );
        assert_eq!(
            emit("match `Some 1 with | `Some v -> v | `None _ -> 0 | other -> other"),
            "seq (match (tag Some 1.0) (case Some v (local v)) (case None _ 0.0) \
             (else other (local other)))"
        );
    }

    #[test]
    fn letrec_expression() {
        assert_eq!(
            emit("let rec loop = fun n -> if n <= 0 then 0 else loop (n - 1) in loop 3"),
            "seq (letrec ((loop (fun n (if (op <= (local n) 0.0) 0.0 \
             (call (local loop) (op - (local n) 1.0)))))) (call (local loop) 3.0))"
        );
    }

    #[test]
    /// 解決されていない名前は内部エラーになる。
    fn unresolved_name_is_internal_error() {
        let script = Script {
            items: vec![Item::Expr(Expr::Var {
                name: "ghost".into(),
                span: Span::default(),
            })],
        };
        let err = Emitter::new(HashMap::new(), 0)
            .emit_script(&script)
            .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    /// スロット番号は生成をまたいで引き継がれる。
    fn slot_counter_continues() {
        let script = parse_script("let a = 1").unwrap();
        let mut g = Emitter::new(HashMap::new(), 7);
        assert_eq!(g.emit_script(&script).unwrap(), "seq (define a$7 1.0)");
        let (globals, next) = g.into_scope();
        assert_eq!(globals.get("a").map(String::as_str), Some("a$7"));
        assert_eq!(next, 8);
    }
}

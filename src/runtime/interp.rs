// パス: src/runtime/interp.rs
// 役割: ターゲットコードを実行する参照実装の評価ホスト
// 意図: REPL が外部ランタイムなしでコンパイル結果を評価できるようにする
// 関連ファイル: src/runtime/reader.rs, src/runtime/value.rs, src/compiler/codegen.rs
//! 評価器
//!
//! - 読み込んだ S 式を一度 `Node` 木へ下ろしてから解釈する。
//! - ローカル環境は `Rc` で連結したフレーム列。`letrec` はフレームを先に作り後から値を埋める。
//! - グローバルはホストの生存期間中保持される。
//! - 評価の各段は `stacker::maybe_grow` を通し、残りが少なければスタックを継ぎ足す。
//!   深さそのものは `max_depth` で打ち切り、EVAL090 として報告する。
//! - クロージャ表はホストの生存期間中追記のみで、解放しない。

use super::reader::{read, Sexp};
use super::value::{FuncId, Heap, Object, Value};
use crate::ast::BinOp;
use crate::errors::EvalError;
use crate::repl::session::EvalHost;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// 評価の入れ子の既定上限。
pub const DEFAULT_MAX_DEPTH: usize = 20_000;

/// 残りスタックがこれを下回ったら継ぎ足す。
const STACK_RED_ZONE: usize = 128 * 1024;
/// 1 回に継ぎ足すスタックの大きさ。
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug)]
enum Node {
    Const(Value),
    Global(String),
    Local(String),
    Define(String, Box<Node>),
    Seq(Vec<Node>),
    Fun(Rc<FunDef>),
    Call(Box<Node>, Box<Node>),
    Let(String, Box<Node>, Box<Node>),
    LetRec(Vec<(String, Node)>, Box<Node>),
    If(Box<Node>, Box<Node>, Box<Node>),
    Op(BinOp, Box<Node>, Box<Node>),
    Neg(Box<Node>),
    Record(Vec<(String, Node)>),
    Extend(Box<Node>, Vec<(String, Node)>),
    Field(Box<Node>, String),
    Tag(String, Box<Node>),
    Match {
        scrutinee: Box<Node>,
        cases: Vec<(String, Case)>,
        fallback: Option<Box<Case>>,
    },
    Ref(Box<Node>),
    Deref(Box<Node>),
    Assign(Box<Node>, Box<Node>),
}

#[derive(Debug)]
struct FunDef {
    param: String,
    body: Node,
}

#[derive(Debug)]
struct Case {
    binder: Option<String>,
    body: Node,
}

struct Frame {
    name: String,
    value: RefCell<Value>,
    parent: Env,
}

type Env = Option<Rc<Frame>>;

fn bind(env: &Env, name: &str, value: Value) -> Env {
    Some(Rc::new(Frame {
        name: name.to_string(),
        value: RefCell::new(value),
        parent: env.clone(),
    }))
}

fn lookup(env: &Env, name: &str) -> Option<Value> {
    let mut cur = env.as_ref();
    while let Some(frame) = cur {
        if frame.name == name {
            return Some(frame.value.borrow().clone());
        }
        cur = frame.parent.as_ref();
    }
    None
}

#[derive(Clone)]
struct Closure {
    def: Rc<FunDef>,
    env: Env,
}

fn malformed(form: &str) -> EvalError {
    EvalError::new("EVAL005", format!("フォームの形が不正です: {}", form), None)
}

fn atom(s: &Sexp, form: &str) -> Result<String, EvalError> {
    s.as_atom()
        .map(str::to_string)
        .ok_or_else(|| malformed(form))
}

fn boxed(s: &Sexp) -> Result<Box<Node>, EvalError> {
    lower(s).map(Box::new)
}

/// `(name expr)` の組を読む。
fn pair(s: &Sexp, form: &str) -> Result<(String, Node), EvalError> {
    match s.as_list() {
        Some([name, expr]) => Ok((atom(name, form)?, lower(expr)?)),
        _ => Err(malformed(form)),
    }
}

fn pairs(items: &[Sexp], form: &str) -> Result<Vec<(String, Node)>, EvalError> {
    items.iter().map(|s| pair(s, form)).collect()
}

fn lower(sexp: &Sexp) -> Result<Node, EvalError> {
    match sexp {
        Sexp::Str(text) => Ok(Node::Const(Value::str(text))),
        Sexp::Atom(a) => lower_atom(a),
        Sexp::List(items) => {
            let Some((head, args)) = items.split_first() else {
                return Err(malformed("()"));
            };
            let Some(form) = head.as_atom() else {
                return Err(malformed("リストの先頭がアトムではありません"));
            };
            lower_form(form, args)
        }
    }
}

fn lower_atom(a: &str) -> Result<Node, EvalError> {
    let value = match a {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        "undefined" => Value::Undefined,
        _ => match a.parse::<f64>() {
            Ok(n) => Value::Float(n),
            Err(_) => {
                return Err(EvalError::new(
                    "EVAL006",
                    format!("不明なアトムです: {}", a),
                    None,
                ))
            }
        },
    };
    Ok(Node::Const(value))
}

fn lower_form(form: &str, args: &[Sexp]) -> Result<Node, EvalError> {
    let node = match (form, args) {
        ("global", [name]) => Node::Global(atom(name, form)?),
        ("local", [name]) => Node::Local(atom(name, form)?),
        ("define", [name, e]) => Node::Define(atom(name, form)?, boxed(e)?),
        ("seq", items) => Node::Seq(items.iter().map(lower).collect::<Result<_, _>>()?),
        ("fun", [param, body]) => Node::Fun(Rc::new(FunDef {
            param: atom(param, form)?,
            body: lower(body)?,
        })),
        ("call", [f, a]) => Node::Call(boxed(f)?, boxed(a)?),
        ("let", [name, e, body]) => Node::Let(atom(name, form)?, boxed(e)?, boxed(body)?),
        ("letrec", [Sexp::List(bindings), body]) => {
            Node::LetRec(pairs(bindings, form)?, boxed(body)?)
        }
        ("if", [c, t, e]) => Node::If(boxed(c)?, boxed(t)?, boxed(e)?),
        ("op", [op, l, r]) => {
            let sym = atom(op, form)?;
            let op = BinOp::from_symbol(&sym).ok_or_else(|| {
                EvalError::new("EVAL005", format!("不明な演算子です: {}", sym), None)
            })?;
            Node::Op(op, boxed(l)?, boxed(r)?)
        }
        ("neg", [e]) => Node::Neg(boxed(e)?),
        ("record", fields) => Node::Record(pairs(fields, form)?),
        ("extend", [base, fields @ ..]) => Node::Extend(boxed(base)?, pairs(fields, form)?),
        ("field", [e, name]) => Node::Field(boxed(e)?, atom(name, form)?),
        ("tag", [tag, e]) => Node::Tag(atom(tag, form)?, boxed(e)?),
        ("match", [scrutinee, arms @ ..]) => lower_match(scrutinee, arms)?,
        ("ref", [e]) => Node::Ref(boxed(e)?),
        ("deref", [e]) => Node::Deref(boxed(e)?),
        ("assign", [r, e]) => Node::Assign(boxed(r)?, boxed(e)?),
        _ => return Err(malformed(form)),
    };
    Ok(node)
}

fn lower_match(scrutinee: &Sexp, arms: &[Sexp]) -> Result<Node, EvalError> {
    let mut cases = Vec::new();
    let mut fallback = None;
    for arm in arms {
        let lower_case = |binder: &Sexp, body: &Sexp| -> Result<Case, EvalError> {
            let binder = atom(binder, "match")?;
            Ok(Case {
                binder: (binder != "_").then_some(binder),
                body: lower(body)?,
            })
        };
        match arm.as_list() {
            Some([head, tag, binder, body]) if head.as_atom() == Some("case") => {
                cases.push((atom(tag, "case")?, lower_case(binder, body)?));
            }
            Some([head, binder, body]) if head.as_atom() == Some("else") => {
                fallback = Some(Box::new(lower_case(binder, body)?));
            }
            _ => return Err(malformed("match")),
        }
    }
    Ok(Node::Match {
        scrutinee: boxed(scrutinee)?,
        cases,
        fallback,
    })
}

fn number(v: &Value, heap: &Heap, op: &str) -> Result<f64, EvalError> {
    match v {
        Value::Float(n) => Ok(*n),
        Value::Int(i) => Ok(*i as f64),
        other => Err(EvalError::new(
            "EVAL030",
            format!("{} のオペランドは数値である必要があります: {}", op, other.kind_name(heap)),
            None,
        )),
    }
}

/// プリミティブは値で、複合値と関数は同一性で比較する。
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => *i as f64 == *f,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
        (Value::Obj(x), Value::Obj(y)) => x == y,
        (Value::Func(x), Value::Func(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        _ => false,
    }
}

pub struct Interpreter {
    heap: Heap,
    globals: HashMap<String, Value>,
    closures: Vec<Closure>,
    max_depth: usize,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            heap: Heap::new(),
            globals: HashMap::new(),
            closures: Vec::new(),
            max_depth,
            depth: 0,
        }
    }

    /// グローバルスロットの現在値。
    pub fn global(&self, slot: &str) -> Option<&Value> {
        self.globals.get(slot)
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    fn eval(&mut self, node: &Node, env: &Env) -> Result<Value, EvalError> {
        if self.depth >= self.max_depth {
            return Err(EvalError::new(
                "EVAL090",
                format!("評価の入れ子が上限 {} を超えました", self.max_depth),
                None,
            ));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_node(node, env)
        });
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, node: &Node, env: &Env) -> Result<Value, EvalError> {
        match node {
            Node::Const(v) => Ok(v.clone()),
            Node::Global(slot) => self.globals.get(slot).cloned().ok_or_else(|| {
                EvalError::new("EVAL010", format!("未定義のグローバルです: {}", slot), None)
            }),
            Node::Local(name) => lookup(env, name).ok_or_else(|| {
                EvalError::new("EVAL011", format!("未定義のローカルです: {}", name), None)
            }),
            Node::Define(slot, e) => {
                let v = self.eval(e, env)?;
                self.globals.insert(slot.clone(), v.clone());
                Ok(v)
            }
            Node::Seq(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval(item, env)?;
                }
                Ok(last)
            }
            Node::Fun(def) => {
                self.closures.push(Closure {
                    def: Rc::clone(def),
                    env: env.clone(),
                });
                Ok(Value::Func(FuncId(self.closures.len() - 1)))
            }
            Node::Call(f, a) => {
                let func = self.eval(f, env)?;
                let arg = self.eval(a, env)?;
                self.apply(func, arg)
            }
            Node::Let(name, e, body) => {
                let v = self.eval(e, env)?;
                self.eval(body, &bind(env, name, v))
            }
            Node::LetRec(bindings, body) => {
                let mut inner = env.clone();
                let mut frames = Vec::with_capacity(bindings.len());
                for (name, _) in bindings {
                    let frame = Rc::new(Frame {
                        name: name.clone(),
                        value: RefCell::new(Value::Undefined),
                        parent: inner.take(),
                    });
                    inner = Some(Rc::clone(&frame));
                    frames.push(frame);
                }
                for ((_, expr), frame) in bindings.iter().zip(&frames) {
                    let v = self.eval(expr, &inner)?;
                    *frame.value.borrow_mut() = v;
                }
                self.eval(body, &inner)
            }
            Node::If(c, t, e) => match self.eval(c, env)? {
                Value::Bool(true) => self.eval(t, env),
                Value::Bool(false) => self.eval(e, env),
                other => Err(EvalError::new(
                    "EVAL030",
                    format!("if の条件は bool である必要があります: {}", other.kind_name(&self.heap)),
                    None,
                )),
            },
            Node::Op(op, l, r) => {
                let lv = self.eval(l, env)?;
                let rv = self.eval(r, env)?;
                self.binop(*op, &lv, &rv)
            }
            Node::Neg(e) => {
                let v = self.eval(e, env)?;
                Ok(Value::Float(-number(&v, &self.heap, "-")?))
            }
            Node::Record(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                for (name, expr) in fields {
                    values.push((name.clone(), self.eval(expr, env)?));
                }
                Ok(self.heap.record(values))
            }
            Node::Extend(base, fields) => {
                let base = self.eval(base, env)?;
                let mut values = self.record_fields(&base)?.to_vec();
                for (name, expr) in fields {
                    let v = self.eval(expr, env)?;
                    match values.iter_mut().find(|(k, _)| k == name) {
                        Some((_, slot)) => *slot = v,
                        None => values.push((name.clone(), v)),
                    }
                }
                Ok(self.heap.record(values))
            }
            Node::Field(e, name) => {
                let v = self.eval(e, env)?;
                self.record_fields(&v)?
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| {
                        EvalError::new("EVAL041", format!("フィールドがありません: {}", name), None)
                    })
            }
            Node::Tag(tag, e) => {
                let payload = self.eval(e, env)?;
                Ok(self.heap.variant(tag.clone(), payload))
            }
            Node::Match {
                scrutinee,
                cases,
                fallback,
            } => {
                let v = self.eval(scrutinee, env)?;
                let variant = match v.as_obj().and_then(|id| self.heap.get(id)) {
                    Some(Object::Variant { tag, payload }) => Some((tag.clone(), payload.clone())),
                    _ => None,
                };
                if let Some((tag, payload)) = &variant {
                    if let Some((_, case)) = cases.iter().find(|(t, _)| t == tag) {
                        return self.eval_case(case, payload.clone(), env);
                    }
                }
                match (fallback, variant) {
                    (Some(case), _) => self.eval_case(case, v, env),
                    (None, Some((tag, _))) => Err(EvalError::new(
                        "EVAL051",
                        format!("一致するアームがありません: `{}", tag),
                        None,
                    )),
                    (None, None) => Err(EvalError::new(
                        "EVAL050",
                        format!("match の対象がバリアントではありません: {}", v.kind_name(&self.heap)),
                        None,
                    )),
                }
            }
            Node::Ref(e) => {
                let v = self.eval(e, env)?;
                Ok(self.heap.reference(v))
            }
            Node::Deref(e) => {
                let v = self.eval(e, env)?;
                match v.as_obj().and_then(|id| self.heap.get(id)) {
                    Some(Object::Ref { target }) => Ok(target.clone()),
                    _ => Err(self.not_a_ref(&v)),
                }
            }
            Node::Assign(r, e) => {
                let cell = self.eval(r, env)?;
                let v = self.eval(e, env)?;
                cell.as_obj()
                    .and_then(|id| self.heap.set_ref_target(id, v))
                    .ok_or_else(|| self.not_a_ref(&cell))
            }
        }
    }

    fn eval_case(&mut self, case: &Case, value: Value, env: &Env) -> Result<Value, EvalError> {
        match &case.binder {
            Some(name) => self.eval(&case.body, &bind(env, name, value)),
            None => self.eval(&case.body, env),
        }
    }

    fn apply(&mut self, func: Value, arg: Value) -> Result<Value, EvalError> {
        let closure = match &func {
            Value::Func(id) => self.closures.get(id.0).cloned(),
            _ => None,
        };
        let Some(closure) = closure else {
            return Err(EvalError::new(
                "EVAL020",
                format!("関数ではない値を呼び出しました: {}", func.kind_name(&self.heap)),
                None,
            ));
        };
        let env = bind(&closure.env, &closure.def.param, arg);
        self.eval(&closure.def.body, &env)
    }

    fn binop(&self, op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
        let heap = &self.heap;
        let operands = || -> Result<(f64, f64), EvalError> {
            Ok((number(l, heap, op.symbol())?, number(r, heap, op.symbol())?))
        };
        let v = match op {
            BinOp::Eq => Value::Bool(values_equal(l, r)),
            BinOp::Ne => Value::Bool(!values_equal(l, r)),
            BinOp::Concat => match (l, r) {
                (Value::Str(a), Value::Str(b)) => Value::str(format!("{}{}", a, b)),
                _ => {
                    return Err(EvalError::new(
                        "EVAL030",
                        format!(
                            "^ のオペランドは文字列である必要があります: {} ^ {}",
                            l.kind_name(heap),
                            r.kind_name(heap)
                        ),
                        None,
                    ))
                }
            },
            BinOp::Add => operands().map(|(a, b)| Value::Float(a + b))?,
            BinOp::Sub => operands().map(|(a, b)| Value::Float(a - b))?,
            BinOp::Mul => operands().map(|(a, b)| Value::Float(a * b))?,
            BinOp::Div => operands().map(|(a, b)| Value::Float(a / b))?,
            BinOp::Rem => operands().map(|(a, b)| Value::Float(a % b))?,
            BinOp::Lt => operands().map(|(a, b)| Value::Bool(a < b))?,
            BinOp::Le => operands().map(|(a, b)| Value::Bool(a <= b))?,
            BinOp::Gt => operands().map(|(a, b)| Value::Bool(a > b))?,
            BinOp::Ge => operands().map(|(a, b)| Value::Bool(a >= b))?,
        };
        Ok(v)
    }

    fn record_fields(&self, v: &Value) -> Result<&[(String, Value)], EvalError> {
        match v.as_obj().and_then(|id| self.heap.get(id)) {
            Some(Object::Record { fields }) => Ok(fields),
            _ => Err(EvalError::new(
                "EVAL040",
                format!("レコードではない値です: {}", v.kind_name(&self.heap)),
                None,
            )),
        }
    }

    fn not_a_ref(&self, v: &Value) -> EvalError {
        EvalError::new(
            "EVAL060",
            format!("参照セルではない値です: {}", v.kind_name(&self.heap)),
            None,
        )
    }
}

impl EvalHost for Interpreter {
    fn evaluate(&mut self, code: &str) -> Result<Value, EvalError> {
        log::debug!("ターゲットコードを評価します ({} バイト)", code.len());
        let node = lower(&read(code)?)?;
        self.depth = 0;
        self.eval(&node, &None)
    }

    fn heap(&self) -> &Heap {
        &self.heap
    }
}

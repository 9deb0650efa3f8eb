// パス: src/repl/printer.rs
// 役割: 評価結果の値を表示用テキストへ整形し、ヘルプ文も集約する
// 意図: 循環を含む値でも必ず停止する表示規則を一箇所で管理する
// 関連ファイル: src/repl/driver.rs, src/runtime/value.rs, src/repl/cmd.rs
//! 値の表示とヘルプメッセージ。
//!
//! - 訪問済みの複合値は `...` で打ち切る。訪問済み集合は 1 回の `print` の間だけ有効。
//! - 走査は明示的な作業スタックで行い、深い値でもネイティブスタックを消費しない。

use crate::runtime::{Heap, ObjId, Object, Value};
use std::collections::HashSet;
use std::io::{self, Write};

const HELP_TEXT: &str = concat!(
    "利用可能なコマンド:\n",
    "  :help              ヘルプ（本メッセージ）\n",
    "  :run PATH          ファイル全体をセッションを初期化してから実行\n",
    "  :rerun             直近の :run を再実行\n",
    "  :history           入力履歴を古い順に表示\n",
    "  :quit, :q          終了\n",
    "それ以外の入力はそのまま定義・式として評価されます。\n",
    "\n",
    "例:\n",
    "  >> let twice = fun f x -> f (f x)\n",
    "  >> twice (fun n -> n * 3) 2        -- 18.0\n",
    "  >> `Some {x = 1}                   -- Some{x=1.0}\n",
);

/// ヘルプメッセージを任意のライターへ描画する。
pub(crate) fn render_help<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(HELP_TEXT.as_bytes())
}

enum Work<'a> {
    Visit(&'a Value),
    Text(&'a str),
}

/// 1 回の表示ごとに作る値プリンタ。
pub struct ValuePrinter<'h> {
    heap: &'h Heap,
    seen: HashSet<ObjId>,
    out: String,
}

impl<'h> ValuePrinter<'h> {
    pub fn new(heap: &'h Heap) -> Self {
        Self {
            heap,
            seen: HashSet::new(),
            out: String::new(),
        }
    }

    /// 値を表示文字列へ変換する。プリンタは消費され、訪問済み集合も破棄される。
    pub fn print(mut self, value: &Value) -> String {
        let heap = self.heap;
        let mut stack = vec![Work::Visit(value)];
        while let Some(work) = stack.pop() {
            match work {
                Work::Text(text) => self.out.push_str(text),
                Work::Visit(v) => self.visit(v, heap, &mut stack),
            }
        }
        self.out
    }

    fn visit<'a>(&mut self, value: &'a Value, heap: &'a Heap, stack: &mut Vec<Work<'a>>) {
        match value {
            Value::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) => self.out.push_str(&i.to_string()),
            Value::Float(f) => self.out.push_str(&format_float(*f)),
            Value::Str(s) => {
                let quoted = serde_json::to_string(&**s).unwrap_or_else(|_| format!("{:?}", s));
                self.out.push_str(&quoted);
            }
            Value::Func(_) => self.out.push_str("<fun>"),
            Value::Symbol(_) => self.out.push_str("<sym>"),
            Value::Null => self.out.push_str("null"),
            Value::Undefined => self.out.push_str("<undefined>"),
            Value::Obj(id) => {
                if !self.seen.insert(*id) {
                    self.out.push_str("...");
                    return;
                }
                match heap.get(*id) {
                    Some(Object::Variant { tag, payload }) => {
                        self.out.push_str(tag);
                        if !payload.is_composite() {
                            self.out.push(' ');
                        }
                        stack.push(Work::Visit(payload));
                    }
                    Some(Object::Ref { target }) => {
                        self.out.push_str("ref ");
                        stack.push(Work::Visit(target));
                    }
                    Some(Object::Record { fields }) => {
                        self.out.push('{');
                        stack.push(Work::Text("}"));
                        for (i, (name, v)) in fields.iter().enumerate().rev() {
                            stack.push(Work::Visit(v));
                            stack.push(Work::Text("="));
                            stack.push(Work::Text(name));
                            if i > 0 {
                                stack.push(Work::Text("; "));
                            }
                        }
                    }
                    // ヒープに無い ID は到達不能な値として扱う。
                    None => self.out.push_str("<undefined>"),
                }
            }
        }
    }
}

/// 値を 1 回だけ表示する簡易関数。
pub fn print_value(heap: &Heap, value: &Value) -> String {
    ValuePrinter::new(heap).print(value)
}

/// 浮動小数の表示。整数と見分けが付かない形には `.0` を補う。
///
/// 絶対値が `1e21` 以上か `1e-6` 未満 (0 を除く) なら `1e+21` や `2.5e-7` の指数表記にする。
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude >= 1e21 || (magnitude != 0.0 && magnitude < 1e-6) {
        let s = format!("{:e}", f);
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => s,
        };
    }
    let mut s = f.to_string();
    let digits = s.strip_prefix('-').unwrap_or(&s);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        s.push_str(".0");
    }
    s
}
